//! Integration tests for the control/recording layers around the
//! fusion pipeline: settings snapshots, recording-buffer gating, and
//! snapshot files on disk.

use std::sync::Arc;

use thermafuse::camera::{Frame, PixelFormat};
use thermafuse::controls::ControlState;
use thermafuse::fusion::{fuse, FusionSettings, DEFAULT_OBJECT_THRESHOLD};
use thermafuse::record::Recorder;

fn frame(value: u8) -> Frame {
    Frame::filled(value, 8, 8, PixelFormat::Rgb)
}

// ==================== Control snapshots ====================

#[test]
fn test_snapshot_drives_the_resolver() {
    // Flipping a control flag changes what the next tick computes, and
    // only the next tick: a snapshot taken before the flip is unaffected.
    let state = Arc::new(ControlState::new(FusionSettings::default()));
    let visible = frame(30);
    let thermal = frame(200);

    let before = state.snapshot();
    state.toggle_thermal_colormap();
    let after = state.snapshot();

    let fused_before = fuse(&visible, &thermal, &before, DEFAULT_OBJECT_THRESHOLD);
    let fused_after = fuse(&visible, &thermal, &after, DEFAULT_OBJECT_THRESHOLD);
    assert_ne!(fused_before.data, fused_after.data);

    // The old snapshot still resolves the same way after the flip.
    let fused_before_again = fuse(&visible, &thermal, &before, DEFAULT_OBJECT_THRESHOLD);
    assert_eq!(fused_before.data, fused_before_again.data);
}

#[test]
fn test_snapshot_is_stable_value() {
    let state = ControlState::new(FusionSettings {
        thermal_contour: true,
        visible_contour: false,
        thermal_colormap: true,
        overlay: false,
        opacity: 0.25,
    });
    let a = state.snapshot();
    let b = state.snapshot();
    assert_eq!(a, b);
}

#[test]
fn test_overlay_active_with_stale_facets_resolves_to_overlay() {
    // The UI may leave facet flags set when overlay engages; the resolver
    // must ignore them. All-cold thermal: overlay output is the visible
    // frame, whatever the facets say.
    let state = ControlState::new(FusionSettings {
        thermal_contour: true,
        visible_contour: true,
        thermal_colormap: true,
        overlay: false,
        opacity: 0.5,
    });
    state.toggle_overlay();

    let visible = frame(90);
    let thermal = frame(0);
    let fused = fuse(&visible, &thermal, &state.snapshot(), DEFAULT_OBJECT_THRESHOLD);
    assert_eq!(fused.data, visible.data);
}

// ==================== Recording gating ====================

#[test]
fn test_recorder_appends_only_what_it_is_given() {
    // The pump appends to the recorder only while the recording flag is
    // on; this mirrors that gating at the recorder level.
    let dir = tempfile::tempdir().unwrap();
    let state = ControlState::new(FusionSettings::default());
    let mut recorder = Recorder::new(dir.path().to_path_buf(), "clip".to_string());

    let rendered = frame(77);

    // Not recording: nothing appended.
    assert!(!state.recording());
    if state.recording() {
        recorder.append(rendered.clone());
    }
    assert_eq!(recorder.frame_count(), 0);

    // Recording on: frames accumulate.
    state.toggle_recording();
    recorder.begin();
    for _ in 0..5 {
        if state.recording() {
            recorder.append(rendered.clone());
        }
    }
    assert_eq!(recorder.frame_count(), 5);

    // Recording off again: the buffer stops growing.
    state.toggle_recording();
    if state.recording() {
        recorder.append(rendered.clone());
    }
    assert_eq!(recorder.frame_count(), 5);
}

#[test]
fn test_finish_without_frames_yields_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder = Recorder::new(dir.path().to_path_buf(), "clip".to_string());
    recorder.begin();
    assert!(recorder.finish().unwrap().is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

// ==================== Snapshots on disk ====================

#[test]
fn test_snapshot_roundtrip_through_png() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new(dir.path().to_path_buf(), "shot".to_string());

    // A fused frame, not a raw one: snapshot captures what was displayed.
    let visible = frame(128);
    let thermal = frame(64);
    let fused = fuse(
        &visible,
        &thermal,
        &FusionSettings::default(),
        DEFAULT_OBJECT_THRESHOLD,
    );

    let path = recorder.save_snapshot(&fused).unwrap();
    let decoded = image::open(&path).unwrap().to_rgb8();
    assert_eq!(decoded.width(), fused.width);
    assert_eq!(decoded.height(), fused.height);
    assert_eq!(decoded.into_raw(), fused.data);
}

#[test]
fn test_two_snapshots_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new(dir.path().to_path_buf(), "shot".to_string());
    let a = recorder.save_snapshot(&frame(1)).unwrap();
    let b = recorder.save_snapshot(&frame(2)).unwrap();
    assert_ne!(a, b);
    assert!(a.exists() && b.exists());
}
