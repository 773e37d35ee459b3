//! The timer-driven fusion loop.
//!
//! A render tick fires every ~10 ms (best effort, bounded by what the
//! cameras actually deliver) and runs one synchronous end-to-end pass:
//! acquire both frames, preprocess, snapshot the control state, resolve
//! the mode, and hand the fused frame to the render sink. An independent
//! 24 Hz capture tick appends the most recently rendered frame to the
//! recording buffer while recording is active.
//!
//! There is no frame queue and no mid-tick cancellation: a tick either
//! completes with a [`FusionResult`] or fails outright. A capture failure
//! is reported once and stops the loop; reconnection policy belongs to
//! the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::camera::{CameraCapture, CaptureError, Frame};
use crate::controls::ControlState;
use crate::fusion::{fuse, preprocess, FusionSettings};
use crate::record::{RecordError, Recorder};
use crate::sink::{RenderSink, SinkError};

/// Render tick period (~100 Hz best effort).
pub const RENDER_INTERVAL: Duration = Duration::from_millis(10);

/// Recording capture tick period (24 Hz nominal).
pub const CAPTURE_INTERVAL: Duration = Duration::from_millis(1000 / 24);

/// Errors that stop the fusion loop.
#[derive(Debug, Error)]
pub enum PumpError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("failed to create async runtime: {0}")]
    Runtime(std::io::Error),
}

/// Output of one successful tick.
pub struct FusionResult {
    /// The fused frame handed to the sink
    pub frame: Frame,
    /// The settings snapshot that produced it
    pub settings: FusionSettings,
}

/// Drives the per-frame pipeline from the two cameras to the sinks.
pub struct FramePump {
    visible: CameraCapture,
    thermal: CameraCapture,
    controls: Arc<ControlState>,
    overlay_threshold: u8,
    last_rendered: Option<Frame>,
}

impl FramePump {
    pub fn new(
        visible: CameraCapture,
        thermal: CameraCapture,
        controls: Arc<ControlState>,
        overlay_threshold: u8,
    ) -> Self {
        FramePump {
            visible,
            thermal,
            controls,
            overlay_threshold,
            last_rendered: None,
        }
    }

    /// Wait for both capture threads to deliver their first frame.
    ///
    /// After this succeeds, an empty frame buffer means the stream died
    /// and the loop fails fast instead of masking it.
    pub fn wait_until_ready(&self, timeout: Duration) -> Result<(), CaptureError> {
        self.visible.wait_for_first_frame(timeout)?;
        self.thermal.wait_for_first_frame(timeout)?;
        Ok(())
    }

    /// Run one synchronous fusion pass.
    pub fn tick(&self) -> Result<FusionResult, CaptureError> {
        let visible = self.visible.latest_frame();
        let thermal = self.thermal.latest_frame();
        let (visible, thermal) = preprocess(visible, thermal)?;

        let settings = self.controls.snapshot();
        let frame = fuse(&visible, &thermal, &settings, self.overlay_threshold);
        Ok(FusionResult { frame, settings })
    }

    /// Run the fusion loop until quit, Ctrl+C, sink closure, or a fatal
    /// capture error.
    pub async fn run<S: RenderSink>(
        &mut self,
        sink: &mut S,
        recorder: &mut Recorder,
    ) -> Result<(), PumpError> {
        let mut render = tokio::time::interval(RENDER_INTERVAL);
        render.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut capture = tokio::time::interval(CAPTURE_INTERVAL);
        capture.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut was_recording = false;

        loop {
            if ctrlc_received() || self.controls.quit_requested() {
                break;
            }

            tokio::select! {
                _ = render.tick() => {
                    let result = match self.tick() {
                        Ok(r) => r,
                        Err(e) => {
                            log::error!("capture failed, stopping: {}", e);
                            if was_recording {
                                finish_recording(recorder);
                            }
                            return Err(e.into());
                        }
                    };

                    match sink.present(&result.frame) {
                        Ok(()) => {}
                        Err(SinkError::Closed) => {
                            log::info!("preview closed, stopping");
                            break;
                        }
                        Err(e) => return Err(e.into()),
                    }

                    if self.controls.take_snapshot_request() {
                        match recorder.save_snapshot(&result.frame) {
                            Ok(path) => eprintln!("Snapshot saved: {}", path.display()),
                            Err(e) => log::warn!("snapshot failed: {}", e),
                        }
                    }

                    self.last_rendered = Some(result.frame);
                }

                _ = capture.tick() => {
                    let recording = self.controls.recording();
                    if recording && !was_recording {
                        recorder.begin();
                        log::info!("recording started");
                    } else if !recording && was_recording {
                        finish_recording(recorder);
                    }
                    was_recording = recording;

                    if recording {
                        if let Some(frame) = &self.last_rendered {
                            recorder.append(frame.clone());
                        }
                    }
                }
            }
        }

        // Finalize an in-flight recording before winding down.
        if was_recording {
            finish_recording(recorder);
        }

        self.visible.stop();
        self.thermal.stop();
        Ok(())
    }
}

fn finish_recording(recorder: &mut Recorder) {
    match recorder.finish() {
        Ok(Some(path)) => eprintln!("Recording saved: {}", path.display()),
        Ok(None) => log::info!("recording stopped before any frame was captured"),
        Err(e) => log::warn!("failed to finalize recording: {}", e),
    }
}

/// Global flag set by the Ctrl+C handler.
static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Check if Ctrl+C has been received.
pub fn ctrlc_received() -> bool {
    CTRLC_RECEIVED.load(Ordering::SeqCst)
}

/// Set up the Ctrl+C handler. Call once at program startup.
pub fn setup_ctrlc_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        CTRLC_RECEIVED.store(true, Ordering::SeqCst);
        eprintln!("\nReceived Ctrl+C, shutting down...");
    })
}
