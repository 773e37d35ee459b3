//! Externally-owned view settings and the global hotkey listener.
//!
//! The fusion pipeline never owns its mode flags or opacity: they live
//! here, mutated only by the control layer (hotkeys today, any UI
//! tomorrow), and are read once per tick as an immutable
//! [`FusionSettings`] snapshot. Flags may change between ticks; within a
//! tick the snapshot keeps them stable.

use rdev::{listen, Event, EventType, Key};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::fusion::FusionSettings;

/// Step applied by the opacity hotkeys.
const OPACITY_STEP: f32 = 0.05;

/// Shared, control-layer-owned state read by the fusion loop.
pub struct ControlState {
    thermal_contour: AtomicBool,
    visible_contour: AtomicBool,
    thermal_colormap: AtomicBool,
    overlay: AtomicBool,
    recording: AtomicBool,
    snapshot_requested: AtomicBool,
    quit: AtomicBool,
    opacity: Mutex<f32>,
}

impl ControlState {
    /// Create control state seeded from initial settings.
    pub fn new(initial: FusionSettings) -> Self {
        ControlState {
            thermal_contour: AtomicBool::new(initial.thermal_contour),
            visible_contour: AtomicBool::new(initial.visible_contour),
            thermal_colormap: AtomicBool::new(initial.thermal_colormap),
            overlay: AtomicBool::new(initial.overlay),
            recording: AtomicBool::new(false),
            snapshot_requested: AtomicBool::new(false),
            quit: AtomicBool::new(false),
            opacity: Mutex::new(initial.opacity.clamp(0.0, 1.0)),
        }
    }

    /// Immutable snapshot for one tick.
    pub fn snapshot(&self) -> FusionSettings {
        FusionSettings {
            thermal_contour: self.thermal_contour.load(Ordering::Relaxed),
            visible_contour: self.visible_contour.load(Ordering::Relaxed),
            thermal_colormap: self.thermal_colormap.load(Ordering::Relaxed),
            overlay: self.overlay.load(Ordering::Relaxed),
            opacity: *self.opacity.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }

    pub fn toggle_thermal_contour(&self) -> bool {
        toggle(&self.thermal_contour)
    }

    pub fn toggle_visible_contour(&self) -> bool {
        toggle(&self.visible_contour)
    }

    pub fn toggle_thermal_colormap(&self) -> bool {
        toggle(&self.thermal_colormap)
    }

    /// Toggle the ThermaVue overlay. The facet flags are left untouched;
    /// the resolver ignores them while overlay is active.
    pub fn toggle_overlay(&self) -> bool {
        toggle(&self.overlay)
    }

    pub fn toggle_recording(&self) -> bool {
        toggle(&self.recording)
    }

    pub fn recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }

    /// Nudge opacity by `delta`, clamped to [0, 1]. Returns the new value.
    pub fn adjust_opacity(&self, delta: f32) -> f32 {
        let mut opacity = self.opacity.lock().unwrap_or_else(|e| e.into_inner());
        *opacity = (*opacity + delta).clamp(0.0, 1.0);
        *opacity
    }

    pub fn request_snapshot(&self) {
        self.snapshot_requested.store(true, Ordering::SeqCst);
    }

    /// Consume a pending snapshot request, if any.
    pub fn take_snapshot_request(&self) -> bool {
        self.snapshot_requested.swap(false, Ordering::SeqCst)
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }
}

fn toggle(flag: &AtomicBool) -> bool {
    // fetch_xor flips and returns the previous value
    !flag.fetch_xor(true, Ordering::Relaxed)
}

/// Global hotkey listener mutating a shared [`ControlState`].
///
/// Key map:
/// - `T` thermal contour, `V` visible contour, `C` thermal colormap
/// - `O` ThermaVue overlay
/// - `=`/`-` opacity up/down
/// - `R` start/stop recording, `S` snapshot, `Q` quit
pub struct HotkeyManager {
    state: Arc<ControlState>,
    stop_flag: Arc<AtomicBool>,
    listener_thread: Option<JoinHandle<()>>,
}

impl HotkeyManager {
    pub fn new(state: Arc<ControlState>) -> Self {
        HotkeyManager {
            state,
            stop_flag: Arc::new(AtomicBool::new(false)),
            listener_thread: None,
        }
    }

    /// Start listening for global hotkeys.
    ///
    /// Spawns a background thread that captures global keyboard events.
    /// On macOS this requires Accessibility permission; the caller treats
    /// a failure as a degraded (keyboard-less) run, not a fatal error.
    pub fn start(&mut self) -> Result<(), String> {
        if self.listener_thread.is_some() {
            return Err("hotkey listener already running".to_string());
        }

        let state = Arc::clone(&self.state);
        let stop_flag = Arc::clone(&self.stop_flag);

        let handle = thread::spawn(move || {
            let callback = move |event: Event| {
                if stop_flag.load(Ordering::SeqCst) {
                    return;
                }
                if let EventType::KeyPress(key) = event.event_type {
                    handle_key(&state, key);
                }
            };

            // listen() blocks for the life of the process
            if let Err(e) = listen(callback) {
                log::warn!("hotkey listener error: {:?}", e);
            }
        });

        self.listener_thread = Some(handle);
        Ok(())
    }

    /// Stop processing hotkeys.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        // rdev's listen() has no clean cancellation; the thread lives until
        // process exit but ignores further events once the flag is set.
        self.listener_thread = None;
    }
}

impl Drop for HotkeyManager {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_key(state: &ControlState, key: Key) {
    match key {
        Key::KeyT => {
            let on = state.toggle_thermal_contour();
            eprintln!("[keys] thermal contour: {}", on_off(on));
        }
        Key::KeyV => {
            let on = state.toggle_visible_contour();
            eprintln!("[keys] visible contour: {}", on_off(on));
        }
        Key::KeyC => {
            let on = state.toggle_thermal_colormap();
            eprintln!("[keys] thermal colormap: {}", on_off(on));
        }
        Key::KeyO => {
            let on = state.toggle_overlay();
            eprintln!("[keys] ThermaVue overlay: {}", on_off(on));
        }
        Key::Equal => {
            let opacity = state.adjust_opacity(OPACITY_STEP);
            eprintln!("[keys] opacity: {:.0}%", opacity * 100.0);
        }
        Key::Minus => {
            let opacity = state.adjust_opacity(-OPACITY_STEP);
            eprintln!("[keys] opacity: {:.0}%", opacity * 100.0);
        }
        Key::KeyR => {
            let on = state.toggle_recording();
            eprintln!("[keys] recording: {}", on_off(on));
        }
        Key::KeyS => {
            state.request_snapshot();
            eprintln!("[keys] snapshot requested");
        }
        Key::KeyQ => {
            state.request_quit();
            eprintln!("[keys] quit");
        }
        _ => {}
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
