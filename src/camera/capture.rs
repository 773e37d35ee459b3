//! Camera capture handle and public API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::capture_loop::{run_capture_loop, CaptureCommand};
use super::device::find_device;
use super::types::{CameraSettings, CaptureError, Frame, Resolution, StreamKind};

/// Handle for one camera stream.
///
/// The camera runs a background thread that continuously captures frames
/// and stores the latest one in a shared buffer. The fusion loop pulls the
/// most recent frame once per tick via [`CameraCapture::latest_frame`];
/// frames arriving between ticks are simply replaced.
pub struct CameraCapture {
    /// Which fused stream this camera feeds (used in error reports)
    stream: StreamKind,
    /// Latest captured frame (shared with the capture thread)
    frame_buffer: Arc<Mutex<Option<Frame>>>,
    /// Capture thread handle
    capture_thread: Option<JoinHandle<()>>,
    /// Channel to send commands to the capture thread
    command_tx: Option<Sender<CaptureCommand>>,
    /// Signal to stop the capture thread
    stop_signal: Arc<AtomicBool>,
    /// Current settings
    settings: CameraSettings,
    /// Actual resolution (set after the camera opens)
    actual_resolution: Option<Resolution>,
    /// Actual FPS (set after the camera opens)
    actual_fps: Option<u32>,
}

impl std::fmt::Debug for CameraCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraCapture")
            .field("stream", &self.stream)
            .field("settings", &self.settings)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl CameraCapture {
    /// Open a camera with the specified settings.
    ///
    /// This validates that the device exists but doesn't open the camera
    /// stream until `start()` is called. The camera is opened inside the
    /// background thread to avoid thread-safety issues.
    ///
    /// # Errors
    /// * `CaptureError::DeviceNotFound` - if the device index doesn't exist
    pub fn open(stream: StreamKind, settings: CameraSettings) -> Result<Self, CaptureError> {
        let device = find_device(settings.device_index)?;
        log::info!("{} stream using {}", stream, device);

        Ok(Self {
            stream,
            frame_buffer: Arc::new(Mutex::new(None)),
            capture_thread: None,
            command_tx: None,
            stop_signal: Arc::new(AtomicBool::new(false)),
            settings,
            actual_resolution: None,
            actual_fps: None,
        })
    }

    /// Which fused stream this camera feeds.
    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    /// The current camera settings.
    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// The actual resolution the camera is delivering.
    ///
    /// `None` until the camera has been started. May differ from the
    /// requested resolution; the preprocessor normalizes it either way.
    pub fn actual_resolution(&self) -> Option<Resolution> {
        self.actual_resolution
    }

    /// The actual frame rate the camera is delivering.
    pub fn actual_fps(&self) -> Option<u32> {
        self.actual_fps
    }

    /// Start capturing frames in a background thread.
    ///
    /// # Errors
    /// * `CaptureError::AlreadyRunning` - if capture is already running
    /// * `CaptureError::StreamFailed` - if the camera stream fails to start
    /// * `CaptureError::PermissionDenied` - if camera access is denied
    /// * `CaptureError::OpenFailed` - if the camera fails to open
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.is_running() {
            return Err(CaptureError::AlreadyRunning);
        }

        self.stop_signal.store(false, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel();
        self.command_tx = Some(tx);

        let buffer = Arc::clone(&self.frame_buffer);
        let stop = Arc::clone(&self.stop_signal);
        let settings = self.settings.clone();

        // Channel to receive the actual resolution/fps from the thread
        let (info_tx, info_rx) = mpsc::channel::<Result<(Resolution, u32), CaptureError>>();

        let handle = std::thread::spawn(move || {
            run_capture_loop(settings, buffer, stop, rx, info_tx);
        });

        self.capture_thread = Some(handle);

        // Wait for the thread to report success or failure
        match info_rx.recv() {
            Ok(Ok((res, fps))) => {
                self.actual_resolution = Some(res);
                self.actual_fps = Some(fps);
                Ok(())
            }
            Ok(Err(e)) => {
                self.join_thread();
                Err(e)
            }
            Err(_) => {
                self.join_thread();
                Err(CaptureError::StreamFailed(
                    "capture thread terminated unexpectedly".to_string(),
                ))
            }
        }
    }

    /// Stop the capture thread and wait for it to finish.
    pub fn stop(&mut self) {
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(CaptureCommand::Stop);
        }
        self.join_thread();
    }

    /// Get the most recently captured frame.
    ///
    /// Returns `None` if no frame has been captured yet or capture is not
    /// running; the fusion loop turns that into a fatal
    /// [`CaptureError::FrameUnavailable`].
    pub fn latest_frame(&self) -> Option<Frame> {
        let buffer = self.frame_buffer.lock().ok()?;
        buffer.clone()
    }

    /// Block until the camera has delivered at least one frame.
    ///
    /// Capture threads need a short warm-up before the first frame lands in
    /// the buffer; the pump waits here once at startup so that an empty
    /// buffer afterwards really means the stream died.
    pub fn wait_for_first_frame(&self, timeout: Duration) -> Result<(), CaptureError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if self.latest_frame().is_some() {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Err(CaptureError::FrameUnavailable(self.stream))
    }

    /// Check if the capture thread is currently running.
    pub fn is_running(&self) -> bool {
        self.capture_thread
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    fn join_thread(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.capture_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
