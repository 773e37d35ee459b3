//! Recording buffer, snapshot saving, and video muxing.
//!
//! The fusion loop appends rendered frames to an in-memory buffer while
//! recording is active; the buffer is unbounded by design and drained into
//! a single MP4 when recording stops. Muxing pipes raw RGB frames into a
//! spawned FFmpeg process at a fixed frame rate. Snapshots are single PNG
//! files of the most recently rendered frame.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::camera::{Frame, PixelFormat};

/// Frame rate recordings are muxed at.
pub const RECORD_FPS: u32 = 24;

/// Errors from snapshot saving or video encoding.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("FFmpeg not found. Please install it (e.g. 'brew install ffmpeg' or your distribution's package)")]
    FfmpegNotFound,
    #[error("failed to spawn FFmpeg: {0}")]
    SpawnFailed(std::io::Error),
    #[error("FFmpeg exited with code {exit_code:?}\n{stderr}")]
    EncodeFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("cannot encode {0:?} frames")]
    UnsupportedFormat(PixelFormat),
    #[error("failed to write PNG: {0}")]
    PngFailed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capture sink for snapshots and recordings.
pub struct Recorder {
    output_dir: PathBuf,
    prefix: String,
    frames: Vec<Frame>,
}

impl Recorder {
    pub fn new(output_dir: PathBuf, prefix: String) -> Self {
        Recorder {
            output_dir,
            prefix,
            frames: Vec::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Start a fresh recording, discarding any buffered frames.
    pub fn begin(&mut self) {
        self.frames.clear();
    }

    /// Append one rendered frame to the recording buffer.
    pub fn append(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Finish the recording: mux all buffered frames into an MP4.
    ///
    /// Returns `Ok(None)` when nothing was buffered (recording toggled on
    /// and off before a capture tick fired). The buffer is cleared either
    /// way.
    pub fn finish(&mut self) -> Result<Option<PathBuf>, RecordError> {
        if self.frames.is_empty() {
            return Ok(None);
        }

        let frames = std::mem::take(&mut self.frames);
        let path = self.unique_path("mp4");
        mux_frames(&frames, &path)?;
        Ok(Some(path))
    }

    /// Save a single frame as PNG.
    pub fn save_snapshot(&self, frame: &Frame) -> Result<PathBuf, RecordError> {
        if frame.format != PixelFormat::Rgb {
            return Err(RecordError::UnsupportedFormat(frame.format));
        }

        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.unique_path("png");

        let img = image::RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| RecordError::PngFailed("frame buffer size mismatch".to_string()))?;
        img.save(&path)
            .map_err(|e| RecordError::PngFailed(e.to_string()))?;

        Ok(path)
    }

    /// Build `<dir>/<prefix>_<suffix>.<ext>` with a uniquifying suffix,
    /// probing until the name is actually free.
    fn unique_path(&self, ext: &str) -> PathBuf {
        let base = unique_suffix();
        let mut bump = 0u32;
        loop {
            let suffix = format!("{:04}", (base + bump) % 10_000);
            let path = self
                .output_dir
                .join(format!("{}_{}.{}", self.prefix, suffix, ext));
            if !path.exists() {
                return path;
            }
            bump += 1;
        }
    }
}

/// Four digits derived from the wall clock, to keep repeated captures from
/// overwriting each other within the same prefix.
fn unique_suffix() -> u32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    nanos % 10_000
}

/// Pipe raw RGB frames into FFmpeg at [`RECORD_FPS`] and wait for it to
/// finalize the file.
fn mux_frames(frames: &[Frame], output: &Path) -> Result<(), RecordError> {
    let first = &frames[0];
    if first.format != PixelFormat::Rgb {
        return Err(RecordError::UnsupportedFormat(first.format));
    }

    if let Some(dir) = output.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let size = format!("{}x{}", first.width, first.height);
    let fps = RECORD_FPS.to_string();
    let args = [
        "-y",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgb24",
        "-s",
        size.as_str(),
        "-r",
        fps.as_str(),
        "-i",
        "-",
        "-pix_fmt",
        "yuv420p",
    ];

    let mut encoder = Encoder::spawn(&args, output)?;
    let write_result = encoder.write_frames(frames);
    let status = encoder.finish()?;

    // Report the write error only if FFmpeg didn't also fail; a broken
    // pipe usually means the encoder died first.
    if !status.success() {
        return Err(RecordError::EncodeFailed {
            exit_code: status.code(),
            stderr: encoder.take_stderr_output().join("\n"),
        });
    }
    write_result?;

    log::info!("recorded {} frames to {}", frames.len(), output.display());
    Ok(())
}

/// A running FFmpeg encoder process.
struct Encoder {
    child: Child,
    stderr_thread: Option<JoinHandle<Vec<String>>>,
}

impl Encoder {
    /// Spawn FFmpeg with the given input arguments, writing to `output`.
    fn spawn(args: &[&str], output: &Path) -> Result<Self, RecordError> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(args)
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RecordError::FfmpegNotFound
            } else {
                RecordError::SpawnFailed(e)
            }
        })?;

        // Drain stderr on a separate thread so the encoder can't block on
        // a full pipe.
        let stderr = child.stderr.take();
        let stderr_thread = stderr.map(|stderr| {
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                let mut lines = Vec::new();
                for line in reader.lines() {
                    match line {
                        Ok(l) => {
                            log::debug!("[ffmpeg] {}", l);
                            lines.push(l);
                        }
                        Err(_) => break,
                    }
                }
                lines
            })
        });

        Ok(Encoder {
            child,
            stderr_thread,
        })
    }

    fn write_frames(&mut self, frames: &[Frame]) -> Result<(), RecordError> {
        let stdin = self.child.stdin.as_mut().ok_or_else(|| {
            RecordError::SpawnFailed(std::io::Error::other("FFmpeg stdin not piped"))
        })?;
        for frame in frames {
            stdin.write_all(&frame.data)?;
        }
        Ok(())
    }

    /// Close stdin and wait for FFmpeg to finalize the container.
    ///
    /// If it fails to exit within a grace period, escalate: SIGINT first so
    /// the file still gets finalized, then kill.
    fn finish(&mut self) -> Result<std::process::ExitStatus, RecordError> {
        drop(self.child.stdin.take());

        let start = Instant::now();
        let timeout = Duration::from_secs(10);

        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {
                    if start.elapsed() > timeout {
                        self.interrupt();
                        return self.child.wait().map_err(RecordError::Io);
                    }
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => return Err(RecordError::Io(e)),
            }
        }
    }

    fn interrupt(&mut self) {
        #[cfg(unix)]
        {
            unsafe {
                let pid = self.child.id() as i32;
                libc::kill(pid, libc::SIGINT);
            }
            thread::sleep(Duration::from_millis(500));
        }
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
        }
    }

    /// The collected stderr output after the process has finished.
    fn take_stderr_output(&mut self) -> Vec<String> {
        self.stderr_thread
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for Encoder {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            self.interrupt();
            let _ = self.child.wait();
        }
    }
}
