//! Render sink boundary.
//!
//! The fusion loop emits exactly one 3-channel frame per successful tick;
//! what happens to it is the sink's business. The default sink pipes raw
//! RGB into a spawned mpv window; a null sink supports headless runs and
//! tests.

use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};

use thiserror::Error;

use crate::camera::{Frame, PixelFormat};

/// Errors from the preview sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("mpv not found. Please install it (e.g. 'brew install mpv' or your distribution's package)")]
    MpvNotFound,
    #[error("failed to spawn mpv: {0}")]
    SpawnFailed(std::io::Error),
    #[error("preview window closed")]
    Closed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Consumes one rendered frame per tick.
pub trait RenderSink {
    fn present(&mut self, frame: &Frame) -> Result<(), SinkError>;
}

/// Live preview window backed by a spawned mpv process.
///
/// mpv reads raw RGB24 video from stdin; frame pacing comes from the
/// fusion loop, so playback runs untimed.
pub struct MpvPreview {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl MpvPreview {
    /// Spawn an mpv window expecting `width`x`height` RGB frames.
    pub fn spawn(width: u32, height: u32) -> Result<Self, SinkError> {
        let mut child = Command::new("mpv")
            .args([
                "--no-cache",
                "--untimed",
                "--no-terminal",
                "--force-seekable=no",
                "--demuxer=rawvideo",
                &format!("--demuxer-rawvideo-w={}", width),
                &format!("--demuxer-rawvideo-h={}", height),
                "--demuxer-rawvideo-mp-format=rgb24",
                "-",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SinkError::MpvNotFound
                } else {
                    SinkError::SpawnFailed(e)
                }
            })?;

        let stdin = child.stdin.take();
        Ok(MpvPreview { child, stdin })
    }
}

impl RenderSink for MpvPreview {
    fn present(&mut self, frame: &Frame) -> Result<(), SinkError> {
        debug_assert_eq!(frame.format, PixelFormat::Rgb);

        // A closed window shows up as the child exiting or the pipe
        // breaking; either way the loop should wind down, not crash.
        if matches!(self.child.try_wait(), Ok(Some(_))) {
            return Err(SinkError::Closed);
        }

        match &mut self.stdin {
            Some(stdin) => match stdin.write_all(&frame.data) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Err(SinkError::Closed),
                Err(e) => Err(SinkError::Io(e)),
            },
            None => Err(SinkError::Closed),
        }
    }
}

impl Drop for MpvPreview {
    fn drop(&mut self) {
        drop(self.stdin.take());
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Discards frames; used for headless runs and tests.
#[derive(Debug, Default)]
pub struct NullSink {
    frames_presented: usize,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_presented(&self) -> usize {
        self.frames_presented
    }
}

impl RenderSink for NullSink {
    fn present(&mut self, _frame: &Frame) -> Result<(), SinkError> {
        self.frames_presented += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sink_counts_frames() {
        let mut sink = NullSink::new();
        let frame = Frame::filled(0, 2, 2, PixelFormat::Rgb);
        sink.present(&frame).unwrap();
        sink.present(&frame).unwrap();
        assert_eq!(sink.frames_presented(), 2);
    }

    #[test]
    fn test_sink_error_display() {
        let msg = format!("{}", SinkError::MpvNotFound);
        assert!(msg.contains("mpv not found"));
    }
}
