//! Camera types and the frame data model.

use std::fmt;
use std::time::Instant;

use thiserror::Error;

/// Information about an available camera device.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    /// Device index for selection
    pub index: u32,
    /// Human-readable device name
    pub name: String,
    /// Device description
    pub description: String,
}

impl fmt::Display for CameraInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.index, self.name, self.description)
    }
}

/// Which of the two fused streams a camera feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Visible,
    Thermal,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Visible => write!(f, "visible"),
            StreamKind::Thermal => write!(f, "thermal"),
        }
    }
}

/// Camera resolution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// The common resolution every frame is normalized to before fusion.
    pub const FUSION: Resolution = Resolution {
        width: 640,
        height: 480,
    };
}

impl Default for Resolution {
    fn default() -> Self {
        Self::FUSION
    }
}

/// Channel layout of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Single-channel intensity (1 byte per pixel)
    Gray,
    /// 3-channel color (RGB, 3 bytes per pixel)
    Rgb,
    /// 4-channel color + alpha (RGBA, 4 bytes per pixel)
    Rgba,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray => 1,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

/// A single video frame.
///
/// Frames are immutable once produced: every transform in the fusion
/// pipeline consumes borrowed frames and returns a new one, so two modes
/// branching on the same source frame can never alias each other's data.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data, row-major, tightly packed
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Channel layout
    pub format: PixelFormat,
    /// Timestamp when the frame was captured or derived
    pub timestamp: Instant,
}

impl Frame {
    /// Construct a frame from raw data.
    ///
    /// # Panics
    /// Panics if `data.len()` does not match `width * height * channels`.
    /// Transforms always produce correctly sized buffers, so a mismatch is
    /// a programming error, not a runtime condition.
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * format.bytes_per_pixel(),
            "frame data length does not match {}x{} {:?}",
            width,
            height,
            format
        );
        Frame {
            data,
            width,
            height,
            format,
            timestamp: Instant::now(),
        }
    }

    /// A frame filled with a single byte value in every channel.
    pub fn filled(value: u8, width: u32, height: u32, format: PixelFormat) -> Self {
        let len = (width as usize) * (height as usize) * format.bytes_per_pixel();
        Frame::new(vec![value; len], width, height, format)
    }

    /// Number of bytes per pixel for this frame's format.
    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    /// Number of pixels in the frame.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// True if `other` has the same dimensions and format.
    pub fn same_layout(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height && self.format == other.format
    }
}

/// Settings for opening one camera stream.
#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Camera device index
    pub device_index: u32,
    /// Requested capture resolution (the driver may pick a close match)
    pub resolution: Resolution,
    /// Target FPS (actual may vary)
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device_index: 0,
            resolution: Resolution::default(),
            fps: 30,
        }
    }
}

/// Errors surfaced by the capture layer.
///
/// Any of these is fatal for the current run: the fusion loop reports the
/// error once and stops rather than substituting blank frames.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no cameras found")]
    NoDevices,
    #[error("failed to query cameras: {0}")]
    QueryFailed(String),
    #[error("camera device {0} not found (run 'thermafuse list-cameras' to see available devices)")]
    DeviceNotFound(u32),
    #[error("failed to open camera {0}: {1}")]
    OpenFailed(u32, String),
    #[error("camera permission denied (on macOS, grant access in System Settings > Privacy & Security > Camera)")]
    PermissionDenied,
    #[error("failed to start camera stream: {0}")]
    StreamFailed(String),
    #[error("capture thread is already running")]
    AlreadyRunning,
    #[error("{0} camera delivered no frame")]
    FrameUnavailable(StreamKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_info_display() {
        let info = CameraInfo {
            index: 1,
            name: "Thermal Cam".to_string(),
            description: "USB".to_string(),
        };
        assert_eq!(format!("{}", info), "[1] Thermal Cam (USB)");
    }

    #[test]
    fn test_fusion_resolution() {
        assert_eq!(Resolution::FUSION.width, 640);
        assert_eq!(Resolution::FUSION.height, 480);
        assert_eq!(Resolution::default(), Resolution::FUSION);
    }

    #[test]
    fn test_bytes_per_pixel() {
        assert_eq!(PixelFormat::Gray.bytes_per_pixel(), 1);
        assert_eq!(PixelFormat::Rgb.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Rgba.bytes_per_pixel(), 4);
    }

    #[test]
    fn test_frame_filled() {
        let frame = Frame::filled(7, 4, 2, PixelFormat::Rgb);
        assert_eq!(frame.data.len(), 4 * 2 * 3);
        assert!(frame.data.iter().all(|&b| b == 7));
        assert_eq!(frame.pixel_count(), 8);
    }

    #[test]
    #[should_panic(expected = "frame data length")]
    fn test_frame_new_rejects_bad_length() {
        let _ = Frame::new(vec![0u8; 5], 2, 2, PixelFormat::Rgb);
    }

    #[test]
    fn test_same_layout() {
        let a = Frame::filled(0, 2, 2, PixelFormat::Rgb);
        let b = Frame::filled(255, 2, 2, PixelFormat::Rgb);
        let c = Frame::filled(0, 2, 2, PixelFormat::Rgba);
        assert!(a.same_layout(&b));
        assert!(!a.same_layout(&c));
    }

    #[test]
    fn test_capture_error_display() {
        assert_eq!(format!("{}", CaptureError::NoDevices), "no cameras found");
        assert!(format!("{}", CaptureError::DeviceNotFound(5)).contains("5"));
        assert_eq!(
            format!("{}", CaptureError::FrameUnavailable(StreamKind::Thermal)),
            "thermal camera delivered no frame"
        );
    }
}
