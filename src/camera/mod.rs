//! Camera capture module for webcam access and frame delivery.
//!
//! This module provides a high-level API for the two camera streams the
//! fusion pipeline consumes:
//! - Device enumeration via [`list_devices`]
//! - Per-stream capture via [`CameraCapture`]
//! - The shared frame model via [`Frame`] and [`PixelFormat`]

mod capture;
mod capture_loop;
mod device;
mod types;

pub use capture::CameraCapture;
pub use device::{find_device, list_devices};
pub use types::{
    CameraInfo, CameraSettings, CaptureError, Frame, PixelFormat, Resolution, StreamKind,
};
