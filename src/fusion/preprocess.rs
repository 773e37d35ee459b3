//! Geometry and color normalization for the two input streams.
//!
//! Every tick starts here: both raw frames are converted to 3-channel
//! color, resized to the common fusion resolution, and the visible stream
//! gets its fixed orientation correction. Downstream transforms can then
//! assume same-size, same-format inputs.

use crate::camera::{CaptureError, Frame, PixelFormat, Resolution, StreamKind};

/// Orientation correction for the visible stream: mirror horizontally.
///
/// The visible camera is mounted facing the operator while the thermal
/// camera is not, so only the visible stream is flipped. Adjust here if a
/// different rig needs another orientation.
pub const MIRROR_VISIBLE: bool = true;

/// Normalize a pair of raw frames for fusion.
///
/// Fails with [`CaptureError::FrameUnavailable`] if either stream produced
/// no frame this tick; the caller must treat that as fatal rather than
/// rendering from stale or blank data.
pub fn preprocess(
    visible: Option<Frame>,
    thermal: Option<Frame>,
) -> Result<(Frame, Frame), CaptureError> {
    let visible = visible.ok_or(CaptureError::FrameUnavailable(StreamKind::Visible))?;
    let thermal = thermal.ok_or(CaptureError::FrameUnavailable(StreamKind::Thermal))?;

    let target = Resolution::FUSION;
    let mut visible = resize(&to_rgb(visible), target.width, target.height);
    let thermal = resize(&to_rgb(thermal), target.width, target.height);

    if MIRROR_VISIBLE {
        visible = mirror_horizontal(&visible);
    }

    Ok((visible, thermal))
}

/// Convert a frame to 3-channel color.
///
/// Gray frames replicate the intensity into all three channels; Rgba
/// frames drop the alpha channel; Rgb frames pass through unchanged.
pub fn to_rgb(frame: Frame) -> Frame {
    match frame.format {
        PixelFormat::Rgb => frame,
        PixelFormat::Gray => {
            let mut data = Vec::with_capacity(frame.pixel_count() * 3);
            for &v in &frame.data {
                data.extend_from_slice(&[v, v, v]);
            }
            Frame::new(data, frame.width, frame.height, PixelFormat::Rgb)
        }
        PixelFormat::Rgba => {
            let mut data = Vec::with_capacity(frame.pixel_count() * 3);
            for px in frame.data.chunks_exact(4) {
                data.extend_from_slice(&px[..3]);
            }
            Frame::new(data, frame.width, frame.height, PixelFormat::Rgb)
        }
    }
}

/// Resize a frame with bilinear interpolation.
///
/// A frame already at the target size is returned unchanged, so resizing
/// is an exact no-op in that case. Sample positions use the half-pixel
/// convention, matching common image libraries.
pub fn resize(frame: &Frame, width: u32, height: u32) -> Frame {
    if frame.width == width && frame.height == height {
        return frame.clone();
    }

    let channels = frame.bytes_per_pixel();
    let sw = frame.width as usize;
    let sh = frame.height as usize;
    let tw = width as usize;
    let th = height as usize;

    let scale_x = sw as f32 / tw as f32;
    let scale_y = sh as f32 / th as f32;

    let mut data = vec![0u8; tw * th * channels];

    for ty in 0..th {
        let sy = ((ty as f32 + 0.5) * scale_y - 0.5).max(0.0);
        let y0 = sy as usize;
        let y1 = (y0 + 1).min(sh - 1);
        let fy = sy - y0 as f32;

        for tx in 0..tw {
            let sx = ((tx as f32 + 0.5) * scale_x - 0.5).max(0.0);
            let x0 = sx as usize;
            let x1 = (x0 + 1).min(sw - 1);
            let fx = sx - x0 as f32;

            let p00 = (y0 * sw + x0) * channels;
            let p01 = (y0 * sw + x1) * channels;
            let p10 = (y1 * sw + x0) * channels;
            let p11 = (y1 * sw + x1) * channels;
            let out = (ty * tw + tx) * channels;

            for c in 0..channels {
                let top = frame.data[p00 + c] as f32 * (1.0 - fx) + frame.data[p01 + c] as f32 * fx;
                let bottom =
                    frame.data[p10 + c] as f32 * (1.0 - fx) + frame.data[p11 + c] as f32 * fx;
                let value = top * (1.0 - fy) + bottom * fy;
                data[out + c] = (value + 0.5).clamp(0.0, 255.0) as u8;
            }
        }
    }

    Frame::new(data, width, height, frame.format)
}

/// Mirror a frame horizontally (flip left-right).
///
/// Pure: returns a new frame. Applying it twice reproduces the input.
pub fn mirror_horizontal(frame: &Frame) -> Frame {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let bpp = frame.bytes_per_pixel();

    let mut data = vec![0u8; frame.data.len()];
    for y in 0..height {
        let row = y * width * bpp;
        for x in 0..width {
            let src = row + x * bpp;
            let dst = row + (width - 1 - x) * bpp;
            data[dst..dst + bpp].copy_from_slice(&frame.data[src..src + bpp]);
        }
    }

    Frame::new(data, frame.width, frame.height, frame.format)
}
