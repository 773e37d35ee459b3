//! Keyed object overlay ("ThermaVue" mode).
//!
//! Instead of blending whole frames, this mode segments thermally
//! interesting objects out of the thermal stream and draws only those,
//! false-colored and fully opaque, over the visible background. Opacity
//! never enters this path.

use crate::camera::{Frame, PixelFormat};

use super::colormap::{colorize, invert, luma};

/// Default segmentation cutoff on the inverted thermal intensity.
///
/// Pixels whose inverted luma is above the cutoff are background; at or
/// below, object. The sensor's native polarity maps hot objects to high
/// raw intensity, so inversion makes them dark and keeps them under the
/// cutoff. Tunable per rig; 100 is the documented default.
pub const DEFAULT_OBJECT_THRESHOLD: u8 = 100;

/// Composite thermally-segmented objects over the visible frame.
///
/// In order: photometric-invert the thermal frame, segment it against
/// `threshold`, black out the background, palette-map the remainder, key
/// the background transparent, and source-over the result onto the opaque
/// visible frame. A frame with no object pixels reproduces the visible
/// input exactly; that is a valid outcome, not an error.
pub fn overlay_composite(visible: &Frame, thermal: &Frame, threshold: u8) -> Frame {
    assert!(
        visible.same_layout(thermal),
        "overlay inputs must share layout"
    );

    let inverted = invert(thermal);
    let masked = mask_background(&inverted, threshold);
    let colored = colorize(&masked);
    let objects = keyed_alpha(&colored, &masked);
    let base = opaque_rgba(visible);
    let composite = source_over(&objects, &base);
    flatten_rgb(&composite)
}

/// Zero out background pixels, keeping the object pixels untouched.
fn mask_background(frame: &Frame, threshold: u8) -> Frame {
    let mut data = Vec::with_capacity(frame.data.len());
    for px in frame.data.chunks_exact(3) {
        if luma(px[0], px[1], px[2]) > threshold {
            data.extend_from_slice(&[0, 0, 0]);
        } else {
            data.extend_from_slice(px);
        }
    }
    Frame::new(data, frame.width, frame.height, PixelFormat::Rgb)
}

/// Attach an alpha channel keyed on the mask frame.
///
/// Transparency is derived, not re-thresholded: wherever the masked frame
/// is exactly black the output is fully transparent, everywhere else fully
/// opaque. The color data comes from `colored`.
fn keyed_alpha(colored: &Frame, masked: &Frame) -> Frame {
    let mut data = Vec::with_capacity(colored.pixel_count() * 4);
    for (color, key) in colored
        .data
        .chunks_exact(3)
        .zip(masked.data.chunks_exact(3))
    {
        let alpha = if key == &[0, 0, 0] { 0 } else { 255 };
        data.extend_from_slice(&[color[0], color[1], color[2], alpha]);
    }
    Frame::new(data, colored.width, colored.height, PixelFormat::Rgba)
}

/// Promote a color frame to fully opaque RGBA.
fn opaque_rgba(frame: &Frame) -> Frame {
    let mut data = Vec::with_capacity(frame.pixel_count() * 4);
    for px in frame.data.chunks_exact(3) {
        data.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
    Frame::new(data, frame.width, frame.height, PixelFormat::Rgba)
}

/// Standard source-over compositing of `top` onto `base`.
///
/// With the binary alpha this mode produces, object pixels replace the
/// background outright and transparent pixels show it through unchanged.
fn source_over(top: &Frame, base: &Frame) -> Frame {
    let mut data = Vec::with_capacity(top.data.len());
    for (t, b) in top.data.chunks_exact(4).zip(base.data.chunks_exact(4)) {
        let alpha = t[3] as u32;
        for c in 0..3 {
            let blended = (t[c] as u32 * alpha + b[c] as u32 * (255 - alpha) + 127) / 255;
            data.push(blended as u8);
        }
        // Base layer is opaque, so the composite is too.
        data.push(255);
    }
    Frame::new(data, top.width, top.height, PixelFormat::Rgba)
}

/// Drop the alpha channel for the render sink.
fn flatten_rgb(frame: &Frame) -> Frame {
    let mut data = Vec::with_capacity(frame.pixel_count() * 3);
    for px in frame.data.chunks_exact(4) {
        data.extend_from_slice(&px[..3]);
    }
    Frame::new(data, frame.width, frame.height, PixelFormat::Rgb)
}
