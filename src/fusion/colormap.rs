//! False-color mapping of intensity frames.
//!
//! The palette is the classic jet-style blue -> cyan -> yellow -> red ramp
//! indexed by intensity 0-255. It is computed once and shared process-wide;
//! colorization itself is stateless and deterministic.

use std::sync::LazyLock;

use crate::camera::{Frame, PixelFormat};

use super::convolve::{blur_plane, GAUSS_3};

/// The 256-entry false-color palette, computed once per process.
pub static JET_PALETTE: LazyLock<[[u8; 3]; 256]> = LazyLock::new(|| {
    let mut palette = [[0u8; 3]; 256];
    for (i, entry) in palette.iter_mut().enumerate() {
        *entry = jet(i as f32 / 255.0);
    }
    palette
});

/// One jet ramp sample for t in [0, 1].
///
/// Piecewise-linear channel ramps: blue peaks at the cold end, red at the
/// hot end, green in the middle.
fn jet(t: f32) -> [u8; 3] {
    let r = (1.5 - (4.0 * t - 3.0).abs()).clamp(0.0, 1.0);
    let g = (1.5 - (4.0 * t - 2.0).abs()).clamp(0.0, 1.0);
    let b = (1.5 - (4.0 * t - 1.0).abs()).clamp(0.0, 1.0);
    [
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    ]
}

/// BT.601 luminance of one pixel (integer math, coefficients x1000).
pub(crate) fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
}

/// Reduce a frame to its per-pixel intensity.
pub(crate) fn to_gray(frame: &Frame) -> Vec<u8> {
    match frame.format {
        PixelFormat::Gray => frame.data.clone(),
        PixelFormat::Rgb => frame
            .data
            .chunks_exact(3)
            .map(|px| luma(px[0], px[1], px[2]))
            .collect(),
        PixelFormat::Rgba => frame
            .data
            .chunks_exact(4)
            .map(|px| luma(px[0], px[1], px[2]))
            .collect(),
    }
}

/// Map a frame's intensity through the false-color palette.
///
/// The palette lookup is followed by a light 3x3 smoothing pass that
/// softens the banding a 256-entry table produces on slow gradients.
pub fn colorize(frame: &Frame) -> Frame {
    let width = frame.width as usize;
    let height = frame.height as usize;

    let gray = to_gray(frame);
    let palette = &*JET_PALETTE;

    // One plane per output channel so the smoothing pass stays separable.
    let mut channels: [Vec<u8>; 3] = [
        Vec::with_capacity(gray.len()),
        Vec::with_capacity(gray.len()),
        Vec::with_capacity(gray.len()),
    ];
    for &v in &gray {
        let color = palette[v as usize];
        channels[0].push(color[0]);
        channels[1].push(color[1]);
        channels[2].push(color[2]);
    }

    let mut data = vec![0u8; width * height * 3];
    for (c, plane) in channels.iter().enumerate() {
        let smoothed = blur_plane(plane, width, height, &GAUSS_3);
        for (i, &v) in smoothed.iter().enumerate() {
            data[i * 3 + c] = v;
        }
    }

    Frame::new(data, frame.width, frame.height, PixelFormat::Rgb)
}

/// Photometric inversion: 255 - value in every color channel.
///
/// Alpha, when present, is preserved.
pub fn invert(frame: &Frame) -> Frame {
    let bpp = frame.bytes_per_pixel();
    let color_channels = match frame.format {
        PixelFormat::Gray => 1,
        PixelFormat::Rgb => 3,
        PixelFormat::Rgba => 3,
    };

    let mut data = Vec::with_capacity(frame.data.len());
    for px in frame.data.chunks_exact(bpp) {
        for (c, &v) in px.iter().enumerate() {
            data.push(if c < color_channels { 255 - v } else { v });
        }
    }

    Frame::new(data, frame.width, frame.height, frame.format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_endpoints() {
        let palette = &*JET_PALETTE;
        // Cold end is blue-dominant, hot end red-dominant.
        assert!(palette[0][2] > palette[0][0]);
        assert!(palette[255][0] > palette[255][2]);
        // Midpoint is green-dominant.
        assert!(palette[128][1] > palette[128][0]);
        assert!(palette[128][1] > palette[128][2]);
    }

    #[test]
    fn test_colorize_all_zero_is_uniform_cold() {
        let frame = Frame::filled(0, 8, 8, PixelFormat::Rgb);
        let colored = colorize(&frame);
        let expected = JET_PALETTE[0];
        for px in colored.data.chunks_exact(3) {
            assert_eq!(px, &expected);
        }
    }

    #[test]
    fn test_colorize_all_max_is_uniform_hot() {
        let frame = Frame::filled(255, 8, 8, PixelFormat::Rgb);
        let colored = colorize(&frame);
        let expected = JET_PALETTE[255];
        for px in colored.data.chunks_exact(3) {
            assert_eq!(px, &expected);
        }
    }

    #[test]
    fn test_colorize_accepts_gray_frames() {
        let frame = Frame::filled(64, 4, 4, PixelFormat::Gray);
        let colored = colorize(&frame);
        assert_eq!(colored.format, PixelFormat::Rgb);
        assert_eq!(colored.data.len(), 4 * 4 * 3);
    }

    #[test]
    fn test_invert_is_involution() {
        let frame = Frame::new(vec![0, 50, 100, 255, 128, 7], 2, 1, PixelFormat::Rgb);
        let twice = invert(&invert(&frame));
        assert_eq!(twice.data, frame.data);
    }

    #[test]
    fn test_invert_preserves_alpha() {
        let frame = Frame::new(vec![10, 20, 30, 200], 1, 1, PixelFormat::Rgba);
        let inverted = invert(&frame);
        assert_eq!(inverted.data, vec![245, 235, 225, 200]);
    }

    #[test]
    fn test_luma_bt601() {
        assert_eq!(luma(255, 0, 0), 76);
        assert_eq!(luma(0, 255, 0), 149);
        assert_eq!(luma(0, 0, 255), 29);
        assert_eq!(luma(255, 255, 255), 255);
    }
}
