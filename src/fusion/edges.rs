//! Gradient-magnitude edge enhancement for the contour modes.
//!
//! The enhancer is a pure function: noise suppression with a small
//! Gaussian, Sobel gradients in both directions, Euclidean magnitude per
//! pixel per channel, saturated back to 8-bit. Same input, same output —
//! there is no hidden state.

use crate::camera::{Frame, PixelFormat};

use super::convolve::{blur_plane, GAUSS_5};

/// Produce a contour-emphasized variant of a color frame.
///
/// Steps:
/// 1. Convert to YUV (BT.601) so gradients run over luma/chroma planes.
/// 2. 5x5 Gaussian smoothing per plane to suppress sensor noise.
/// 3. 3x3 Sobel gradients per plane, combined as sqrt(gx^2 + gy^2).
/// 4. Saturate magnitudes to the 0-255 range.
///
/// The output channels carry the per-plane gradient magnitudes; flat
/// regions go black, object boundaries light up.
pub fn edge_enhance(frame: &Frame) -> Frame {
    assert_eq!(frame.format, PixelFormat::Rgb, "edge_enhance expects Rgb");

    let width = frame.width as usize;
    let height = frame.height as usize;

    let planes = to_yuv_planes(frame);
    let mut out = vec![0u8; width * height * 3];

    for (c, plane) in planes.iter().enumerate() {
        let smoothed = blur_plane(plane, width, height, &GAUSS_5);
        let magnitude = sobel_magnitude(&smoothed, width, height);
        for (i, &m) in magnitude.iter().enumerate() {
            out[i * 3 + c] = m;
        }
    }

    Frame::new(out, frame.width, frame.height, PixelFormat::Rgb)
}

/// Split an RGB frame into planar YUV (BT.601, integer math).
///
/// Coefficients are scaled by 1000 to keep the hot path in integer
/// arithmetic: Y = 0.299R + 0.587G + 0.114B, U = 0.492(B-Y) + 128,
/// V = 0.877(R-Y) + 128.
fn to_yuv_planes(frame: &Frame) -> [Vec<u8>; 3] {
    let count = frame.pixel_count();
    let mut y_plane = Vec::with_capacity(count);
    let mut u_plane = Vec::with_capacity(count);
    let mut v_plane = Vec::with_capacity(count);

    for px in frame.data.chunks_exact(3) {
        let r = px[0] as i32;
        let g = px[1] as i32;
        let b = px[2] as i32;

        let y = (299 * r + 587 * g + 114 * b) / 1000;
        let u = (492 * (b - y)) / 1000 + 128;
        let v = (877 * (r - y)) / 1000 + 128;

        y_plane.push(y.clamp(0, 255) as u8);
        u_plane.push(u.clamp(0, 255) as u8);
        v_plane.push(v.clamp(0, 255) as u8);
    }

    [y_plane, u_plane, v_plane]
}

/// Sobel gradient magnitude of one plane, saturated to u8.
///
/// Kernels:
/// ```text
/// Gx:          Gy:
/// [-1  0  1]   [-1 -2 -1]
/// [-2  0  2]   [ 0  0  0]
/// [-1  0  1]   [ 1  2  1]
/// ```
///
/// Out-of-bounds taps clamp to the nearest edge pixel, so border pixels
/// get a usable gradient instead of a black frame margin.
fn sobel_magnitude(plane: &[u8], width: usize, height: usize) -> Vec<u8> {
    const SOBEL_X: [[i32; 3]; 3] = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];
    const SOBEL_Y: [[i32; 3]; 3] = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

    let mut out = vec![0u8; plane.len()];

    for y in 0..height {
        for x in 0..width {
            let mut gx = 0i32;
            let mut gy = 0i32;

            for ky in 0..3 {
                let sy = (y as isize + ky as isize - 1).clamp(0, height as isize - 1) as usize;
                for kx in 0..3 {
                    let sx = (x as isize + kx as isize - 1).clamp(0, width as isize - 1) as usize;
                    let val = plane[sy * width + sx] as i32;
                    gx += val * SOBEL_X[ky][kx];
                    gy += val * SOBEL_Y[ky][kx];
                }
            }

            let magnitude = ((gx * gx + gy * gy) as f64).sqrt().round();
            out[y * width + x] = magnitude.min(255.0) as u8;
        }
    }

    out
}
