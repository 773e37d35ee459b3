//! Blend-policy resolution: which transforms run this tick, and how the
//! results combine.
//!
//! The three facet flags are independent; the resulting eight combinations
//! are NOT a uniform function of the flags, so the dispatch is written as
//! an explicit table rather than nested conditionals. In particular the
//! colormap-then-invert post-step fires only when `thermal_contour` and
//! `thermal_colormap` are both set, regardless of `visible_contour`.

use crate::camera::Frame;

use super::colormap::{colorize, invert};
use super::edges::edge_enhance;
use super::overlay::overlay_composite;

/// Immutable per-tick snapshot of the externally-owned view settings.
///
/// The control layer owns the live values and may change them between
/// ticks; the pipeline reads one snapshot at the top of each tick and
/// never writes back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionSettings {
    /// Edge-enhance the thermal stream before blending
    pub thermal_contour: bool,
    /// Edge-enhance the visible stream before blending
    pub visible_contour: bool,
    /// False-color the thermal stream
    pub thermal_colormap: bool,
    /// ThermaVue keyed overlay; when set, the facet flags above are
    /// ignored and opacity plays no role
    pub overlay: bool,
    /// Blend weight of the thermal variant in [0, 1]
    pub opacity: f32,
}

impl FusionSettings {
    /// Opacity forced into [0, 1]. Out-of-range values are a caller bug
    /// the pipeline tolerates by clamping, never by panicking.
    pub fn clamped_opacity(&self) -> f32 {
        if self.opacity.is_nan() {
            0.5
        } else {
            self.opacity.clamp(0.0, 1.0)
        }
    }
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            thermal_contour: false,
            visible_contour: false,
            thermal_colormap: false,
            overlay: false,
            opacity: 0.5,
        }
    }
}

/// Linear interpolation of two same-layout color frames.
///
/// `result = visible * (1 - opacity) + thermal * opacity` per channel.
/// Opacity 0 reproduces `visible` exactly; 1 reproduces `thermal` exactly.
pub fn blend(visible: &Frame, thermal: &Frame, opacity: f32) -> Frame {
    assert!(
        visible.same_layout(thermal),
        "blend inputs must share layout"
    );

    let opacity = opacity.clamp(0.0, 1.0);
    let inverse = 1.0 - opacity;

    let data = visible
        .data
        .iter()
        .zip(thermal.data.iter())
        .map(|(&v, &t)| (v as f32 * inverse + t as f32 * opacity + 0.5) as u8)
        .collect();

    Frame::new(data, visible.width, visible.height, visible.format)
}

/// Resolve the current settings into one fused frame.
///
/// Overlay mode short-circuits before the facet table: the pipeline must
/// not rely on the UI clearing the facet flags when ThermaVue is active.
///
/// Facet table (thermal_contour, visible_contour, thermal_colormap):
///
/// | tc | vc | cm | thermal variant   | visible side  | post-step          |
/// |----|----|----|-------------------|---------------|--------------------|
/// | F  | F  | F  | raw               | raw           | -                  |
/// | F  | F  | T  | colormapped       | raw           | -                  |
/// | F  | T  | F  | raw               | edge-enhanced | -                  |
/// | F  | T  | T  | colormapped       | edge-enhanced | -                  |
/// | T  | F  | F  | edge-enhanced     | raw           | -                  |
/// | T  | F  | T  | edge-enhanced     | raw           | colormap + invert  |
/// | T  | T  | F  | edge-enhanced     | edge-enhanced | -                  |
/// | T  | T  | T  | edge-enhanced     | edge-enhanced | colormap + invert  |
pub fn fuse(
    visible: &Frame,
    thermal: &Frame,
    settings: &FusionSettings,
    overlay_threshold: u8,
) -> Frame {
    if settings.overlay {
        return overlay_composite(visible, thermal, overlay_threshold);
    }

    let opacity = settings.clamped_opacity();

    match (
        settings.thermal_contour,
        settings.visible_contour,
        settings.thermal_colormap,
    ) {
        (false, false, false) => blend(visible, thermal, opacity),
        (false, false, true) => blend(visible, &colorize(thermal), opacity),
        (false, true, false) => blend(&edge_enhance(visible), thermal, opacity),
        (false, true, true) => blend(&edge_enhance(visible), &colorize(thermal), opacity),
        (true, false, false) => blend(visible, &edge_enhance(thermal), opacity),
        (true, false, true) => {
            let fused = blend(visible, &edge_enhance(thermal), opacity);
            invert(&colorize(&fused))
        }
        (true, true, false) => blend(&edge_enhance(visible), &edge_enhance(thermal), opacity),
        (true, true, true) => {
            let fused = blend(&edge_enhance(visible), &edge_enhance(thermal), opacity);
            invert(&colorize(&fused))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PixelFormat;

    fn settings(tc: bool, vc: bool, cm: bool) -> FusionSettings {
        FusionSettings {
            thermal_contour: tc,
            visible_contour: vc,
            thermal_colormap: cm,
            overlay: false,
            opacity: 0.5,
        }
    }

    #[test]
    fn test_blend_opacity_zero_is_visible() {
        let visible = Frame::new((0..27).collect(), 3, 3, PixelFormat::Rgb);
        let thermal = Frame::filled(255, 3, 3, PixelFormat::Rgb);
        let fused = blend(&visible, &thermal, 0.0);
        assert_eq!(fused.data, visible.data);
    }

    #[test]
    fn test_blend_opacity_one_is_thermal() {
        let visible = Frame::filled(13, 3, 3, PixelFormat::Rgb);
        let thermal = Frame::new((0..27).rev().collect(), 3, 3, PixelFormat::Rgb);
        let fused = blend(&visible, &thermal, 1.0);
        assert_eq!(fused.data, thermal.data);
    }

    #[test]
    fn test_blend_midpoint() {
        let visible = Frame::filled(0, 2, 2, PixelFormat::Rgb);
        let thermal = Frame::filled(200, 2, 2, PixelFormat::Rgb);
        let fused = blend(&visible, &thermal, 0.5);
        assert!(fused.data.iter().all(|&b| b == 100));
    }

    #[test]
    fn test_blend_clamps_out_of_range_opacity() {
        let visible = Frame::filled(10, 2, 2, PixelFormat::Rgb);
        let thermal = Frame::filled(250, 2, 2, PixelFormat::Rgb);
        let over = blend(&visible, &thermal, 3.0);
        assert_eq!(over.data, thermal.data);
        let under = blend(&visible, &thermal, -1.0);
        assert_eq!(under.data, visible.data);
    }

    #[test]
    fn test_clamped_opacity_handles_nan() {
        let mut s = FusionSettings::default();
        s.opacity = f32::NAN;
        let o = s.clamped_opacity();
        assert!((0.0..=1.0).contains(&o));
    }

    #[test]
    fn test_overlay_short_circuits_facets() {
        // With overlay set, facet flags must not change the output.
        let visible = Frame::filled(60, 8, 8, PixelFormat::Rgb);
        let thermal = Frame::filled(0, 8, 8, PixelFormat::Rgb);

        let mut a = settings(true, true, true);
        a.overlay = true;
        let mut b = settings(false, false, false);
        b.overlay = true;

        let fused_a = fuse(&visible, &thermal, &a, 100);
        let fused_b = fuse(&visible, &thermal, &b, 100);
        assert_eq!(fused_a.data, fused_b.data);
        // All-cold thermal means no objects: output equals visible.
        assert_eq!(fused_a.data, visible.data);
    }

    #[test]
    fn test_invert_post_step_fires_only_with_both_flags() {
        // (tc=T, cm=T) arms invert; (tc=F, cm=T) must not, whatever the
        // visible flag says.
        let visible = Frame::filled(128, 8, 8, PixelFormat::Rgb);
        let thermal = Frame::filled(128, 8, 8, PixelFormat::Rgb);

        let plain_map = fuse(&visible, &thermal, &settings(false, false, true), 100);
        let expected = blend(&visible, &colorize(&thermal), 0.5);
        assert_eq!(plain_map.data, expected.data);

        let inverted = fuse(&visible, &thermal, &settings(true, false, true), 100);
        let fused = blend(&visible, &edge_enhance(&thermal), 0.5);
        let expected_inv = invert(&colorize(&fused));
        assert_eq!(inverted.data, expected_inv.data);
    }

    #[test]
    fn test_all_eight_arms_produce_output() {
        let visible = Frame::filled(90, 8, 8, PixelFormat::Rgb);
        let thermal = Frame::filled(170, 8, 8, PixelFormat::Rgb);
        for bits in 0..8u8 {
            let s = settings(bits & 4 != 0, bits & 2 != 0, bits & 1 != 0);
            let fused = fuse(&visible, &thermal, &s, 100);
            assert!(fused.same_layout(&visible), "arm {:03b} broke layout", bits);
        }
    }
}
