//! The per-frame fusion pipeline.
//!
//! One tick flows through this module end to end, synchronously and
//! without shared state:
//!
//! 1. **Preprocessing** - both raw frames to a common size and color space
//! 2. **Mode resolution** - the facet flags pick a composition of raw,
//!    edge-enhanced, and false-colored variants, blended by opacity
//! 3. **Overlay** - the ThermaVue path keys segmented hot objects over the
//!    visible background, ignoring opacity entirely
//!
//! Every transform consumes borrowed frames and produces a new frame, so
//! the same preprocessed source can feed several variants in one tick.

mod colormap;
mod convolve;
mod edges;
mod mode;
mod overlay;
mod preprocess;

pub use colormap::{colorize, invert, JET_PALETTE};
pub use edges::edge_enhance;
pub use mode::{blend, fuse, FusionSettings};
pub use overlay::{overlay_composite, DEFAULT_OBJECT_THRESHOLD};
pub use preprocess::{mirror_horizontal, preprocess, resize, to_rgb, MIRROR_VISIBLE};
