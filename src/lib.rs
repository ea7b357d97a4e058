#![forbid(unsafe_code)]

//! Two-stage wavelet + block-DCT denoise core for a raw photo processing
//! pipeline.
//!
//! [`denoise`] runs an undecimated wavelet shrinkage pass on luminance and
//! chrominance (see [`mod@wavelet`] doc references below), followed by a
//! tiled, overlapped block-DCT detail recovery pass that restores fine
//! structure the wavelet pass over-smoothed. Raw loading, demosaicing,
//! color management and tone mapping are out of scope; this crate consumes
//! a gamma-corrected RGB tile, a [`WorkingProfile`], and an exposure
//! compensation value supplied by the surrounding pipeline through
//! [`PipelineAdapter`].
//!
//! ## Cargo features
//!
//! - `simd` (default): enables `fearless_simd`-backed inner loops for the
//!   shrinkage math, with an identical scalar fallback when disabled.
//! - `image`: adds `From`/`TryFrom` conversions between [`RgbImage`] and
//!   `image::Rgb32FImage`, for callers already using the `image` crate.

mod box_blur;
mod config;
mod curve;
mod dct;
mod detail_mask;
mod driver;
mod error;
mod mad;
mod math;
mod median;
mod noise_field;
mod pipeline_adapter;
mod plane;
mod rect;
mod rgb_image;
mod runtime;
mod shrink;
mod wavelet;

#[cfg(feature = "image")]
mod integration;

pub use config::{ChromaMethod, DenoiseConfig, MedianConfig, MedianKind, NoiseCurves};
pub use driver::{denoise, denoise_into};
pub use error::{
    ordered_f32::OrderedF32, AllocationError, ConfigError, Diagnostic, DenoiseError,
    DimensionError, Result,
};
pub use mad::mad_rgb;
pub use median::median;
pub use pipeline_adapter::{FixedAdapter, PipelineAdapter};
pub use plane::Plane;
pub use rgb_image::{ColorSpace, GammaLut, RgbImage, WorkingProfile};
pub use runtime::DenoiseRuntime;

#[cfg(feature = "image")]
pub use integration::ImageConversionError;
