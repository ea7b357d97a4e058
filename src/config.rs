//! Caller-facing configuration records: `DenoiseConfig`,
//! `NoiseCurves`, and their `validate()` entry points.

use crate::curve::PiecewiseCurve;
use crate::error::{bail, ConfigError, Result};
use crate::rgb_image::ColorSpace;

/// How the chroma noise-variance slider values are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaMethod {
    /// `chroma_red_green`/`chroma_blue_yellow` are used directly.
    Manual,
    /// `realred`/`realblue` are instead derived per-tile from the tile's own
    /// chroma statistics (median of `|a|`, `|b|`), the `autochroma` mode.
    Automatic,
}

/// One of the six fixed median-filter neighborhoods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MedianKind {
    Soft3x3,
    Strong3x3,
    Soft5x5,
    Strong5x5,
    Size7x7,
    Size9x9,
}

/// Optional pre-wavelet median pass configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MedianConfig {
    pub kind: MedianKind,
    pub iterations: u32,
    /// Pixels whose source value exceeds this are passed through unchanged.
    pub bound: Option<crate::error::ordered_f32::OrderedF32>,
}

/// The denoise core's configuration record.
#[derive(Debug, Clone, Copy)]
pub struct DenoiseConfig {
    pub enabled: bool,
    /// `0..=100`; `0` disables the luma wavelet+DCT shrink entirely.
    pub luma: i32,
    /// `0..=100`; master chroma shrink amount.
    pub chroma: i32,
    pub chroma_red_green: f32,
    pub chroma_blue_yellow: f32,
    pub chroma_method: ChromaMethod,
    /// `0.0..=99.9`; drives `detail_hi` in the DCT engine.
    pub luminance_detail: f32,
    /// `0..=100`; `0` disables `DetailMask`.
    pub luminance_detail_thresh: i32,
    /// Enables bi-shrink wavelet mode and bumps the wavelet level count.
    pub aggressive: bool,
    /// `1.0..=3.0`.
    pub gamma: f32,
    pub color_space: ColorSpace,
    pub median: Option<MedianConfig>,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            luma: 0,
            chroma: 0,
            chroma_red_green: 0.0,
            chroma_blue_yellow: 0.0,
            chroma_method: ChromaMethod::Manual,
            luminance_detail: 50.0,
            luminance_detail_thresh: 0,
            aggressive: false,
            gamma: 1.7,
            color_space: ColorSpace::Lab,
            median: None,
        }
    }
}

impl DenoiseConfig {
    /// Rejects out-of-range fields at the `denoise()` call boundary.
    pub fn validate(&self) -> Result<()> {
        if !(0..=100).contains(&self.luma) {
            bail!(ConfigError::LumaOutOfRange(self.luma));
        }
        if !(0..=100).contains(&self.chroma) {
            bail!(ConfigError::ChromaOutOfRange(self.chroma));
        }
        if !(-100.0..=100.0).contains(&self.chroma_red_green) {
            bail!(ConfigError::ChromaBalanceOutOfRange(self.chroma_red_green.into()));
        }
        if !(-100.0..=100.0).contains(&self.chroma_blue_yellow) {
            bail!(ConfigError::ChromaBalanceOutOfRange(self.chroma_blue_yellow.into()));
        }
        if !(0.0..=99.9).contains(&self.luminance_detail) {
            bail!(ConfigError::LuminanceDetailOutOfRange(self.luminance_detail.into()));
        }
        if !(0..=100).contains(&self.luminance_detail_thresh) {
            bail!(ConfigError::LuminanceDetailThreshOutOfRange(self.luminance_detail_thresh));
        }
        if !(1.0..=3.0).contains(&self.gamma) {
            bail!(ConfigError::GammaOutOfRange(self.gamma.into()));
        }
        if let Some(m) = &self.median {
            if m.iterations == 0 {
                bail!(ConfigError::MedianIterationsZero);
            }
        }
        Ok(())
    }

    /// Short-circuit: nothing at all is requested.
    pub(crate) fn is_noop(&self, noise_curves: &NoiseCurves) -> bool {
        !self.enabled
            || (self.luma == 0 && self.chroma == 0 && self.median.is_none() && !noise_curves.active())
    }
}

/// Optional per-pixel noise-variance curves.
#[derive(Debug, Clone, Default)]
pub struct NoiseCurves {
    pub luma_curve: Option<PiecewiseCurve>,
    pub chroma_curve: Option<PiecewiseCurve>,
}

impl NoiseCurves {
    pub fn active(&self) -> bool {
        self.luma_curve.is_some() || self.chroma_curve.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_noop() {
        let cfg = DenoiseConfig::default();
        assert!(cfg.is_noop(&NoiseCurves::default()));
    }

    #[test]
    fn validate_rejects_out_of_range_luma() {
        let cfg = DenoiseConfig {
            luma: 150,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(DenoiseConfig::default().validate().is_ok());
    }
}
