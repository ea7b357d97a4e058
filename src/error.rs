//! Error types for the denoise core.

use core::fmt;

/// The main error type for denoise operations.
#[derive(Debug, Clone, PartialEq)]
pub enum DenoiseError {
    /// Invalid or out-of-range configuration.
    Config(ConfigError),
    /// Source/destination dimension mismatch, or a plane too small for the
    /// requested wavelet depth.
    Dimension(DimensionError),
    /// Failure to allocate scratch, pyramid or DCT-plan buffers.
    Allocation(AllocationError),
}

/// Errors related to out-of-range or inconsistent `DenoiseConfig` /
/// `NoiseCurves` fields, rejected at the `denoise()` call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `luma` was outside `[0, 100]`.
    LumaOutOfRange(i32),
    /// `chroma` was outside `[0, 100]`.
    ChromaOutOfRange(i32),
    /// `chroma_red_green` or `chroma_blue_yellow` was outside `[-100, 100]`.
    ChromaBalanceOutOfRange(ordered_f32::OrderedF32),
    /// `luminance_detail` was outside `[0, 99.9]`.
    LuminanceDetailOutOfRange(ordered_f32::OrderedF32),
    /// `luminance_detail_thresh` was outside `[0, 100]`.
    LuminanceDetailThreshOutOfRange(i32),
    /// `gamma` was outside `[1.0, 3.0]`.
    GammaOutOfRange(ordered_f32::OrderedF32),
    /// `median.iterations` was zero.
    MedianIterationsZero,
}

// `f32` doesn't implement `Eq`; the config-error variants only ever carry
// values rejected by `validate()`, so bitwise comparison is good enough and
// keeps `ConfigError: Eq` for easy `assert_eq!` in tests. `MedianConfig`
// reuses it for the same reason it needs an `Eq`-able bound field. Public,
// not `pub(crate)`: both use sites appear in this crate's public interface.
pub mod ordered_f32 {
    use core::fmt;

    /// An `f32` newtype with bitwise `Eq`, for fields that need to derive it.
    #[derive(Debug, Clone, Copy)]
    pub struct OrderedF32(pub f32);

    impl PartialEq for OrderedF32 {
        fn eq(&self, other: &Self) -> bool {
            self.0.to_bits() == other.0.to_bits()
        }
    }
    impl Eq for OrderedF32 {}

    impl fmt::Display for OrderedF32 {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl From<f32> for OrderedF32 {
        fn from(v: f32) -> Self {
            Self(v)
        }
    }
}

/// Errors related to image or plane dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionError {
    /// `src` and `dst` have different dimensions.
    Mismatch {
        /// Source width/height.
        src: (u32, u32),
        /// Destination width/height.
        dst: (u32, u32),
    },
    /// A plane's smaller dimension was less than `2^levels`.
    TooSmallForLevels {
        /// Requested decomposition level count.
        levels: u32,
        /// `min(width, height)` of the plane.
        min_dim: u32,
    },
    /// A plane had a zero dimension.
    Empty,
}

/// Errors related to scratch, pyramid, or DCT-plan allocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationError {
    /// Failed to allocate wavelet pyramid buffers.
    Pyramid,
    /// Failed to allocate shrink scratch buffers.
    ShrinkScratch,
    /// Failed to build or allocate DCT plans or block-row buffers.
    DctEngine,
}

impl fmt::Display for DenoiseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::Dimension(e) => write!(f, "{e}"),
            Self::Allocation(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LumaOutOfRange(v) => write!(f, "luma amount {v} is outside [0, 100]"),
            Self::ChromaOutOfRange(v) => write!(f, "chroma amount {v} is outside [0, 100]"),
            Self::ChromaBalanceOutOfRange(v) => {
                write!(f, "chroma balance {v} is outside [-100, 100]")
            }
            Self::LuminanceDetailOutOfRange(v) => {
                write!(f, "luminance detail {v} is outside [0, 99.9]")
            }
            Self::LuminanceDetailThreshOutOfRange(v) => {
                write!(f, "luminance detail threshold {v} is outside [0, 100]")
            }
            Self::GammaOutOfRange(v) => write!(f, "gamma {v} is outside [1.0, 3.0]"),
            Self::MedianIterationsZero => {
                write!(f, "median filter requires at least one iteration")
            }
        }
    }
}

impl fmt::Display for DimensionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch { src, dst } => {
                write!(
                    f,
                    "source dimensions {}x{} do not match destination {}x{}",
                    src.0, src.1, dst.0, dst.1
                )
            }
            Self::TooSmallForLevels { levels, min_dim } => {
                write!(
                    f,
                    "plane's smaller dimension {min_dim} is too small for {levels} wavelet levels"
                )
            }
            Self::Empty => write!(f, "plane has a zero dimension"),
        }
    }
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pyramid => write!(f, "failed to allocate wavelet pyramid buffers"),
            Self::ShrinkScratch => write!(f, "failed to allocate shrink scratch buffers"),
            Self::DctEngine => write!(f, "failed to build DCT plans or block-row buffers"),
        }
    }
}

impl std::error::Error for DenoiseError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for DimensionError {}
impl std::error::Error for AllocationError {}

impl From<ConfigError> for DenoiseError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<DimensionError> for DenoiseError {
    fn from(e: DimensionError) -> Self {
        Self::Dimension(e)
    }
}

impl From<AllocationError> for DenoiseError {
    fn from(e: AllocationError) -> Self {
        Self::Allocation(e)
    }
}

/// Result type for denoise operations.
pub type Result<T> = core::result::Result<T, DenoiseError>;

macro_rules! bail {
    ($err:expr) => {
        return Err($err.into())
    };
}

pub(crate) use bail;

/// A non-fatal diagnostic surfaced from a stage that degraded gracefully
/// instead of aborting the call (non-finite sample replacement, and the
/// allocation-failure fallbacks around `DctTileEngine`).
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// The stage that produced the diagnostic.
    pub stage: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl Diagnostic {
    pub(crate) fn new(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}
