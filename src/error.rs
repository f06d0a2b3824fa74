use alloc::string::String;
use enough::StopReason;

/// Errors from planar unpacking, colorspace transforms, and quantization.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BitmapError {
    #[error("bitplane count {0} outside 0..=31")]
    InvalidPlaneCount(usize),

    #[error("bitplane {plane} out of range for a {num_planes}-plane bitmap")]
    PlaneOutOfRange { plane: usize, num_planes: usize },

    #[error("invalid scale factors {scale_x}x{scale_y}")]
    InvalidScale { scale_x: u32, scale_y: u32 },

    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("unsupported bytes per pixel: {0}")]
    UnsupportedBytesPerPixel(usize),

    #[error("bytes per pixel mismatch: expected {expected}, got {actual}")]
    LayoutMismatch { expected: usize, actual: usize },

    #[error("palette too small: need {needed} entries, got {actual}")]
    PaletteTooSmall { needed: usize, actual: usize },

    #[error("palette has {0} entries, indexed output holds at most 256")]
    PaletteTooLarge(usize),

    #[error("palette is empty")]
    EmptyPalette,

    #[error("unsupported variant: {0}")]
    UnsupportedVariant(String),

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("failed to allocate {bytes} bytes")]
    AllocationFailed { bytes: usize },

    #[error("operation cancelled")]
    Cancelled(StopReason),
}

impl From<StopReason> for BitmapError {
    fn from(r: StopReason) -> Self {
        BitmapError::Cancelled(r)
    }
}
