pub type VidconvResult<T> = Result<T, VidconvError>;

#[derive(thiserror::Error, Debug)]
pub enum VidconvError {
    #[error(
        "dimension mismatch: {width}x{height} RGBA expects {expected} bytes, got {actual}"
    )]
    DimensionMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported kernel size: {0}")]
    UnsupportedKernelSize(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("frame source error: {0}")]
    Source(String),

    #[error("frame sink error: {0}")]
    Sink(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VidconvError {
    pub fn dimension_mismatch(width: u32, height: u32, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            width,
            height,
            expected,
            actual,
        }
    }

    pub fn kernel_size(msg: impl Into<String>) -> Self {
        Self::UnsupportedKernelSize(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}
