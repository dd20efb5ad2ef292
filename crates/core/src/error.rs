/// Result alias that carries the custom [`OverlayError`] type.
pub type Result<T> = std::result::Result<T, OverlayError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// Live source access was refused by the user or the platform. The caller
    /// is expected to fall back to "no source" and let the user retry.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// One or more capture/record/decode capabilities are missing. Detected
    /// by the capability probe before any export resource is allocated.
    #[error("unsupported platform: {}", issues.join(", "))]
    UnsupportedPlatform { issues: Vec<String> },

    /// The source audio could not be decoded.
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// The recorder reported an error mid-job. The whole export aborts and no
    /// partial artifact is retained.
    #[error("encode failure: {0}")]
    EncodeFailure(String),

    /// A second analysis path was bound onto an already-bound source. This is
    /// a programming error, not a user-facing condition.
    #[error("source routing conflict: {0}")]
    SourceRoutingConflict(&'static str),

    /// A caller handed the core malformed input.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around FFT planning/processing errors.
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
}

impl OverlayError {
    /// Creates a decode failure that wraps the underlying reason.
    pub fn decode<T: std::fmt::Display>(reason: T) -> Self {
        Self::DecodeFailure(reason.to_string())
    }

    /// Creates an encode failure that wraps the underlying reason.
    pub fn encode<T: std::fmt::Display>(reason: T) -> Self {
        Self::EncodeFailure(reason.to_string())
    }
}
