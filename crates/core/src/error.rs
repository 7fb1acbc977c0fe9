/// Result alias that carries the custom [`SyncError`] type.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Common error type for the engine.
///
/// Contract violations are reported before any computation starts. Numerical
/// degeneracies are only raised where a value cannot be produced at all; blow-up
/// inside an integration is left in the data and classified on request through
/// [`crate::Trajectory::check_finite`].
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The caller supplied parameters the engine cannot work with (empty grid,
    /// non-positive step, mismatched vector lengths, zero oscillators, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A ratio whose denominator vanished, e.g. zero noise power in an SNR.
    #[error("degenerate division: {0}")]
    DivisionDegenerate(String),
    /// A trajectory contains non-finite values.
    #[error("non-finite state at step {step} (t = {time})")]
    NumericOverflow { step: usize, time: f64 },
    /// Wrapper around FFT planner errors.
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
    /// Configuration documents that failed to parse.
    #[error("{0}")]
    Config(#[from] serde_json::Error),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Creates an [`SyncError::InvalidInput`] from any message.
    pub fn invalid<T: Into<String>>(msg: T) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates an [`SyncError::DivisionDegenerate`] from any message.
    pub fn degenerate<T: Into<String>>(msg: T) -> Self {
        Self::DivisionDegenerate(msg.into())
    }
}
