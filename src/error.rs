use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported to callers of the option and device surfaces.
///
/// Missing frame metadata is not an error: readers fall back to the host
/// clock and report it through the timestamp domain instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The operation does not exist for this option or device
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Value outside the option's domain, or hardware flagged it untrustworthy
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Only meaningful in another device state (e.g. while streaming)
    #[error("wrong api call sequence: {0}")]
    WrongApiCallSequence(String),

    /// Transport or endpoint collaborator failure
    #[error("backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl Error {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }

    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    pub fn wrong_sequence(msg: impl Into<String>) -> Self {
        Self::WrongApiCallSequence(msg.into())
    }
}
