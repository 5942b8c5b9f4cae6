use std::fmt;

/// Failure of a display policy operation.
#[derive(Debug)]
pub enum PolicyError<E> {
    /// The repository collaborator failed; nothing was written.
    Repository(E),
    /// The persisted threshold setting is not a number.
    InvalidThreshold(String),
    /// A threshold write outside `[0, 100]`.
    ThresholdOutOfRange(f64),
}

impl<E: fmt::Display> fmt::Display for PolicyError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::Repository(e) => write!(f, "repository error: {e}"),
            PolicyError::InvalidThreshold(raw) => {
                write!(f, "persisted threshold is not a number: {raw:?}")
            }
            PolicyError::ThresholdOutOfRange(v) => {
                write!(f, "threshold must be between 0 and 100, got {v}")
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for PolicyError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PolicyError::Repository(e) => Some(e),
            _ => None,
        }
    }
}
