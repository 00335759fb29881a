use std::io;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WindowError>;

/// Rejected construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("window cannot be zero")]
    ZeroWindow,
    #[error("granularity cannot be zero")]
    ZeroGranularity,
    #[error(
        "window must be a positive integer multiple of granularity, strictly greater than it \
         (window {window:?}, granularity {granularity:?})"
    )]
    NotMultiple {
        window: Duration,
        granularity: Duration,
    },
    #[error("granularity {granularity:?} is too large to schedule a rotation")]
    GranularityOutOfRange { granularity: Duration },
    #[error("window of {buckets} buckets cannot be allocated")]
    TooManyBuckets { buckets: u128 },
    #[error("cannot seed {samples} samples into a window of {buckets} buckets")]
    TooManySamples { samples: usize, buckets: usize },
}

/// Rejected query arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("cannot retrieve non-positive number of samples ({requested})")]
    NonPositive { requested: i64 },
    #[error("cannot retrieve more samples than the window holds ({requested} > {buckets})")]
    ExceedsWindow { requested: i64, buckets: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ArgumentError),
    #[error("cannot spawn rotation worker: {0}")]
    Spawn(io::ErrorKind),
}

impl From<io::Error> for WindowError {
    fn from(value: io::Error) -> Self {
        WindowError::Spawn(value.kind())
    }
}

impl WindowError {
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, WindowError::InvalidConfig(_))
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, WindowError::InvalidArgument(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err: WindowError = ConfigError::ZeroWindow.into();
        assert!(err.is_invalid_config());
        assert!(!err.is_invalid_argument());

        let err: WindowError = ArgumentError::NonPositive { requested: -1 }.into();
        assert!(err.is_invalid_argument());
        assert!(!err.is_invalid_config());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            WindowError::from(ConfigError::ZeroGranularity).to_string(),
            "invalid config: granularity cannot be zero"
        );
        assert_eq!(
            ArgumentError::ExceedsWindow {
                requested: 6,
                buckets: 5
            }
            .to_string(),
            "cannot retrieve more samples than the window holds (6 > 5)"
        );
    }
}
