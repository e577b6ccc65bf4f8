//! Error types for logsieve
//!
//! Every failure is returned to the immediate caller; nothing in the crate panics or
//! aborts on these conditions.

use std::time::Duration;

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// No pooled buffer logger became available before the deadline
    #[error("Timed out after {timeout:?} waiting for buffer logger")]
    AllocationTimeout { timeout: Duration },

    /// The sink behind a redactor accepted fewer bytes than it was handed
    #[error("Short write: sink accepted {written} of {expected} bytes")]
    ShortWrite { expected: usize, written: usize },

    /// Retrieval was requested on an instance whose encoding is not JSON
    #[error("Can only return JSON when encoding is json, not {encoding}")]
    UnsupportedEncoding { encoding: String },

    /// Invalid logger, encoder or pool settings
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// One pooled instance failed to build, so the pool was not created
    #[error("Failed to create buffer logger #{index}: {source}")]
    PoolConstruction {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// A value-redaction key that does not form a valid pattern
    #[error("Invalid redaction pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a configuration error from any message
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Whether this is a pool allocation timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::AllocationTimeout { .. })
    }

    /// Extract a short-write error wrapped inside an `io::Error`, if any
    pub fn short_write(err: &std::io::Error) -> Option<(usize, usize)> {
        match err.get_ref()?.downcast_ref::<Error>()? {
            Error::ShortWrite { expected, written } => Some((*expected, *written)),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_timeout() {
        let err = Error::AllocationTimeout {
            timeout: Duration::from_millis(5),
        };
        assert!(err.is_timeout());
        assert!(!Error::config("bad").is_timeout());
    }

    #[test]
    fn test_short_write_roundtrip_through_io_error() {
        let io_err = std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            Error::ShortWrite {
                expected: 10,
                written: 4,
            },
        );
        assert_eq!(Error::short_write(&io_err), Some((10, 4)));

        let other = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(Error::short_write(&other), None);
    }

    #[test]
    fn test_pool_construction_message() {
        let err = Error::PoolConstruction {
            index: 2,
            source: Box::new(Error::config("line ending must not be empty")),
        };
        assert!(err.to_string().contains("#2"));
        assert!(err.to_string().contains("line ending"));
    }
}
