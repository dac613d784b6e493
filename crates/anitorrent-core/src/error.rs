//! Error types for handle proxy operations.

use std::error::Error;

use thiserror::Error;

/// Primary error type for operations issued through a handle proxy.
#[derive(Debug, Error)]
pub enum HandleError {
    /// File reload attempted against a handle that is not attached to a live torrent.
    #[error("reload attempted on invalid handle")]
    InvalidHandleOnReload,
    /// File reload attempted while the torrent has no metadata to read.
    #[error("reload attempted on invalid file")]
    InvalidFileOnReload,
    /// The proxy no longer carries a native address.
    #[error("handle used after release")]
    UseAfterRelease {
        /// Operation that was attempted.
        operation: &'static str,
    },
    /// The proxy does not own its native address and cannot release it.
    #[error("handle does not own its native address")]
    NotOwner {
        /// Operation that was attempted.
        operation: &'static str,
    },
    /// A wire value did not match any known enumeration member.
    #[error("unknown enumeration discriminant")]
    UnknownDiscriminant {
        /// Enumeration being decoded.
        kind: &'static str,
        /// Offending raw value.
        value: i32,
    },
    /// The native address no longer names a live native object.
    #[error("stale native address")]
    StaleAddress {
        /// Operation that was attempted.
        operation: &'static str,
    },
    /// The native engine rejected the call.
    #[error("native operation failed")]
    NativeFailure {
        /// Operation that was attempted.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl HandleError {
    /// Operation name recorded on the error, when one applies.
    #[must_use]
    pub const fn operation(&self) -> Option<&'static str> {
        match self {
            Self::UseAfterRelease { operation }
            | Self::NotOwner { operation }
            | Self::StaleAddress { operation }
            | Self::NativeFailure { operation, .. } => Some(*operation),
            Self::InvalidHandleOnReload
            | Self::InvalidFileOnReload
            | Self::UnknownDiscriminant { .. } => None,
        }
    }
}

/// Convenience alias for handle operation results.
pub type HandleResult<T> = Result<T, HandleError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn messages_are_constant_and_context_lives_in_fields() {
        let err = HandleError::UseAfterRelease {
            operation: "post_status_updates",
        };
        assert_eq!(err.to_string(), "handle used after release");
        assert_eq!(err.operation(), Some("post_status_updates"));

        let err = HandleError::UnknownDiscriminant {
            kind: "reload_file_result",
            value: 9,
        };
        assert_eq!(err.to_string(), "unknown enumeration discriminant");
        assert_eq!(err.operation(), None);
    }

    #[test]
    fn native_failure_exposes_source() {
        let err = HandleError::NativeFailure {
            operation: "set_file_priority",
            source: Box::new(io::Error::other("index out of range")),
        };
        let source = err.source().expect("source present");
        assert_eq!(source.to_string(), "index out of range");
    }
}
