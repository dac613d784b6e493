//! # Design
//!
//! - Engine-side error context without using `anyhow`.
//! - Keep error messages constant; store operational context in fields.
//! - Convert to `HandleError` at the proxy boundary, tagging the operation.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use anitorrent_core::HandleError;

/// Errors reported by a native engine for a single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// The address does not name a live native handle object.
    StaleAddress,
    /// The handle object exists but is not attached to a torrent.
    NotAttached,
    /// The torrent has no metadata yet.
    MissingMetadata,
    /// A numeric argument was outside the accepted range.
    OutOfRange {
        /// Argument name.
        field: &'static str,
        /// Supplied value.
        value: u64,
        /// Exclusive upper bound.
        limit: u64,
    },
    /// An argument was rejected.
    InvalidInput {
        /// Argument name.
        field: &'static str,
        /// Static reason describing the rejection.
        reason: &'static str,
    },
}

impl Display for NativeError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleAddress => formatter.write_str("stale native address"),
            Self::NotAttached => formatter.write_str("handle not attached to a torrent"),
            Self::MissingMetadata => formatter.write_str("torrent metadata unavailable"),
            Self::OutOfRange { .. } => formatter.write_str("argument out of range"),
            Self::InvalidInput { .. } => formatter.write_str("invalid argument"),
        }
    }
}

impl Error for NativeError {}

impl NativeError {
    /// Convert into the caller-facing error for `operation`.
    #[must_use]
    pub fn into_handle_error(self, operation: &'static str) -> HandleError {
        match self {
            Self::StaleAddress => HandleError::StaleAddress { operation },
            other => HandleError::NativeFailure {
                operation,
                source: Box::new(other),
            },
        }
    }
}

/// Result alias for native engine calls.
pub type NativeResult<T> = Result<T, NativeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_error_display_is_constant() {
        let cases = [
            (NativeError::StaleAddress, "stale native address"),
            (NativeError::NotAttached, "handle not attached to a torrent"),
            (NativeError::MissingMetadata, "torrent metadata unavailable"),
            (
                NativeError::OutOfRange {
                    field: "piece",
                    value: 9,
                    limit: 4,
                },
                "argument out of range",
            ),
            (
                NativeError::InvalidInput {
                    field: "url",
                    reason: "empty",
                },
                "invalid argument",
            ),
        ];

        for (err, message) in cases {
            assert_eq!(err.to_string(), message);
        }
    }

    #[test]
    fn stale_address_maps_to_dedicated_kind() {
        let err = NativeError::StaleAddress.into_handle_error("resume");
        assert!(matches!(
            err,
            HandleError::StaleAddress {
                operation: "resume"
            }
        ));
    }

    #[test]
    fn other_failures_keep_native_source() {
        let err = NativeError::MissingMetadata.into_handle_error("ignore_all_files");
        match err {
            HandleError::NativeFailure { operation, source } => {
                assert_eq!(operation, "ignore_all_files");
                assert_eq!(source.to_string(), "torrent metadata unavailable");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
