//! Unified error system for warden
//!
//! A single error type covers every operational failure in the system.
//! Policy outcomes are never errors: a denial is a successful evaluation
//! and is carried by the `Decision` type in `warden-decision`, not here.

use serde::{Deserialize, Serialize};

/// Unified error type for all warden operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    /// Malformed request: missing required identifiers, conflicting flags,
    /// empty resource names. Always a local input-validation failure and
    /// never retried.
    #[error("bad parameter: {message}")]
    BadParameter {
        /// What was malformed.
        message: String,
    },

    /// Referenced device or lock does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// What was not found.
        message: String,
    },

    /// Create collided with an existing record (same OS type and asset tag).
    #[error("already exists: {message}")]
    AlreadyExists {
        /// What already exists.
        message: String,
    },

    /// Enrollment proof rejected: token expired, consumed, mismatched, or
    /// the collected device data contradicts the stored record. The caller
    /// must request a fresh token; retrying the same call cannot succeed.
    #[error("invalid enrollment proof: {message}")]
    InvalidEnrollmentProof {
        /// Why the proof was rejected.
        message: String,
    },

    /// Conditional update lost a race: the record's revision moved between
    /// read and write. Safe to re-read and retry.
    #[error("compare failed: {message}")]
    CompareFailed {
        /// Which record conflicted.
        message: String,
    },

    /// Backing store or dependency unreachable. Safe to retry with backoff.
    #[error("unavailable: {message}")]
    Unavailable {
        /// What was unreachable.
        message: String,
    },

    /// Feature unavailable on this server edition, or the caller lacks the
    /// entitlement. Distinct from a policy denial.
    #[error("access denied: {message}")]
    AccessDenied {
        /// Why access was denied.
        message: String,
    },

    /// Internal invariant failure.
    #[error("internal error: {message}")]
    Internal {
        /// What broke.
        message: String,
    },
}

impl Error {
    /// Create a bad parameter error.
    pub fn bad_parameter(message: impl Into<String>) -> Self {
        Self::BadParameter {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an already exists error.
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    /// Create an invalid enrollment proof error.
    pub fn invalid_enrollment_proof(message: impl Into<String>) -> Self {
        Self::InvalidEnrollmentProof {
            message: message.into(),
        }
    }

    /// Create a compare failed (optimistic concurrency conflict) error.
    pub fn compare_failed(message: impl Into<String>) -> Self {
        Self::CompareFailed {
            message: message.into(),
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create an access denied error.
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the caller may safely retry the failed operation.
    ///
    /// `CompareFailed` asks for a re-read before the retry; `Unavailable`
    /// asks for backoff. Everything else is a terminal outcome for the
    /// request as issued.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CompareFailed { .. } | Self::Unavailable { .. })
    }
}

/// Standard Result type for warden operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn retryable_kinds() {
        assert!(Error::compare_failed("device x").is_retryable());
        assert!(Error::unavailable("store down").is_retryable());
        assert!(!Error::bad_parameter("oops").is_retryable());
        assert!(!Error::invalid_enrollment_proof("expired").is_retryable());
        assert!(!Error::access_denied("license").is_retryable());
    }

    #[test]
    fn constructors_match_variants() {
        assert_matches!(Error::not_found("d"), Error::NotFound { .. });
        assert_matches!(Error::already_exists("d"), Error::AlreadyExists { .. });
        assert_matches!(Error::internal("d"), Error::Internal { .. });
    }

    #[test]
    fn display_includes_message() {
        let err = Error::invalid_enrollment_proof("token expired");
        assert_eq!(err.to_string(), "invalid enrollment proof: token expired");
    }
}
