//! Error types for the top-up service.

use crate::ids::IdError;

/// Result type for top-up operations.
pub type Result<T> = std::result::Result<T, TopupError>;

/// Errors that can occur while creating or settling charges.
///
/// The variants form the taxonomy that decides how a failure is surfaced:
/// user-correctable input, rejected credentials, optimistic-concurrency
/// conflicts, settlement anomalies and unreachable collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopupError {
    /// Malformed or out-of-range input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Signature or credential failure. Never retried.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// The charge is not in the state the caller expected.
    ///
    /// Callers may re-read, but must not blindly repeat the same write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Settlement data disagrees with what was attached at session creation.
    #[error("mismatch on {field}: attached={attached}, reported={reported}")]
    Mismatch {
        /// The field that disagrees.
        field: &'static str,
        /// Value recorded when the session was attached.
        attached: String,
        /// Value reported by the completion event.
        reported: String,
    },

    /// Entity not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A collaborator (ledger, provider, rate source) failed or is unreachable.
    #[error("upstream error: {service} - {message}")]
    Upstream {
        /// The collaborator that failed.
        service: &'static str,
        /// Error message.
        message: String,
    },
}

impl TopupError {
    /// Shorthand for an upstream failure.
    #[must_use]
    pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
        }
    }

    /// Whether the provider should redeliver an event that failed with this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Upstream { .. })
    }
}

impl From<IdError> for TopupError {
    fn from(err: IdError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(TopupError::Conflict("x".into()).is_retryable());
        assert!(TopupError::upstream("ledger", "down").is_retryable());
        assert!(!TopupError::Validation("x".into()).is_retryable());
        assert!(!TopupError::Authentication("x".into()).is_retryable());
    }

    #[test]
    fn mismatch_message() {
        let err = TopupError::Mismatch {
            field: "amount",
            attached: "500".into(),
            reported: "400".into(),
        };
        assert_eq!(
            err.to_string(),
            "mismatch on amount: attached=500, reported=400"
        );
    }
}
