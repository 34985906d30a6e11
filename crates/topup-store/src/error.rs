//! Error types for the snapshot store.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the command.
    #[error("backend error: {0}")]
    Backend(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(feature = "redis-backend")]
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<StoreError> for topup_core::TopupError {
    fn from(err: StoreError) -> Self {
        Self::upstream("store", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_upstream() {
        let err: topup_core::TopupError = StoreError::Backend("connection refused".into()).into();
        assert!(matches!(
            err,
            topup_core::TopupError::Upstream { service: "store", .. }
        ));
    }
}
