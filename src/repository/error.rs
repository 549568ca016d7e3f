//! Repository Errors
//!
//! Error types for account store operations.

use uuid::Uuid;

/// Errors that can occur while loading or committing accounts
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Optimistic concurrency conflict
    #[error("Concurrency conflict for account {account_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        account_id: Uuid,
        expected: i64,
        actual: i64,
    },

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    /// An account with this id is already stored
    #[error("Account already exists: {0}")]
    AccountExists(Uuid),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Seed or forecast file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data violates an account invariant
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

impl RepositoryError {
    /// Check if this error is a concurrency conflict
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, RepositoryError::ConcurrencyConflict { .. })
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RepositoryError::ConcurrencyConflict { .. } | RepositoryError::Database(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let conflict = RepositoryError::ConcurrencyConflict {
            account_id: Uuid::new_v4(),
            expected: 1,
            actual: 2,
        };
        assert!(conflict.is_concurrency_conflict());
        assert!(conflict.is_retryable());

        let missing = RepositoryError::AccountNotFound(Uuid::new_v4());
        assert!(!missing.is_retryable());
        assert!(!RepositoryError::InvalidData("bad".into()).is_retryable());
    }
}
