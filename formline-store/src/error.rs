//! Error types for the formline-store crate.

use thiserror::Error;

/// Top-level store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened.
    #[error("sqlite open failed at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The parent directory of the database could not be created.
    #[error("failed to create database parent {path}: {source}")]
    CreateParent {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A statement failed.
    #[error("sqlite statement failed: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A stored row could not be turned back into a configuration.
    #[error("corrupted row for form {form_id}: {reason}")]
    Corrupted { form_id: String, reason: String },

    /// Internal error (lock poisoning, blocking task failure, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("Blocking store task failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_error_conversion() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Sql(_)));
    }

    #[test]
    fn test_poison_error_conversion() {
        let lock = std::sync::Mutex::new(());
        let _ = std::panic::catch_unwind(|| {
            let _guard = lock.lock().unwrap();
            panic!("poison");
        });

        let err: StoreError = lock.lock().unwrap_err().into();
        assert!(err.to_string().starts_with("Internal error: Lock poisoned"));
    }
}
