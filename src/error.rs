// ⚠️ Error Types - Persona Signal Engine
//
// The classification pipeline itself is total: analyzers and rules return
// values, never errors. Only two things can go wrong around it:
//   1. The store behind accounts / history is unavailable
//   2. A record handed to us cannot be interpreted (bad date, empty id, ...)

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Reading from or writing to the backing store failed
    #[error("persistence unavailable during {operation}: {message}")]
    PersistenceUnavailable { operation: String, message: String },

    /// Input record could not be interpreted; never skipped silently
    #[error("malformed record {record}: {reason}")]
    MalformedRecord { record: String, reason: String },
}

impl CoreError {
    pub fn persistence(operation: &str, message: impl ToString) -> Self {
        CoreError::PersistenceUnavailable {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    pub fn malformed(record: impl ToString, reason: impl ToString) -> Self {
        CoreError::MalformedRecord {
            record: record.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, CoreError::PersistenceUnavailable { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, CoreError::MalformedRecord { .. })
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::persistence("sqlite", err)
    }
}

impl<T> From<std::sync::PoisonError<T>> for CoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        CoreError::persistence("lock", err)
    }
}
