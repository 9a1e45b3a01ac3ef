use thiserror::Error;

use crate::store::StoreError;

/// Failures of a scoring action. None of them leave a partial effect behind.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    /// Idempotency violation: already sold, already claimed.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Insufficient points! Need {required}, you have {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => EngineError::Conflict(format!("Already recorded: {what}")),
            StoreError::UserNotFound(id) => EngineError::NotFound(format!("User {id} not found")),
            StoreError::InsufficientBalance {
                required,
                available,
            } => EngineError::InsufficientBalance {
                required,
                available,
            },
            StoreError::BalanceOverflow => {
                EngineError::Validation("Point balance is out of range".to_string())
            }
            other => EngineError::Store(other),
        }
    }
}
