use common::model::association::{DownloadState, InvariantViolation};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be reached or the statement failed. Retryable
    /// when the failure is transient, see [`StoreError::is_retryable`].
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The write would have persisted an association that breaks an invariant.
    #[error("rejected write for pool {pool_id}, template {template_id}: {violation}")]
    InconsistentState {
        pool_id: i64,
        template_id: i64,
        violation: InvariantViolation,
    },
    #[error("{0} is not a valid initial state for an association")]
    InvalidInitialState(DownloadState),
}

impl StoreError {
    /// Whether the caller may retry the same operation unchanged: the database
    /// was busy, locked, or could not be opened or read for the moment.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Storage(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::CannotOpen
                    | ErrorCode::SystemIoFailure
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
