//! Crate-wide error taxonomy.
//!
//! Callers can always tell apart caller mistakes (validation, not-found)
//! from storage trouble, and the store's retry loop keys off
//! [`MonitorError::is_transient`].

pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Malformed input rejected before any state mutation.
    #[error("validation error: {0}")]
    Validation(String),
    /// A referenced unit, range, alarm, or ticket does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A write conflict that may succeed on retry (SQLITE_BUSY and friends).
    #[error("transient storage error: {0}")]
    TransientStorage(String),
    /// Storage failure after the retry budget is spent, or one that retrying
    /// cannot fix.
    #[error("storage error: {0}")]
    FatalStorage(String),
    /// Stored state contradicts an invariant, e.g. an alarm already linked
    /// where the correlator expected it unlinked.
    #[error("consistency violation: {0}")]
    Consistency(String),
}

impl MonitorError {
    pub fn is_transient(&self) -> bool {
        matches!(self, MonitorError::TransientStorage(_))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        MonitorError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        MonitorError::NotFound(message.into())
    }
}

impl From<rusqlite::Error> for MonitorError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if matches!(
                    failure.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                MonitorError::TransientStorage(err.to_string())
            }
            _ => MonitorError::FatalStorage(err.to_string()),
        }
    }
}
