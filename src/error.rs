use thiserror::Error;

use crate::store::StoreError;

/// Failures of a single catalog interaction. Neither kind is fatal; the
/// caller reports it and the user may try again.
#[derive(Debug, Error)]
pub enum NoteError {
    /// A required field is missing or refers to nothing. Reported inline.
    #[error("{0}")]
    Validation(String),
    /// The backing store could not serve the read or write.
    #[error("Query failed: {0}")]
    Query(#[from] StoreError),
}

impl NoteError {
    pub fn validation(message: impl Into<String>) -> Self {
        NoteError::Validation(message.into())
    }
}
