use thiserror::Error;

use crate::coord::CellPosition;

/// Failure of a call to the remote grid store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("request was cancelled")]
    Cancelled,
}

/// Errors surfaced by the cell editor. None of them are fatal: the session
/// stays usable after any of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("{0}")]
    Validation(String),

    #[error("sync of {position} failed: {source}")]
    Network {
        position: CellPosition,
        #[source]
        source: StoreError,
    },

    #[error("remote store error: {0}")]
    Store(#[from] StoreError),

    #[error("{pending} cell edit(s) still syncing; retry once they settle")]
    Conflict { pending: usize },

    #[error("deleted {removed:?} but stopped at column {failed}: {source}")]
    PartialDelete {
        removed: Vec<usize>,
        failed: usize,
        #[source]
        source: StoreError,
    },
}
