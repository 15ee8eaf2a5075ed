//! Error taxonomy for the attendance core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Attendance was attempted for a user id that is not registered.
    #[error("unknown user id {0}")]
    UnknownUser(i64),

    /// A store operation (insert/delete/query) failed. The active
    /// transaction has already been rolled back when this surfaces.
    #[error("store operation failed: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// Malformed user id, confidence or timestamp at the boundary.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Filesystem failure while opening or creating the store.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
