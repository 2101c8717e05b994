//! Error types for the test fakes.
//!
//! Pipeline and request errors live in [`viewtest_core::ViewTestError`].

use thiserror::Error;

/// Errors from the storage fakes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No file is stored under the name.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The name is empty or otherwise unusable as a key.
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    /// No storage backend is installed on this thread.
    #[error("no default storage installed; call storage::install first")]
    NotInstalled,
}

/// Errors from the messages framework.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// The request carries no message store.
    #[error(
        "no message store on the request; add MessageMiddleware (after SessionMiddleware) \
         or call MessageStore::attach"
    )]
    NotInstalled,
}
