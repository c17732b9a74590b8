//! Storage error types.

use crate::ObjectId;
use std::io;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An object was staged or committed with the invalid type marker.
    #[error("invalid object type")]
    InvalidType,

    /// The zero object id was used where a real digest is required.
    #[error("object hash is zero")]
    ZeroHash,

    /// A reader was requested for an object that has no file yet.
    #[error("object cannot be read from until it has been persisted")]
    NotYetPersisted,

    /// A writer was requested for an object that is already persisted.
    #[error("object cannot be written to after it has been persisted")]
    AlreadyPersisted,

    /// A commit was attempted before any content was staged.
    #[error("object not ready")]
    NotReady,

    /// No object exists for the given id.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// The bytes written did not match the declared size.
    #[error("size mismatch: declared {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Declared payload size.
        expected: u64,
        /// Bytes actually written (or attempted).
        actual: u64,
    },

    /// The object header could not be parsed.
    #[error("malformed object header: {0}")]
    MalformedHeader(String),

    /// A hex object id could not be parsed.
    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    /// The stream was read to the end but hashed to a different id.
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// The id the object was looked up by.
        expected: ObjectId,
        /// The id computed from the stored content.
        actual: ObjectId,
    },

    /// The writer has already been finished.
    #[error("object writer already closed")]
    Closed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl StorageError {
    /// Wraps this error so it can cross a `std::io::Read`/`Write` boundary.
    pub(crate) fn into_io(self) -> io::Error {
        match self {
            Self::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        // Errors raised inside our own Read/Write impls come back wrapped.
        if err
            .get_ref()
            .is_some_and(|inner| inner.is::<StorageError>())
        {
            if let Some(inner) = err.into_inner() {
                return match inner.downcast::<StorageError>() {
                    Ok(storage) => *storage,
                    Err(other) => Self::Io(io::Error::other(other)),
                };
            }
            return Self::Io(io::Error::other("empty wrapped storage error"));
        }
        Self::Io(err)
    }
}
