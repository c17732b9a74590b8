//! Git protocol error types.

use thiserror::Error;

/// Errors that can occur while decoding protocol data or packs.
#[derive(Debug, Error)]
pub enum GitError {
    /// Invalid pack file format.
    #[error("invalid pack file: {0}")]
    InvalidPack(String),

    /// Invalid pkt-line format.
    #[error("invalid pkt-line: {0}")]
    InvalidPktLine(String),

    /// Invalid remote endpoint.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] loam_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
