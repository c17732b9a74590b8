//! Git transport pieces for Loam.
//!
//! Pkt-line framing, capability and reference advertisements, remote
//! endpoints, and a pack decoder that commits every entry into any
//! [`loam_storage::ObjectStorage`] backend.

mod capabilities;
mod endpoint;
mod error;
mod pack;
mod pktline;

pub use capabilities::{Capabilities, UploadPackInfo, HEAD, SYMREF};
pub use endpoint::{Endpoint, RECEIVE_PACK, UPLOAD_PACK};
pub use error::GitError;
pub use pack::{PackBuilder, PackParser};
pub use pktline::{PktLine, PktLineReader, PktLineWriter, MAX_PKT_LEN};

/// Result type for git protocol operations.
pub type Result<T> = std::result::Result<T, GitError>;
