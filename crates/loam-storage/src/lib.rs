//! Loose object storage for Loam.
//!
//! This crate provides content-addressed storage for git objects
//! (commits, trees, blobs, tags): a streaming codec for the loose object
//! format, a sharded filesystem store with atomic commits, and an in-memory
//! backend behind the same traits.

mod close;
mod compression;
mod config;
mod error;
mod hash;
mod loose;
mod memory;
mod object;
mod objfile;
mod traits;

pub use compression::CompressionLevel;
pub use config::{StoreConfig, DEFAULT_TEMP_PREFIX};
pub use error::StorageError;
pub use hash::ObjectHasher;
pub use loose::{
    LooseObject, LooseObjectStore, LooseReader, LooseWriter, ObjectIter, ObjectState,
    RESERVED_DIRS,
};
pub use memory::{MemoryObject, MemoryObjectStore};
pub use object::{ObjectId, ObjectType};
pub use objfile::{ObjectReader, ObjectWriter};
pub use traits::{Object, ObjectRead, ObjectStorage, ObjectWrite};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
