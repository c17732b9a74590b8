//! Filesystem storage for loose objects.
//!
//! Each object is one zlib file at `root/xx/yyyy…`, where `xx` is the first
//! byte of its id in hex. Objects are staged in a separate directory and
//! published by a single rename.

mod iter;
mod object;
mod store;

pub use iter::ObjectIter;
pub(crate) use object::Location;
pub use object::{LooseObject, LooseReader, LooseWriter, ObjectState};
pub use store::LooseObjectStore;

/// Top-level directories reserved for pack files and metadata.
pub const RESERVED_DIRS: [&str; 2] = ["pack", "info"];
