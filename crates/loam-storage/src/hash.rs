//! Streaming object hashing.

use crate::{ObjectId, ObjectType};
use sha1::{Digest, Sha1};

/// Builds the `"<type> <size>\0"` header that prefixes every object.
pub(crate) fn object_header(object_type: ObjectType, size: u64) -> Vec<u8> {
    format!("{} {}\0", object_type.as_str(), size).into_bytes()
}

/// Incremental SHA-1 over an object's header and payload.
///
/// The digest covers the uncompressed representation, so two writers using
/// different compression levels agree on the id.
#[derive(Clone)]
pub struct ObjectHasher {
    inner: Sha1,
}

impl ObjectHasher {
    /// Starts a hash for an object of the given type and declared size.
    pub fn new(object_type: ObjectType, size: u64) -> Self {
        let mut inner = Sha1::new();
        inner.update(object_header(object_type, size));
        Self { inner }
    }

    /// Feeds payload bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finishes the hash.
    pub fn finalize(self) -> ObjectId {
        let mut bytes = [0u8; ObjectId::LEN];
        bytes.copy_from_slice(&self.inner.finalize());
        ObjectId::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_format() {
        assert_eq!(object_header(ObjectType::Blob, 11), b"blob 11\0");
        assert_eq!(object_header(ObjectType::Commit, 0), b"commit 0\0");
    }

    #[test]
    fn test_chunked_equals_whole() {
        let data = b"hello world";
        let mut hasher = ObjectHasher::new(ObjectType::Blob, data.len() as u64);
        for chunk in data.chunks(3) {
            hasher.update(chunk);
        }
        assert_eq!(
            hasher.finalize(),
            ObjectId::hash_object(ObjectType::Blob, data)
        );
    }

    #[test]
    fn test_type_changes_digest() {
        let blob = ObjectId::hash_object(ObjectType::Blob, b"x");
        let tree = ObjectId::hash_object(ObjectType::Tree, b"x");
        assert_ne!(blob, tree);
    }
}
