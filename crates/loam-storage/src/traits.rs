//! Object and storage traits.
//!
//! Defines the interface that every storage backend implements, so callers
//! such as the pack decoder can stage and commit objects without knowing
//! where they end up.

use crate::close::check_close;
use crate::{ObjectId, ObjectType, Result, StorageError};
use std::io::{Read, Write};

/// A writable stream for one object's payload.
///
/// Closing consumes the handle, so it cannot be closed twice.
pub trait ObjectWrite: Write {
    /// Finishes the object and returns its digest.
    fn close(self: Box<Self>) -> Result<ObjectId>;
}

/// A readable stream over one object's payload.
pub trait ObjectRead: Read {
    /// The type parsed from the object header.
    fn object_type(&self) -> ObjectType;

    /// The payload size parsed from the object header.
    fn size(&self) -> u64;

    /// Releases the underlying source.
    fn close(self: Box<Self>) -> Result<()>;
}

/// A single object handle, either staged or persisted.
///
/// Readers and writers borrow the object mutably, so at most one of them is
/// open at a time.
pub trait Object {
    /// The object's digest, or [`ObjectId::ZERO`] until a writer has closed.
    fn id(&self) -> ObjectId;

    /// The declared type.
    fn object_type(&self) -> ObjectType;

    /// Sets the declared type before writing.
    ///
    /// Changing it on a staged, uncommitted object discards the staged
    /// digest, so the object must be written again before it can commit.
    fn set_type(&mut self, object_type: ObjectType);

    /// The declared payload size.
    fn size(&self) -> u64;

    /// Sets the declared payload size before writing. Changing it on a
    /// staged object discards the staged digest as with `set_type`.
    fn set_size(&mut self, size: u64);

    /// Opens a reader over the persisted payload.
    fn reader(&mut self) -> Result<Box<dyn ObjectRead + '_>>;

    /// Opens a writer that stages the payload.
    fn writer(&mut self) -> Result<Box<dyn ObjectWrite + '_>>;
}

/// A content-addressed object storage backend.
pub trait ObjectStorage: Send + Sync {
    /// The object handle type this backend hands out.
    type Object: Object;

    /// Iterator over stored object ids.
    type Iter: Iterator<Item = Result<ObjectId>>;

    /// Returns a new, empty object bound to this storage.
    fn new_object(&self) -> Self::Object;

    /// Commits a staged object and returns its id.
    fn set(&self, object: &mut Self::Object) -> Result<ObjectId>;

    /// Looks up a persisted object by id.
    fn get(&self, id: &ObjectId) -> Result<Self::Object>;

    /// Walks every stored object id, optionally restricted to one type.
    fn iter(&self, object_type: Option<ObjectType>) -> Result<Self::Iter>;

    /// Checks if an object exists.
    fn contains(&self, id: &ObjectId) -> Result<bool> {
        match self.get(id) {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Stages, writes and commits an in-memory payload.
    fn put_bytes(&self, object_type: ObjectType, data: &[u8]) -> Result<ObjectId> {
        let mut object = self.new_object();
        object.set_type(object_type);
        object.set_size(data.len() as u64);

        let mut writer = object.writer()?;
        writer.write_all(data)?;
        writer.close()?;

        self.set(&mut object)
    }

    /// Reads a whole object into memory.
    fn read_bytes(&self, id: &ObjectId) -> Result<(ObjectType, Vec<u8>)> {
        let mut object = self.get(id)?;
        let mut reader = object.reader()?;
        let object_type = reader.object_type();

        // Headers are untrusted, so the preallocation is capped.
        let mut data = Vec::with_capacity(usize::try_from(reader.size().min(1 << 20)).unwrap_or(0));
        let read = reader.read_to_end(&mut data).map_err(StorageError::from);
        check_close(read, || reader.close())?;

        Ok((object_type, data))
    }
}
