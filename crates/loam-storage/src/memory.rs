//! In-memory object storage.

use crate::{
    CompressionLevel, Object, ObjectId, ObjectRead, ObjectReader, ObjectStorage, ObjectType,
    ObjectWrite, ObjectWriter, Result, StorageError,
};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};

/// A stored entry: header fields plus the compressed object stream.
#[derive(Debug, Clone)]
struct Entry {
    object_type: ObjectType,
    size: u64,
    data: Bytes,
}

/// Content-addressed object store held in memory.
///
/// Objects are kept in the same compressed framing as loose files, so both
/// backends share one codec and agree on every id.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    /// Objects indexed by their SHA-1 hash.
    objects: RwLock<HashMap<ObjectId, Entry>>,
    compression: CompressionLevel,
}

impl MemoryObjectStore {
    /// Creates a new empty object store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that compresses at the given level.
    pub fn with_compression(compression: CompressionLevel) -> Self {
        Self {
            objects: RwLock::default(),
            compression,
        }
    }

    /// Returns the number of objects in the store.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStorage for MemoryObjectStore {
    type Object = MemoryObject;
    type Iter = std::vec::IntoIter<Result<ObjectId>>;

    fn new_object(&self) -> MemoryObject {
        MemoryObject {
            object_type: ObjectType::Invalid,
            size: 0,
            staged: Staged::default(),
            persisted: false,
            compression: self.compression,
        }
    }

    fn set(&self, object: &mut MemoryObject) -> Result<ObjectId> {
        if !object.object_type.is_valid() {
            return Err(StorageError::InvalidType);
        }
        let id = object.staged.id;
        if id.is_zero() {
            return Err(StorageError::ZeroHash);
        }
        if object.persisted {
            return Ok(id);
        }
        let data = object.staged.data.clone().ok_or(StorageError::NotReady)?;

        self.objects.write().insert(
            id,
            Entry {
                object_type: object.object_type,
                size: object.size,
                data,
            },
        );
        object.persisted = true;
        tracing::debug!(id = %id, "object committed to memory");
        Ok(id)
    }

    fn get(&self, id: &ObjectId) -> Result<MemoryObject> {
        if id.is_zero() {
            return Err(StorageError::ZeroHash);
        }
        let entry = self
            .objects
            .read()
            .get(id)
            .cloned()
            .ok_or(StorageError::NotFound(*id))?;

        Ok(MemoryObject {
            object_type: entry.object_type,
            size: entry.size,
            staged: Staged {
                id: *id,
                data: Some(entry.data),
            },
            persisted: true,
            compression: self.compression,
        })
    }

    fn iter(&self, object_type: Option<ObjectType>) -> Result<Self::Iter> {
        let mut ids: Vec<ObjectId> = self
            .objects
            .read()
            .iter()
            .filter(|(_, entry)| object_type.map_or(true, |t| entry.object_type == t))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
        Ok(ids.into_iter().map(Ok).collect::<Vec<_>>().into_iter())
    }

    fn contains(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.objects.read().contains_key(id))
    }
}

/// Digest and compressed bytes produced by the last successful write.
#[derive(Debug, Default)]
struct Staged {
    id: ObjectId,
    data: Option<Bytes>,
}

/// An object handle for [`MemoryObjectStore`].
#[derive(Debug)]
pub struct MemoryObject {
    object_type: ObjectType,
    size: u64,
    staged: Staged,
    persisted: bool,
    compression: CompressionLevel,
}

impl MemoryObject {
    /// Drops staged content framed under a different declaration.
    fn invalidate_staged(&mut self) {
        if !self.persisted {
            self.staged = Staged::default();
        }
    }
}

impl Object for MemoryObject {
    fn id(&self) -> ObjectId {
        self.staged.id
    }

    fn object_type(&self) -> ObjectType {
        self.object_type
    }

    fn set_type(&mut self, object_type: ObjectType) {
        if object_type != self.object_type {
            self.invalidate_staged();
        }
        self.object_type = object_type;
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn set_size(&mut self, size: u64) {
        if size != self.size {
            self.invalidate_staged();
        }
        self.size = size;
    }

    fn reader(&mut self) -> Result<Box<dyn ObjectRead + '_>> {
        if !self.persisted {
            return Err(StorageError::NotYetPersisted);
        }
        let data = self.staged.data.clone().ok_or(StorageError::NotYetPersisted)?;
        Ok(Box::new(MemoryReader {
            inner: ObjectReader::new(Cursor::new(data))?,
        }))
    }

    fn writer(&mut self) -> Result<Box<dyn ObjectWrite + '_>> {
        if self.persisted {
            return Err(StorageError::AlreadyPersisted);
        }
        let inner =
            ObjectWriter::with_compression(Vec::new(), self.object_type, self.size, self.compression)?;
        self.staged = Staged::default();
        Ok(Box::new(MemoryWriter {
            inner,
            staged: &mut self.staged,
        }))
    }
}

struct MemoryWriter<'a> {
    inner: ObjectWriter<Vec<u8>>,
    staged: &'a mut Staged,
}

impl Write for MemoryWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl ObjectWrite for MemoryWriter<'_> {
    fn close(self: Box<Self>) -> Result<ObjectId> {
        let MemoryWriter { mut inner, staged } = *self;
        let data = inner.finish()?;
        staged.id = inner.hash();
        staged.data = Some(Bytes::from(data));
        Ok(staged.id)
    }
}

struct MemoryReader {
    inner: ObjectReader<Cursor<Bytes>>,
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl ObjectRead for MemoryReader {
    fn object_type(&self) -> ObjectType {
        self.inner.object_type()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
