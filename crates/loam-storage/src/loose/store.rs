//! Sharded on-disk object store.

use super::{LooseObject, ObjectIter, Location, RESERVED_DIRS};
use crate::{
    Object, ObjectId, ObjectReader, ObjectStorage, ObjectType, Result, StorageError, StoreConfig,
};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Content-addressed store for loose objects.
///
/// Objects live at `root/<first two hex chars>/<remaining 38 hex chars>`.
/// New objects are staged outside that namespace and renamed into place on
/// [`set`](ObjectStorage::set); the rename is the only point at which an
/// object becomes visible. The store holds no mutable state of its own, so
/// it can be cloned and shared freely.
#[derive(Debug, Clone)]
pub struct LooseObjectStore {
    config: Arc<StoreConfig>,
}

impl LooseObjectStore {
    /// Creates a store from a configuration.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Creates a store rooted at `root`, staging into the OS temp directory.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self::new(StoreConfig::new(root))
    }

    /// Creates the objects directory and the reserved `pack` and `info`
    /// directories. Safe to call on an existing store.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.root())?;
        for name in RESERVED_DIRS {
            fs::create_dir_all(self.root().join(name))?;
        }
        tracing::debug!(root = %self.root().display(), "initialized object store");
        Ok(())
    }

    /// Returns the objects directory.
    pub fn root(&self) -> &Path {
        self.config.root()
    }

    /// Returns the staging directory.
    pub fn temp_dir(&self) -> PathBuf {
        self.config.staging_dir()
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the shard directory for an id.
    pub fn shard_dir(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root().join(&hex[..2])
    }

    /// Returns the canonical path for an id.
    pub fn path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root().join(&hex[..2]).join(&hex[2..])
    }

    /// Creates a shard directory. Losing a creation race is not an error.
    fn mkdir(&self, path: &Path) -> Result<()> {
        match fs::create_dir(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl ObjectStorage for LooseObjectStore {
    type Object = LooseObject;
    type Iter = ObjectIter;

    fn new_object(&self) -> LooseObject {
        LooseObject::new(Arc::clone(&self.config))
    }

    /// Moves a staged object to its canonical path.
    ///
    /// Committing an object that already sits at its canonical path is a
    /// no-op. If the rename fails the staging file is left in place and the
    /// commit may be retried.
    fn set(&self, object: &mut LooseObject) -> Result<ObjectId> {
        if !object.object_type().is_valid() {
            tracing::warn!("rejected commit of object with invalid type");
            return Err(StorageError::InvalidType);
        }

        let id = object.id();
        if id.is_zero() {
            tracing::warn!("rejected commit of object without a digest");
            return Err(StorageError::ZeroHash);
        }

        let path = self.path(&id);
        let staged = match object.location() {
            Location::Staged(staged) => staged.clone(),
            Location::Persisted(current) if *current == path => {
                return Ok(id);
            }
            Location::Empty | Location::Persisted(_) => return Err(StorageError::NotReady),
        };

        if staged == path {
            object.mark_persisted(path);
            return Ok(id);
        }

        self.mkdir(&self.shard_dir(&id))?;
        fs::rename(&staged, &path)?;

        tracing::debug!(
            id = %id,
            object_type = %object.object_type(),
            size = object.size(),
            "object committed"
        );
        object.mark_persisted(path);
        Ok(id)
    }

    /// Opens the object at the canonical path for `id` and reads its header.
    fn get(&self, id: &ObjectId) -> Result<LooseObject> {
        if id.is_zero() {
            return Err(StorageError::ZeroHash);
        }

        let path = self.path(id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(*id));
            }
            Err(e) => return Err(e.into()),
        };

        let reader = ObjectReader::new(file)?;
        let (object_type, size) = (reader.object_type(), reader.size());
        drop(reader);

        tracing::debug!(id = %id, object_type = %object_type, size, "object found");
        Ok(LooseObject::persisted(
            Arc::clone(&self.config),
            *id,
            object_type,
            size,
            path,
        ))
    }

    /// Starts a fresh walk of the objects directory.
    ///
    /// With a type filter, each candidate's header is read during the walk;
    /// without one, no object files are opened.
    fn iter(&self, object_type: Option<ObjectType>) -> Result<ObjectIter> {
        fs::metadata(self.root())?;
        Ok(ObjectIter::new(self.root(), object_type))
    }
}
