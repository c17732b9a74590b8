//! Filesystem-backed object handles.

use crate::close::check_close;
use crate::{
    Object, ObjectId, ObjectRead, ObjectReader, ObjectType, ObjectWrite, ObjectWriter, Result,
    StorageError, StoreConfig,
};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where an object's bytes currently live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Location {
    /// Brand new, no backing file.
    Empty,
    /// Written to a staging file outside the object namespace.
    Staged(PathBuf),
    /// At its canonical, digest-derived path.
    Persisted(PathBuf),
}

/// Lifecycle phase of a [`LooseObject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// No content has been staged.
    Empty,
    /// Content staged; the id is known once the writer has closed.
    Staged,
    /// Committed to its canonical path. Terminal.
    Persisted,
}

/// A loose object record.
///
/// Created empty by [`LooseObjectStore::new_object`](crate::LooseObjectStore)
/// or in the persisted phase by a lookup. A staged file whose object is never
/// committed stays where it is; nothing cleans it up.
#[derive(Debug)]
pub struct LooseObject {
    object_type: ObjectType,
    id: ObjectId,
    size: u64,
    location: Location,
    config: Arc<StoreConfig>,
}

impl LooseObject {
    pub(crate) fn new(config: Arc<StoreConfig>) -> Self {
        Self {
            object_type: ObjectType::Invalid,
            id: ObjectId::ZERO,
            size: 0,
            location: Location::Empty,
            config,
        }
    }

    pub(crate) fn persisted(
        config: Arc<StoreConfig>,
        id: ObjectId,
        object_type: ObjectType,
        size: u64,
        path: PathBuf,
    ) -> Self {
        Self {
            object_type,
            id,
            size,
            location: Location::Persisted(path),
            config,
        }
    }

    /// Returns the current lifecycle phase.
    pub fn state(&self) -> ObjectState {
        match self.location {
            Location::Empty => ObjectState::Empty,
            Location::Staged(_) => ObjectState::Staged,
            Location::Persisted(_) => ObjectState::Persisted,
        }
    }

    /// Returns the path of the file holding the object's data.
    ///
    /// Before the object is committed this is the staging file.
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::Empty => None,
            Location::Staged(path) | Location::Persisted(path) => Some(path),
        }
    }

    pub(crate) fn location(&self) -> &Location {
        &self.location
    }

    pub(crate) fn mark_persisted(&mut self, path: PathBuf) {
        self.location = Location::Persisted(path);
    }

    /// Staged content no longer matches a changed declaration, so its
    /// digest cannot be committed. Persisted records keep theirs.
    fn invalidate_digest(&mut self) {
        if !matches!(self.location, Location::Persisted(_)) {
            self.id = ObjectId::ZERO;
        }
    }

    #[cfg(test)]
    pub(crate) fn staged_at(
        config: Arc<StoreConfig>,
        id: ObjectId,
        object_type: ObjectType,
        size: u64,
        path: PathBuf,
    ) -> Self {
        Self {
            object_type,
            id,
            size,
            location: Location::Staged(path),
            config,
        }
    }

    /// Opens the staging file, creating it on first use.
    ///
    /// Staged files are kept when their handle drops so they can be renamed
    /// into place later.
    fn create_file(&mut self) -> Result<File> {
        match &self.location {
            Location::Persisted(_) => return Err(StorageError::AlreadyPersisted),
            Location::Staged(path) => return Ok(File::create(path)?),
            Location::Empty => {}
        }

        let (file, path) = tempfile::Builder::new()
            .prefix(&self.config.temp_prefix)
            .tempfile_in(self.config.staging_dir())?
            .keep()
            .map_err(|e| e.error)?;
        tracing::debug!(path = %path.display(), "created staging file");
        self.location = Location::Staged(path);
        Ok(file)
    }
}

impl Object for LooseObject {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn object_type(&self) -> ObjectType {
        self.object_type
    }

    fn set_type(&mut self, object_type: ObjectType) {
        if object_type != self.object_type {
            self.invalidate_digest();
        }
        self.object_type = object_type;
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn set_size(&mut self, size: u64) {
        if size != self.size {
            self.invalidate_digest();
        }
        self.size = size;
    }

    fn reader(&mut self) -> Result<Box<dyn ObjectRead + '_>> {
        let path = match &self.location {
            Location::Persisted(path) => path,
            Location::Empty | Location::Staged(_) => return Err(StorageError::NotYetPersisted),
        };

        let file = File::open(path)?;
        let inner = ObjectReader::new(file)?;
        Ok(Box::new(LooseReader {
            inner,
            expected: self.id,
        }))
    }

    fn writer(&mut self) -> Result<Box<dyn ObjectWrite + '_>> {
        if matches!(self.location, Location::Persisted(_)) {
            return Err(StorageError::AlreadyPersisted);
        }
        // Checked before touching the filesystem so no staging file is left behind.
        if !self.object_type.is_valid() {
            return Err(StorageError::InvalidType);
        }

        let file = self.create_file()?;
        let inner = ObjectWriter::with_compression(
            file,
            self.object_type,
            self.size,
            self.config.compression,
        )?;

        // A rewrite invalidates any digest from an earlier attempt.
        self.id = ObjectId::ZERO;
        Ok(Box::new(LooseWriter {
            inner,
            id: &mut self.id,
        }))
    }
}

/// Writes a loose object into its staging file.
///
/// The record only learns the digest when [`close`](ObjectWrite::close)
/// succeeds, so a failed or abandoned write leaves it uncommittable.
pub struct LooseWriter<'a> {
    inner: ObjectWriter<File>,
    id: &'a mut ObjectId,
}

impl Write for LooseWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl ObjectWrite for LooseWriter<'_> {
    fn close(self: Box<Self>) -> Result<ObjectId> {
        let LooseWriter { mut inner, id } = *self;

        let file = inner.finish_stream()?;
        let complete = inner.ensure_complete();
        let digest = check_close(complete, || file.sync_all().map_err(StorageError::from))?;

        *id = digest;
        tracing::debug!(id = %digest, size = inner.size(), "object staged");
        Ok(digest)
    }
}

/// Reads a persisted loose object.
pub struct LooseReader {
    inner: ObjectReader<File>,
    expected: ObjectId,
}

impl Read for LooseReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl ObjectRead for LooseReader {
    fn object_type(&self) -> ObjectType {
        self.inner.object_type()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    /// Releases the file. If the payload was read to the end, also checks
    /// that it hashes to the id it was looked up by.
    fn close(self: Box<Self>) -> Result<()> {
        let LooseReader { inner, expected } = *self;
        let actual = inner.hash();
        drop(inner.into_inner());

        match actual {
            Some(actual) if actual != expected => {
                Err(StorageError::HashMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<StoreConfig>) {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path().join("objects")).with_temp_dir(dir.path());
        (dir, Arc::new(config))
    }

    #[test]
    fn test_new_object_is_empty() {
        let (_dir, config) = setup();
        let object = LooseObject::new(config);
        assert_eq!(object.state(), ObjectState::Empty);
        assert!(object.id().is_zero());
        assert!(object.path().is_none());
        assert_eq!(object.object_type(), ObjectType::Invalid);
    }

    #[test]
    fn test_writer_stages_into_temp_dir() {
        let (dir, config) = setup();
        let mut object = LooseObject::new(config);
        object.set_type(ObjectType::Blob);
        object.set_size(5);

        let mut writer = object.writer().unwrap();
        writer.write_all(b"hello").unwrap();
        let id = writer.close().unwrap();

        assert_eq!(id, ObjectId::hash_object(ObjectType::Blob, b"hello"));
        assert_eq!(object.id(), id);
        assert_eq!(object.state(), ObjectState::Staged);

        let path = object.path().unwrap();
        assert_eq!(path.parent().unwrap(), dir.path());
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("git-object-"));
        assert!(path.exists());
    }

    #[test]
    fn test_abandoned_writer_leaves_zero_id() {
        let (_dir, config) = setup();
        let mut object = LooseObject::new(config);
        object.set_type(ObjectType::Blob);
        object.set_size(5);

        {
            let mut writer = object.writer().unwrap();
            writer.write_all(b"hel").unwrap();
        }
        assert!(object.id().is_zero());
        assert_eq!(object.state(), ObjectState::Staged);
        // the staging file is an orphan, not removed
        assert!(object.path().unwrap().exists());
    }

    #[test]
    fn test_size_mismatch_keeps_id_zero() {
        let (_dir, config) = setup();
        let mut object = LooseObject::new(config);
        object.set_type(ObjectType::Blob);
        object.set_size(5);

        let mut writer = object.writer().unwrap();
        writer.write_all(b"abc").unwrap();
        let result = writer.close();
        assert!(matches!(
            result,
            Err(StorageError::SizeMismatch {
                expected: 5,
                actual: 3
            })
        ));
        assert!(object.id().is_zero());
    }

    #[test]
    fn test_rewrite_reuses_staging_file() {
        let (_dir, config) = setup();
        let mut object = LooseObject::new(config);
        object.set_type(ObjectType::Blob);
        object.set_size(3);

        let mut writer = object.writer().unwrap();
        writer.write_all(b"abc").unwrap();
        writer.close().unwrap();
        let first_path = object.path().unwrap().to_path_buf();

        let mut writer = object.writer().unwrap();
        writer.write_all(b"xyz").unwrap();
        let id = writer.close().unwrap();

        assert_eq!(object.path().unwrap(), first_path);
        assert_eq!(id, ObjectId::hash_object(ObjectType::Blob, b"xyz"));
    }

    #[test]
    fn test_redeclaring_staged_object_clears_id() {
        let (_dir, config) = setup();
        let mut object = LooseObject::new(config);
        object.set_type(ObjectType::Blob);
        object.set_size(3);
        let mut writer = object.writer().unwrap();
        writer.write_all(b"abc").unwrap();
        writer.close().unwrap();

        // Same values keep the digest.
        object.set_type(ObjectType::Blob);
        object.set_size(3);
        assert_eq!(object.id(), ObjectId::hash_object(ObjectType::Blob, b"abc"));

        object.set_type(ObjectType::Tree);
        assert!(object.id().is_zero());
    }

    #[test]
    fn test_invalid_type_creates_no_file() {
        let (dir, config) = setup();
        let mut object = LooseObject::new(config);
        object.set_size(1);

        assert!(matches!(object.writer(), Err(StorageError::InvalidType)));
        assert_eq!(object.state(), ObjectState::Empty);
        let staged = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(staged, 0);
    }

    #[test]
    fn test_reader_before_persist() {
        let (_dir, config) = setup();
        let mut object = LooseObject::new(config);
        assert!(matches!(object.reader(), Err(StorageError::NotYetPersisted)));

        object.set_type(ObjectType::Tree);
        object.set_size(0);
        object.writer().unwrap().close().unwrap();
        assert!(matches!(object.reader(), Err(StorageError::NotYetPersisted)));
    }

    #[test]
    fn test_persisted_rejects_writer() {
        let (dir, config) = setup();
        let mut object = LooseObject::persisted(
            config,
            ObjectId::from_bytes([1u8; 20]),
            ObjectType::Blob,
            0,
            dir.path().join("nowhere"),
        );
        assert_eq!(object.state(), ObjectState::Persisted);
        assert!(matches!(object.writer(), Err(StorageError::AlreadyPersisted)));
    }

    #[test]
    fn test_reader_detects_hash_mismatch() {
        let (dir, config) = setup();
        let path = dir.path().join("blob");
        let mut writer =
            ObjectWriter::new(File::create(&path).unwrap(), ObjectType::Blob, 3).unwrap();
        writer.write_all(b"abc").unwrap();
        writer.finish().unwrap();

        let wrong = ObjectId::from_bytes([9u8; 20]);
        let mut object = LooseObject::persisted(config, wrong, ObjectType::Blob, 3, path);
        let mut reader = object.reader().unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
        assert!(matches!(
            reader.close(),
            Err(StorageError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_partial_read_skips_verification() {
        let (dir, config) = setup();
        let path = dir.path().join("blob");
        let mut writer =
            ObjectWriter::new(File::create(&path).unwrap(), ObjectType::Blob, 3).unwrap();
        writer.write_all(b"abc").unwrap();
        writer.finish().unwrap();

        let wrong = ObjectId::from_bytes([9u8; 20]);
        let mut object = LooseObject::persisted(config, wrong, ObjectType::Blob, 3, path);
        let mut reader = object.reader().unwrap();
        let mut one = [0u8; 1];
        reader.read_exact(&mut one).unwrap();
        reader.close().unwrap();
    }
}
