//! Git pack file format implementation.
//!
//! Pack files are the format used by git for efficient object transfer.
//! See: https://git-scm.com/docs/pack-format
//!
//! Only non-delta entries are supported. Each decoded entry is streamed
//! straight into an [`ObjectStorage`] backend.

use crate::{GitError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use loam_storage::{Object, ObjectId, ObjectStorage, ObjectType, StorageError};
use sha1::{Digest, Sha1};
use std::io::{Read, Write};

/// Magic bytes at the start of a pack file.
const PACK_SIGNATURE: &[u8; 4] = b"PACK";
/// Pack file version we support.
const PACK_VERSION: u32 = 2;
/// Header: signature, version, object count.
const HEADER_LEN: usize = 12;
/// Trailing SHA-1 over everything before it.
const CHECKSUM_LEN: usize = 20;

const OFS_DELTA: u8 = 6;
const REF_DELTA: u8 = 7;

/// Builds a pack file from a set of objects.
pub struct PackBuilder {
    objects: Vec<(ObjectType, Vec<u8>)>,
}

impl PackBuilder {
    /// Creates a new pack builder.
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    /// Adds an object to the pack.
    pub fn add(&mut self, object_type: ObjectType, data: impl Into<Vec<u8>>) {
        self.objects.push((object_type, data.into()));
    }

    /// Adds an object read from storage by ID.
    pub fn add_from_storage<S: ObjectStorage>(&mut self, storage: &S, id: &ObjectId) -> Result<()> {
        let (object_type, data) = storage.read_bytes(id)?;
        self.objects.push((object_type, data));
        Ok(())
    }

    /// Number of objects queued.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if no objects were added.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Builds the pack file.
    pub fn build(self) -> Result<Vec<u8>> {
        let count = u32::try_from(self.objects.len())
            .map_err(|_| GitError::InvalidPack("too many objects".to_string()))?;

        let mut pack = Vec::new();
        pack.extend_from_slice(PACK_SIGNATURE);
        pack.extend_from_slice(&PACK_VERSION.to_be_bytes());
        pack.extend_from_slice(&count.to_be_bytes());

        for (object_type, data) in &self.objects {
            Self::write_entry(&mut pack, *object_type, data)?;
        }

        let checksum = Sha1::digest(&pack);
        pack.extend_from_slice(&checksum);

        Ok(pack)
    }

    /// Writes a single object entry.
    fn write_entry(pack: &mut Vec<u8>, object_type: ObjectType, data: &[u8]) -> Result<()> {
        let type_code = object_type
            .pack_type()
            .ok_or_else(|| GitError::InvalidPack(format!("cannot pack {object_type} object")))?;

        // First byte: (MSB=more bytes) (3 bits type) (4 bits size)
        let size = data.len() as u64;
        let mut byte = (type_code << 4) | (size & 0x0F) as u8;
        let mut rest = size >> 4;
        while rest > 0 {
            pack.push(byte | 0x80);
            byte = (rest & 0x7F) as u8;
            rest >>= 7;
        }
        pack.push(byte);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        pack.extend_from_slice(&encoder.finish()?);

        Ok(())
    }
}

impl Default for PackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a pack file and stores its objects.
pub struct PackParser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PackParser<'a> {
    /// Creates a new pack parser.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Parses the pack and commits every entry to `storage`.
    ///
    /// The header and checksum are verified before anything is written.
    /// The first failing entry aborts the parse; entries committed before
    /// it stay in storage.
    pub fn parse<S: ObjectStorage>(&mut self, storage: &S) -> Result<Vec<ObjectId>> {
        if self.data.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(GitError::InvalidPack("pack too small".to_string()));
        }

        if &self.data[0..4] != PACK_SIGNATURE {
            return Err(GitError::InvalidPack("invalid signature".to_string()));
        }

        let version = u32::from_be_bytes([self.data[4], self.data[5], self.data[6], self.data[7]]);
        if version != PACK_VERSION {
            return Err(GitError::InvalidPack(format!(
                "unsupported version: {}",
                version
            )));
        }

        let object_count =
            u32::from_be_bytes([self.data[8], self.data[9], self.data[10], self.data[11]]) as usize;

        let checksum_start = self.data.len() - CHECKSUM_LEN;
        let computed = Sha1::digest(&self.data[..checksum_start]);
        if computed.as_slice() != &self.data[checksum_start..] {
            return Err(GitError::InvalidPack("checksum mismatch".to_string()));
        }

        let data = self.data;
        let body = &data[..checksum_start];
        self.pos = HEADER_LEN;

        // Every entry takes at least a couple of bytes, so the count is
        // bounded by the body length.
        let mut ids = Vec::with_capacity(object_count.min(body.len()));
        for index in 0..object_count {
            let id = self.parse_entry(body, storage)?;
            tracing::trace!(index, id = %id, "unpacked object");
            ids.push(id);
        }

        if self.pos != body.len() {
            return Err(GitError::InvalidPack(format!(
                "{} trailing bytes after last entry",
                body.len() - self.pos
            )));
        }

        tracing::debug!(objects = ids.len(), "unpacked pack");
        Ok(ids)
    }

    /// Parses a single entry and commits it.
    fn parse_entry<S: ObjectStorage>(&mut self, body: &[u8], storage: &S) -> Result<ObjectId> {
        let (type_code, size) = self.read_entry_header(body)?;

        let object_type = match ObjectType::from_pack_type(type_code) {
            ObjectType::Invalid if matches!(type_code, OFS_DELTA | REF_DELTA) => {
                return Err(GitError::InvalidPack(
                    "delta entries are not supported".to_string(),
                ))
            }
            ObjectType::Invalid => {
                return Err(GitError::InvalidPack(format!(
                    "unknown entry type: {}",
                    type_code
                )))
            }
            object_type => object_type,
        };

        let mut decoder = ZlibDecoder::new(&body[self.pos..]);
        let mut object = storage.new_object();
        object.set_type(object_type);
        object.set_size(size);

        let mut writer = object.writer()?;
        let mut remaining = size;
        let mut buf = [0u8; 8192];
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let n = decoder
                .read(&mut buf[..want])
                .map_err(|e| GitError::InvalidPack(format!("decompression failed: {}", e)))?;
            if n == 0 {
                return Err(GitError::InvalidPack(format!(
                    "entry ended {} bytes short",
                    remaining
                )));
            }
            writer.write_all(&buf[..n]).map_err(StorageError::from)?;
            remaining -= n as u64;
        }

        // Drain to the end of the zlib stream so the consumed length
        // includes its trailer.
        let extra = decoder
            .read(&mut buf[..1])
            .map_err(|e| GitError::InvalidPack(format!("decompression failed: {}", e)))?;
        if extra != 0 {
            return Err(GitError::InvalidPack(
                "entry longer than declared size".to_string(),
            ));
        }

        writer.close()?;
        self.pos += decoder.total_in() as usize;

        Ok(storage.set(&mut object)?)
    }

    /// Reads the variable-length type and size prefix of an entry.
    fn read_entry_header(&mut self, body: &[u8]) -> Result<(u8, u64)> {
        let mut next = || {
            let byte = body
                .get(self.pos)
                .copied()
                .ok_or_else(|| GitError::InvalidPack("unexpected end of pack".to_string()))?;
            self.pos += 1;
            Ok::<u8, GitError>(byte)
        };

        let first = next()?;
        let type_code = (first >> 4) & 0x07;
        let mut size = (first & 0x0F) as u64;
        let mut shift = 4u32;
        let mut byte = first;

        while byte & 0x80 != 0 {
            byte = next()?;
            if shift > 57 {
                return Err(GitError::InvalidPack("entry size overflows".to_string()));
            }
            size |= ((byte & 0x7F) as u64) << shift;
            shift += 7;
        }

        Ok((type_code, size))
    }
}
