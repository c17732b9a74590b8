//! Single-object codec for the loose object format.
//!
//! A loose object is one zlib stream holding `"<type> <size>\0"` followed by
//! the payload. The object id is the SHA-1 of those same uncompressed bytes,
//! so ids do not depend on the compression level.

use crate::hash::object_header;
use crate::{CompressionLevel, ObjectHasher, ObjectId, ObjectType, Result, StorageError};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{self, Read, Write};

/// Longest header accepted before the terminating NUL.
const MAX_HEADER_LEN: usize = 32;

/// Streams one object into a sink, compressing and hashing as it goes.
///
/// The header is written on construction. Exactly `size` payload bytes must
/// follow; writing past the declared size fails without forwarding the
/// offending bytes, and [`finish`](Self::finish) reports a short payload.
pub struct ObjectWriter<W: Write> {
    encoder: Option<ZlibEncoder<W>>,
    hasher: Option<ObjectHasher>,
    object_type: ObjectType,
    size: u64,
    written: u64,
    id: ObjectId,
}

impl<W: Write> ObjectWriter<W> {
    /// Starts an object with the default compression level.
    pub fn new(sink: W, object_type: ObjectType, size: u64) -> Result<Self> {
        Self::with_compression(sink, object_type, size, CompressionLevel::default())
    }

    /// Starts an object with an explicit compression level.
    ///
    /// The sink is dropped if the type is invalid or the header cannot be
    /// written.
    pub fn with_compression(
        sink: W,
        object_type: ObjectType,
        size: u64,
        level: CompressionLevel,
    ) -> Result<Self> {
        if !object_type.is_valid() {
            return Err(StorageError::InvalidType);
        }

        let mut encoder = ZlibEncoder::new(sink, level.to_flate2());
        encoder.write_all(&object_header(object_type, size))?;

        Ok(Self {
            encoder: Some(encoder),
            hasher: Some(ObjectHasher::new(object_type, size)),
            object_type,
            size,
            written: 0,
            id: ObjectId::ZERO,
        })
    }

    /// Returns the declared type.
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Returns the declared payload size.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the number of payload bytes accepted so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Returns the digest, or [`ObjectId::ZERO`] before the stream is finished.
    ///
    /// A short payload still gets a digest once finished; it is the hash of
    /// the bytes actually written under the declared header.
    pub fn hash(&self) -> ObjectId {
        self.id
    }

    /// Flushes the compressor, finalizes the digest, and returns the sink.
    ///
    /// Fails with [`StorageError::SizeMismatch`] (after finalizing the digest)
    /// when fewer than `size` bytes were written, and with
    /// [`StorageError::Closed`] when called a second time.
    pub fn finish(&mut self) -> Result<W> {
        let sink = self.finish_stream()?;
        self.ensure_complete()?;
        Ok(sink)
    }

    /// Completes the compressed stream without checking the byte count.
    pub(crate) fn finish_stream(&mut self) -> Result<W> {
        let encoder = self.encoder.take().ok_or(StorageError::Closed)?;
        let hasher = self.hasher.take().ok_or(StorageError::Closed)?;
        let id = hasher.finalize();
        let sink = encoder.finish()?;
        self.id = id;
        Ok(sink)
    }

    /// Checks that the declared size was written in full.
    pub(crate) fn ensure_complete(&self) -> Result<ObjectId> {
        if self.written != self.size {
            return Err(StorageError::SizeMismatch {
                expected: self.size,
                actual: self.written,
            });
        }
        Ok(self.id)
    }
}

impl<W: Write> Write for ObjectWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| StorageError::Closed.into_io())?;

        let attempted = self.written + buf.len() as u64;
        if attempted > self.size {
            return Err(StorageError::SizeMismatch {
                expected: self.size,
                actual: attempted,
            }
            .into_io());
        }

        let n = encoder.write(buf)?;
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(&buf[..n]);
        }
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.encoder.as_mut() {
            Some(encoder) => encoder.flush(),
            None => Ok(()),
        }
    }
}

/// Decodes one object from a source.
///
/// The header is parsed on construction, so type and size are known before
/// any payload byte is consumed. Reading yields exactly `size` bytes.
pub struct ObjectReader<R: Read> {
    decoder: ZlibDecoder<R>,
    object_type: ObjectType,
    size: u64,
    remaining: u64,
    hasher: Option<ObjectHasher>,
    id: Option<ObjectId>,
}

impl<R: Read> ObjectReader<R> {
    /// Parses the header from `source`.
    ///
    /// The source is dropped if the header is malformed.
    pub fn new(source: R) -> Result<Self> {
        let mut decoder = ZlibDecoder::new(source);
        let (object_type, size) = read_header(&mut decoder)?;

        let mut reader = Self {
            decoder,
            object_type,
            size,
            remaining: size,
            hasher: Some(ObjectHasher::new(object_type, size)),
            id: None,
        };
        if size == 0 {
            reader.finalize_hash();
        }
        Ok(reader)
    }

    /// Returns the object type from the header.
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Returns the payload size from the header.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the digest of the stream once the payload has been fully read.
    pub fn hash(&self) -> Option<ObjectId> {
        self.id
    }

    /// Releases the decompressor and returns the source.
    pub fn into_inner(self) -> R {
        self.decoder.into_inner()
    }

    fn finalize_hash(&mut self) {
        if let Some(hasher) = self.hasher.take() {
            self.id = Some(hasher.finalize());
        }
    }
}

impl<R: Read> Read for ObjectReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.remaining == 0 {
            return Ok(0);
        }

        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.decoder.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "object payload ended {} bytes before declared size {}",
                    self.remaining, self.size
                ),
            ));
        }

        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(&buf[..n]);
        }
        self.remaining -= n as u64;
        if self.remaining == 0 {
            self.finalize_hash();
        }
        Ok(n)
    }
}

/// Reads and parses `"<type> <size>\0"` from the decompressed stream.
fn read_header<R: Read>(decoder: &mut R) -> Result<(ObjectType, u64)> {
    let mut header = Vec::with_capacity(MAX_HEADER_LEN);
    let mut byte = [0u8; 1];

    loop {
        let n = match decoder.read(&mut byte) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData
                ) =>
            {
                return Err(StorageError::MalformedHeader(e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            return Err(StorageError::MalformedHeader(
                "unexpected end of header".to_string(),
            ));
        }
        if byte[0] == 0 {
            break;
        }
        if header.len() == MAX_HEADER_LEN {
            return Err(StorageError::MalformedHeader("header too long".to_string()));
        }
        header.push(byte[0]);
    }

    let header = std::str::from_utf8(&header)
        .map_err(|_| StorageError::MalformedHeader("header is not utf-8".to_string()))?;
    let (type_name, size) = header
        .split_once(' ')
        .ok_or_else(|| StorageError::MalformedHeader(format!("invalid header: {}", header)))?;

    let object_type = ObjectType::parse(type_name)?;
    if size.is_empty() || !size.bytes().all(|b| b.is_ascii_digit()) {
        return Err(StorageError::MalformedHeader(format!(
            "invalid size: {}",
            size
        )));
    }
    let size = size
        .parse::<u64>()
        .map_err(|_| StorageError::MalformedHeader(format!("invalid size: {}", size)))?;

    Ok((object_type, size))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn object_type() -> impl Strategy<Value = ObjectType> {
        prop_oneof![
            Just(ObjectType::Commit),
            Just(ObjectType::Tree),
            Just(ObjectType::Blob),
            Just(ObjectType::Tag),
        ]
    }

    proptest! {
        /// Property: decoding returns the written type, size and bytes.
        #[test]
        fn prop_codec_roundtrip(ot in object_type(), data in prop::collection::vec(any::<u8>(), 0..20000)) {
            let mut writer = ObjectWriter::new(Vec::new(), ot, data.len() as u64).unwrap();
            writer.write_all(&data).unwrap();
            let encoded = writer.finish().unwrap();

            let mut reader = ObjectReader::new(Cursor::new(encoded)).unwrap();
            prop_assert_eq!(reader.object_type(), ot);
            prop_assert_eq!(reader.size(), data.len() as u64);
            let mut out = Vec::new();
            reader.read_to_end(&mut out).unwrap();
            prop_assert_eq!(&out, &data);
            prop_assert_eq!(reader.hash(), Some(writer.hash()));
        }

        /// Property: the streaming digest equals the whole-buffer digest.
        #[test]
        fn prop_digest_deterministic(ot in object_type(), data in prop::collection::vec(any::<u8>(), 0..4096), chunk in 1usize..512) {
            let mut writer = ObjectWriter::new(Vec::new(), ot, data.len() as u64).unwrap();
            for piece in data.chunks(chunk) {
                writer.write_all(piece).unwrap();
            }
            writer.finish().unwrap();
            prop_assert_eq!(writer.hash(), ObjectId::hash_object(ot, &data));
        }

        /// Property: arbitrary input never panics the reader.
        #[test]
        fn prop_reader_no_panic(data in prop::collection::vec(any::<u8>(), 0..512)) {
            if let Ok(mut reader) = ObjectReader::new(Cursor::new(data)) {
                let mut out = Vec::new();
                let _ = reader.read_to_end(&mut out);
            }
        }
    }
}
