//! Git pkt-line framing.
//!
//! Every packet starts with a 4-character hex length that includes the
//! prefix itself. `0000`, `0001` and `0002` are the flush, delimiter and
//! response-end markers.

use crate::{GitError, Result};
use std::io::{self, Read, Write};

/// Largest packet length allowed by the protocol, prefix included.
pub const MAX_PKT_LEN: usize = 65520;

/// A pkt-line packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    /// Data line with content.
    Data(Vec<u8>),
    /// Flush packet (0000).
    Flush,
    /// Delimiter packet (0001).
    Delimiter,
    /// Response-end packet (0002).
    ResponseEnd,
}

impl PktLine {
    /// Creates a data packet from a string slice.
    pub fn from_string(s: &str) -> Self {
        Self::Data(s.as_bytes().to_vec())
    }

    /// Encodes the packet to bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Data(data) => {
                let mut out = format!("{:04x}", data.len() + 4).into_bytes();
                out.extend_from_slice(data);
                out
            }
            Self::Flush => b"0000".to_vec(),
            Self::Delimiter => b"0001".to_vec(),
            Self::ResponseEnd => b"0002".to_vec(),
        }
    }

    /// Returns the data as a string without its trailing newline.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Data(data) => std::str::from_utf8(data)
                .ok()
                .map(|s| s.strip_suffix('\n').unwrap_or(s)),
            _ => None,
        }
    }
}

/// Reader for pkt-line streams.
pub struct PktLineReader<R> {
    reader: R,
}

impl<R: Read> PktLineReader<R> {
    /// Creates a new pkt-line reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads the next packet, or `None` at a clean end of stream.
    pub fn read(&mut self) -> Result<Option<PktLine>> {
        let mut prefix = [0u8; 4];

        // End of stream is only clean on a packet boundary.
        match self.reader.read_exact(&mut prefix[..1]) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        self.reader.read_exact(&mut prefix[1..]).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                GitError::InvalidPktLine("truncated length prefix".to_string())
            } else {
                e.into()
            }
        })?;

        // from_str_radix alone would accept a sign.
        let len = std::str::from_utf8(&prefix)
            .ok()
            .filter(|s| s.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|s| usize::from_str_radix(s, 16).ok())
            .ok_or_else(|| {
                GitError::InvalidPktLine(format!(
                    "invalid length prefix: {:?}",
                    String::from_utf8_lossy(&prefix)
                ))
            })?;

        match len {
            0 => Ok(Some(PktLine::Flush)),
            1 => Ok(Some(PktLine::Delimiter)),
            2 => Ok(Some(PktLine::ResponseEnd)),
            3 => Err(GitError::InvalidPktLine("length too small".to_string())),
            len if len > MAX_PKT_LEN => Err(GitError::InvalidPktLine(format!(
                "length {} exceeds maximum",
                len
            ))),
            len => {
                let mut data = vec![0u8; len - 4];
                self.reader.read_exact(&mut data).map_err(|e| {
                    if e.kind() == io::ErrorKind::UnexpectedEof {
                        GitError::InvalidPktLine("truncated packet".to_string())
                    } else {
                        e.into()
                    }
                })?;
                Ok(Some(PktLine::Data(data)))
            }
        }
    }

    /// Reads all packets until a flush packet or end of stream.
    pub fn read_until_flush(&mut self) -> Result<Vec<PktLine>> {
        let mut packets = Vec::new();
        while let Some(pkt) = self.read()? {
            if pkt == PktLine::Flush {
                break;
            }
            packets.push(pkt);
        }
        Ok(packets)
    }

    /// Reads every data packet to the end of the stream as text lines.
    ///
    /// Flush and other marker packets are skipped. Trailing newlines are
    /// removed and invalid UTF-8 is replaced.
    pub fn read_lines(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(pkt) = self.read()? {
            if let PktLine::Data(data) = pkt {
                let line = String::from_utf8_lossy(&data);
                lines.push(line.strip_suffix('\n').unwrap_or(&line).to_string());
            }
        }
        Ok(lines)
    }

    /// Consumes the reader and returns the inner reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Writer for pkt-line streams.
pub struct PktLineWriter<W> {
    writer: W,
}

impl<W: Write> PktLineWriter<W> {
    /// Creates a new pkt-line writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes a packet.
    pub fn write(&mut self, pkt: &PktLine) -> Result<()> {
        if let PktLine::Data(data) = pkt {
            if data.len() + 4 > MAX_PKT_LEN {
                return Err(GitError::InvalidPktLine(format!(
                    "payload of {} bytes is too large",
                    data.len()
                )));
            }
        }
        self.writer.write_all(&pkt.encode())?;
        Ok(())
    }

    /// Writes a text line, appending a newline if missing.
    pub fn write_line(&mut self, s: &str) -> Result<()> {
        let mut data = s.as_bytes().to_vec();
        if !s.ends_with('\n') {
            data.push(b'\n');
        }
        self.write(&PktLine::Data(data))
    }

    /// Writes a flush packet and flushes the underlying writer.
    pub fn flush_pkt(&mut self) -> Result<()> {
        self.write(&PktLine::Flush)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the inner writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_all(f: impl FnOnce(&mut PktLineWriter<&mut Vec<u8>>)) -> Vec<u8> {
        let mut buf = Vec::new();
        f(&mut PktLineWriter::new(&mut buf));
        buf
    }

    #[test]
    fn test_encode() {
        assert_eq!(PktLine::from_string("hello\n").encode(), b"000ahello\n");
        assert_eq!(PktLine::Data(Vec::new()).encode(), b"0004");
        assert_eq!(PktLine::Flush.encode(), b"0000");
        assert_eq!(PktLine::Delimiter.encode(), b"0001");
        assert_eq!(PktLine::ResponseEnd.encode(), b"0002");
    }

    #[test]
    fn test_read_markers_and_data() {
        let buf = b"0001000ahello\n00020000".to_vec();
        let mut reader = PktLineReader::new(Cursor::new(buf));
        assert_eq!(reader.read().unwrap(), Some(PktLine::Delimiter));
        assert_eq!(reader.read().unwrap(), Some(PktLine::from_string("hello\n")));
        assert_eq!(reader.read().unwrap(), Some(PktLine::ResponseEnd));
        assert_eq!(reader.read().unwrap(), Some(PktLine::Flush));
        assert_eq!(reader.read().unwrap(), None);
    }

    #[test]
    fn test_as_str() {
        assert_eq!(PktLine::from_string("hello\n").as_str(), Some("hello"));
        assert_eq!(PktLine::from_string("bare").as_str(), Some("bare"));
        assert_eq!(PktLine::Data(vec![0xff, 0xfe]).as_str(), None);
        assert_eq!(PktLine::Flush.as_str(), None);
    }

    #[test]
    fn test_read_until_flush() {
        let buf = encode_all(|w| {
            w.write_line("line1").unwrap();
            w.write_line("line2").unwrap();
            w.flush_pkt().unwrap();
            w.write_line("line3").unwrap();
        });

        let mut reader = PktLineReader::new(Cursor::new(buf));
        assert_eq!(reader.read_until_flush().unwrap().len(), 2);
        assert_eq!(reader.read_until_flush().unwrap().len(), 1);
    }

    #[test]
    fn test_read_lines_skips_markers() {
        let buf = encode_all(|w| {
            w.write_line("# service=git-upload-pack").unwrap();
            w.flush_pkt().unwrap();
            w.write_line("first").unwrap();
            w.write(&PktLine::from_string("no newline")).unwrap();
            w.flush_pkt().unwrap();
        });

        let lines = PktLineReader::new(Cursor::new(buf)).read_lines().unwrap();
        assert_eq!(
            lines,
            vec!["# service=git-upload-pack", "first", "no newline"]
        );
    }

    #[test]
    fn test_write_line_single_newline() {
        let buf = encode_all(|w| w.write_line("test\n").unwrap());
        assert_eq!(buf, b"0009test\n");
    }

    #[test]
    fn test_invalid_prefixes() {
        for bad in [&b"0003"[..], b"zzzz", b"00\xff0"] {
            let mut reader = PktLineReader::new(Cursor::new(bad.to_vec()));
            assert!(matches!(reader.read(), Err(GitError::InvalidPktLine(_))));
        }
    }

    #[test]
    fn test_oversized_length() {
        let mut reader = PktLineReader::new(Cursor::new(b"fff1".to_vec()));
        assert!(matches!(reader.read(), Err(GitError::InvalidPktLine(_))));

        let mut buf = Vec::new();
        let mut writer = PktLineWriter::new(&mut buf);
        let result = writer.write(&PktLine::Data(vec![b'x'; MAX_PKT_LEN]));
        assert!(result.is_err());
    }

    #[test]
    fn test_truncated_length_prefix() {
        for cut in 1..4 {
            let mut reader = PktLineReader::new(&b"000ahello\n"[..cut]);
            match reader.read() {
                Err(GitError::InvalidPktLine(msg)) => assert!(msg.contains("prefix")),
                other => panic!("unexpected result for {cut} bytes: {other:?}"),
            }
        }

        let mut reader = PktLineReader::new(&b"000ahello\n00"[..]);
        assert!(reader.read().unwrap().is_some());
        assert!(matches!(reader.read(), Err(GitError::InvalidPktLine(_))));
    }

    #[test]
    fn test_truncated_advertisement_fails() {
        let result = crate::UploadPackInfo::decode(&b"001e# service=git-upload-pack\n00"[..]);
        assert!(matches!(result, Err(GitError::InvalidPktLine(_))));
    }

    #[test]
    fn test_signed_prefix_rejected() {
        for bad in [&b"+009hello"[..], b"-009hello", b" 009hello"] {
            let mut reader = PktLineReader::new(bad);
            assert!(matches!(reader.read(), Err(GitError::InvalidPktLine(_))));
        }
    }

    #[test]
    fn test_uppercase_hex_prefix() {
        let mut reader = PktLineReader::new(&b"000Ahello\n"[..]);
        assert_eq!(reader.read().unwrap(), Some(PktLine::from_string("hello\n")));
    }

    #[test]
    fn test_truncated_packet() {
        let mut reader = PktLineReader::new(Cursor::new(b"000ahel".to_vec()));
        assert!(matches!(reader.read(), Err(GitError::InvalidPktLine(_))));
    }

    #[test]
    fn test_into_inner() {
        let writer = PktLineWriter::new(Vec::<u8>::new());
        assert!(writer.into_inner().is_empty());
        let reader = PktLineReader::new(Cursor::new(Vec::<u8>::new()));
        assert_eq!(reader.into_inner().position(), 0);
    }
}
