//! Lazy enumeration of loose objects.

use super::RESERVED_DIRS;
use crate::{ObjectId, ObjectReader, ObjectType, Result, StorageError};
use std::fs::File;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// One-shot iterator over the ids found in an objects directory.
///
/// The directory is walked lazily in file-name order. Only two-hex-character
/// shard directories are entered; the reserved `pack` and `info` trees and
/// anything else are skipped without being read. Walk errors are yielded as
/// `Err` items.
pub struct ObjectIter {
    walker: walkdir::IntoIter,
    filter: Option<ObjectType>,
}

impl ObjectIter {
    pub(crate) fn new(root: &Path, filter: Option<ObjectType>) -> Self {
        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter();
        Self { walker, filter }
    }

    fn matches(&self, path: &Path) -> Result<bool> {
        let Some(wanted) = self.filter else {
            return Ok(true);
        };
        let reader = ObjectReader::new(File::open(path)?)?;
        Ok(reader.object_type() == wanted)
    }
}

impl Iterator for ObjectIter {
    type Item = Result<ObjectId>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(StorageError::from(io::Error::from(e)))),
            };

            let name = entry.file_name().to_string_lossy();
            if entry.depth() == 1 {
                if entry.file_type().is_dir() && !is_shard_name(&name) {
                    self.walker.skip_current_dir();
                }
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            let shard = match entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .and_then(|s| s.to_str())
            {
                Some(shard) => shard,
                None => continue,
            };
            if name.len() != ObjectId::HEX_LEN - 2 || !is_lower_hex(&name) {
                continue;
            }

            let id = match ObjectId::from_hex(&format!("{}{}", shard, name)) {
                Ok(id) => id,
                Err(_) => continue,
            };

            match self.matches(entry.path()) {
                Ok(true) => return Some(Ok(id)),
                Ok(false) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Two lowercase hex characters, excluding the reserved names.
fn is_shard_name(name: &str) -> bool {
    name.len() == 2 && is_lower_hex(name) && !RESERVED_DIRS.contains(&name)
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
