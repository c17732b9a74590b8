//! Capability lists and upload-pack reference advertisements.

use crate::pktline::PktLineReader;
use crate::Result;
use loam_storage::ObjectId;
use std::collections::BTreeMap;
use std::io::Read;

/// Capability advertised by a server for its symbolic references.
pub const SYMREF: &str = "symref";

/// Name of the symbolic reference pointing at the default branch.
pub const HEAD: &str = "HEAD";

/// Capabilities advertised by a remote, keyed by name.
///
/// A bare token such as `thin-pack` maps to no values, while `name=a,b`
/// maps to `["a", "b"]`. Repeated names accumulate their values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    entries: BTreeMap<String, Vec<String>>,
}

impl Capabilities {
    /// Parses a space-separated capability line.
    pub fn parse(line: &str) -> Self {
        let mut caps = Self::default();
        for token in line.split_whitespace() {
            let (name, values) = match token.split_once('=') {
                Some((name, values)) => (name, Some(values)),
                None => (token, None),
            };
            if name.is_empty() {
                continue;
            }

            let entry = caps.entries.entry(name.to_string()).or_default();
            if let Some(values) = values {
                entry.extend(
                    values
                        .split(',')
                        .filter(|v| !v.is_empty())
                        .map(str::to_string),
                );
            }
        }
        caps
    }

    /// Returns true if the capability was advertised.
    pub fn supports(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the values of a capability, empty if absent.
    pub fn get(&self, name: &str) -> &[String] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolves a symbolic reference advertised as `symref=<name>:<target>`.
    pub fn symbolic_reference(&self, name: &str) -> Option<&str> {
        self.get(SYMREF).iter().find_map(|value| {
            let mut parts = value.split(':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(sym), Some(target), None) if sym == name => Some(target),
                _ => None,
            }
        })
    }

    /// Number of distinct capabilities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was advertised.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over capability names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// The reference advertisement returned by `info/refs?service=git-upload-pack`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadPackInfo {
    /// Capabilities from the first advertised line.
    pub capabilities: Capabilities,
    /// Advertised references by name.
    pub refs: BTreeMap<String, ObjectId>,
}

impl UploadPackInfo {
    /// Decodes an advertisement from a pkt-line stream.
    pub fn decode<R: Read>(reader: R) -> Result<Self> {
        let lines = PktLineReader::new(reader).read_lines()?;
        Ok(Self::from_lines(lines.iter().map(String::as_str)))
    }

    /// Builds an advertisement from already de-framed lines.
    ///
    /// Comment and empty lines are dropped. Lines that are not
    /// `<id> <name>` pairs are ignored.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut info = Self::default();
        let mut lines = lines
            .into_iter()
            .filter(|line| !line.is_empty() && !line.starts_with('#'));

        if let Some(first) = lines.next() {
            match first.split_once('\0') {
                Some((reference, caps)) => {
                    info.capabilities = Capabilities::parse(caps);
                    info.add_ref(reference);
                }
                None => info.capabilities = Capabilities::parse(first),
            }
        }

        for line in lines {
            info.add_ref(line);
        }
        info
    }

    fn add_ref(&mut self, line: &str) {
        let parsed = line
            .split_once(' ')
            .and_then(|(id, name)| Some((id.parse::<ObjectId>().ok()?, name.trim())));

        match parsed {
            Some((id, name)) if !name.is_empty() => {
                self.refs.insert(name.to_string(), id);
            }
            _ => tracing::debug!(line, "ignoring malformed reference line"),
        }
    }

    /// Returns the commit `HEAD` points at.
    ///
    /// Follows the `symref` capability when present, otherwise looks for
    /// a literal `HEAD` entry.
    pub fn head(&self) -> Option<ObjectId> {
        self.capabilities
            .symbolic_reference(HEAD)
            .and_then(|target| self.refs.get(target))
            .or_else(|| self.refs.get(HEAD))
            .copied()
    }

    /// Iterates over advertised branches, without the `refs/heads/` prefix.
    pub fn branches(&self) -> impl Iterator<Item = (&str, &ObjectId)> {
        self.refs
            .iter()
            .filter_map(|(name, id)| Some((name.strip_prefix("refs/heads/")?, id)))
    }
}
