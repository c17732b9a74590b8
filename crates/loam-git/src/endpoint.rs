//! Remote repository endpoints.

use crate::{GitError, Result};
use std::fmt;

/// Service name for fetching objects.
pub const UPLOAD_PACK: &str = "git-upload-pack";

/// Service name for pushing objects.
pub const RECEIVE_PACK: &str = "git-receive-pack";

/// A normalized remote repository URL ending in `.git`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    url: String,
}

impl Endpoint {
    /// Parses and normalizes a remote URL.
    ///
    /// Accepts `scheme://host/path` and scp-style `user@host:path` forms.
    pub fn new(url: &str) -> Result<Self> {
        let trimmed = url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(GitError::InvalidEndpoint("empty url".to_string()));
        }

        if !has_scheme(trimmed) && !is_scp_like(trimmed) {
            return Err(GitError::InvalidEndpoint(format!(
                "{url}: missing scheme or host"
            )));
        }

        let mut url = trimmed.to_string();
        if !url.ends_with(".git") {
            url.push_str(".git");
        }
        Ok(Self { url })
    }

    /// URL of the reference advertisement for `service`.
    pub fn service(&self, service: &str) -> String {
        format!("{}/info/refs?service={}", self.url, service)
    }

    /// Returns the normalized URL.
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

fn has_scheme(url: &str) -> bool {
    match url.split_once("://") {
        Some((scheme, rest)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                && !rest.is_empty()
        }
        None => false,
    }
}

fn is_scp_like(url: &str) -> bool {
    match url.split_once(':') {
        Some((host, path)) => !host.is_empty() && !host.contains('/') && !path.is_empty(),
        None => false,
    }
}
