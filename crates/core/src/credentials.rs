//! Account credential loading.
//!
//! Credential files hold one account per line. Lines may carry extra
//! colon-separated prefix fields (for example a service label); only the
//! last two non-empty fields are used.

use crate::error::{Error, Result};
use std::fmt;
use std::path::Path;
use tracing::warn;

/// One account identifier/secret pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Email address or phone-like handle.
    pub identifier: String,
    /// Account password.
    pub secret: String,
}

impl Credential {
    /// Create a credential.
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Parse credential lines. Invalid lines are skipped with a warning.
pub fn parse_credentials(content: &str) -> Vec<Credential> {
    let mut accounts = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match parse_credential_line(line) {
            Some(credential) => accounts.push(credential),
            None => warn!("skipping invalid credential line #{}", idx + 1),
        }
    }
    accounts
}

/// Parse a single trimmed line, returning `None` when fewer than two
/// non-empty fields are present.
pub fn parse_credential_line(line: &str) -> Option<Credential> {
    let parts: Vec<&str> = line
        .split(':')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    match parts.as_slice() {
        [.., identifier, secret] => Some(Credential::new(*identifier, *secret)),
        _ => None,
    }
}

/// Read and parse a credential file.
pub fn load_credentials(path: &Path) -> Result<Vec<Credential>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read credential file {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(parse_credentials(&content))
}
