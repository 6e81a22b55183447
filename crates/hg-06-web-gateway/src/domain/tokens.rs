//! Bearer token table.
//!
//! Tokens are never stored or compared in plaintext: the presented token is
//! hashed with SHA-256 and compared against every configured hash in
//! constant time.

use crate::domain::config::TokenEntry;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::warn;

/// Lower-hex SHA-256 of `token`, the form stored in configuration.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    entries: Vec<([u8; 32], TokenEntry)>,
}

impl TokenTable {
    /// Entries whose hash is not 64 hex characters are skipped.
    pub fn new(entries: impl IntoIterator<Item = TokenEntry>) -> Self {
        let entries = entries
            .into_iter()
            .filter_map(|entry| {
                let normalized = entry.token_sha256.trim().to_ascii_lowercase();
                let mut hash = [0u8; 32];
                match hex::decode_to_slice(&normalized, &mut hash) {
                    Ok(()) => Some((hash, entry)),
                    Err(_) => {
                        warn!(token_id = %entry.id, "Skipping token with malformed hash");
                        None
                    }
                }
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for a presented plaintext token, if it is known, enabled and
    /// bound to a subject.
    pub fn resolve(&self, token: &str) -> Option<&TokenEntry> {
        let presented: [u8; 32] = Sha256::digest(token.as_bytes()).into();
        let mut found = None;
        for (hash, entry) in &self.entries {
            if bool::from(hash[..].ct_eq(&presented[..])) {
                found = Some(entry);
            }
        }
        found.filter(|entry| entry.enabled && !entry.subject.is_empty())
    }
}
