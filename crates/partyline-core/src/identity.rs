//! Identity table mapping usernames to their authorized public keys

use std::collections::HashMap;

use anyhow::{Result, bail};

/// A single authorized public key in OpenSSH textual form.
///
/// Only the algorithm name and the base64 blob take part in comparisons;
/// trailing comments from authorized_keys lines are dropped at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedKey {
    pub algorithm: String,
    pub key_base64: String,
}

impl AuthorizedKey {
    /// Parse one `<algorithm> <base64> [comment]` line.
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let (Some(algorithm), Some(key_base64)) = (parts.next(), parts.next()) else {
            bail!("malformed public key entry: {line:?}");
        };
        Ok(Self {
            algorithm: algorithm.to_string(),
            key_base64: key_base64.to_string(),
        })
    }
}

/// Read-only username to authorized-keys mapping, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct IdentityTable {
    clients: HashMap<String, Vec<AuthorizedKey>>,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every key found in `keys_text` for `username`.
    ///
    /// Accepts authorized_keys-style text: one key per line, blank lines
    /// and `#` comments skipped. Fails if no usable entry remains.
    pub fn add_client(&mut self, username: &str, keys_text: &str) -> Result<()> {
        let entry = self.clients.entry(username.to_string()).or_default();
        for line in keys_text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            entry.push(AuthorizedKey::parse(line)?);
        }
        if entry.is_empty() {
            bail!("no usable public key entries for client {username:?}");
        }
        Ok(())
    }

    pub fn keys_for(&self, username: &str) -> Option<&[AuthorizedKey]> {
        self.clients.get(username).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ED25519: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIKDummyKeyMaterialForTests0000000000000001";

    #[test]
    fn test_parse_key_with_comment() {
        let key = AuthorizedKey::parse("ssh-ed25519 AAAAC3Nza alice@laptop").unwrap();
        assert_eq!(key.algorithm, "ssh-ed25519");
        assert_eq!(key.key_base64, "AAAAC3Nza");
    }

    #[test]
    fn test_parse_key_without_comment() {
        let key = AuthorizedKey::parse("ssh-rsa AAAAB3Nza").unwrap();
        assert_eq!(key.algorithm, "ssh-rsa");
    }

    #[test]
    fn test_parse_malformed_key() {
        assert!(AuthorizedKey::parse("ssh-ed25519").is_err());
        assert!(AuthorizedKey::parse("").is_err());
    }

    #[test]
    fn test_add_client_single_key() {
        let mut table = IdentityTable::new();
        table.add_client("alice", ED25519).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.keys_for("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_add_client_multiline_with_comments() {
        let text = format!("# work laptop\n{ED25519}\n\nssh-rsa AAAAB3Nza bob@old-box\n");
        let mut table = IdentityTable::new();
        table.add_client("bob", &text).unwrap();
        let keys = table.keys_for("bob").unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1].algorithm, "ssh-rsa");
    }

    #[test]
    fn test_add_client_no_usable_entries() {
        let mut table = IdentityTable::new();
        assert!(table.add_client("carol", "# only a comment\n").is_err());
    }

    #[test]
    fn test_keys_for_unknown_user() {
        let table = IdentityTable::new();
        assert!(table.keys_for("nobody").is_none());
    }
}
