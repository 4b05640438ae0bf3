use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use partyline_core::IdentityTable;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username to authorized public keys.
    pub clients: HashMap<String, ClientKeys>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8022
}

/// One key or several; a single string may also hold multiple
/// authorized_keys lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientKeys {
    Single(String),
    Many(Vec<String>),
}

impl ClientKeys {
    fn as_text(&self) -> String {
        match self {
            ClientKeys::Single(text) => text.clone(),
            ClientKeys::Many(entries) => entries.join("\n"),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Self = serde_yml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;
        Ok(config)
    }

    /// Build the immutable identity table the authenticator runs against.
    pub fn identity_table(&self) -> Result<IdentityTable> {
        let mut table = IdentityTable::new();
        for (username, keys) in &self.clients {
            table
                .add_client(username, &keys.as_text())
                .with_context(|| format!("invalid key entry for client {username:?}"))?;
        }
        Ok(table)
    }
}
