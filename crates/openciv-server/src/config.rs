//! Server configuration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use openciv_protocol::WireFormat;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogSource;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the server
    pub bind_address: SocketAddr,
    /// Transport-level connection cap. The lobby also caps players at the
    /// catalog size.
    pub max_clients: usize,
    /// Civilization catalog file; the embedded catalog when unset
    pub civilizations: Option<PathBuf>,
    pub wire_format: WireFormat,
    /// Session tick interval in milliseconds
    pub tick_millis: u64,
    /// Hex-encoded 32-byte netcode key. Unsecure authentication when unset.
    pub private_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 7777)),
            max_clients: 8,
            civilizations: None,
            wire_format: WireFormat::default(),
            tick_millis: 16, // ~60 Hz
            private_key: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let mut config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    /// Resolve a relative catalog path against the config file's directory
    pub fn resolve_paths(&mut self, base: &Path) {
        if let Some(path) = &self.civilizations {
            if path.is_relative() {
                self.civilizations = Some(base.join(path));
            }
        }
    }

    pub fn catalog_source(&self) -> CatalogSource {
        match &self.civilizations {
            Some(path) => CatalogSource::Path(path.clone()),
            None => CatalogSource::Embedded,
        }
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }

    pub fn private_key_bytes(&self) -> Result<Option<[u8; 32]>> {
        let Some(encoded) = &self.private_key else {
            return Ok(None);
        };
        let mut key = [0u8; 32];
        hex::decode_to_slice(encoded.trim(), &mut key)
            .context("private_key must be 64 hex characters")?;
        Ok(Some(key))
    }
}
