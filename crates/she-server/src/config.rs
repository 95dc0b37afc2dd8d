// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server configuration: an optional TOML file, overridden field-by-field
//! by CLI flags (spec §11 AMBIENT).
//!
//! Grounded on `hdds-logger`'s `LogConfig`/`LogConfigBuilder` shape -- a
//! plain `serde::Deserialize` struct with a `Default` impl, loaded from
//! disk when present and otherwise left at its defaults.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Shared-memory segment name the server creates for client requests.
    pub request_segment: String,
    /// Shared-memory segment name the server creates for responses.
    pub response_segment: String,
    /// Payload capacity, in bytes, of each region (spec §4.1: "N >= max packet").
    pub payload_capacity: usize,
    /// Optional file backing the key store's NVM objects across restarts
    /// (spec §11 AMBIENT: `MemoryKeyStore`'s file-journal mode).
    pub nvm_journal_path: Option<PathBuf>,
    /// `tracing_subscriber::EnvFilter` directive string.
    pub tracing_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_segment: "/she_req".to_string(),
            response_segment: "/she_resp".to_string(),
            payload_capacity: 256,
            nvm_journal_path: None,
            tracing_filter: "she_server=info,she_core=warn".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file, falling back to defaults for any field the
    /// file does not mention (`#[serde(default)]` on the struct).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_segment_names() {
        let config = ServerConfig::default();
        assert_eq!(config.request_segment, "/she_req");
        assert_eq!(config.response_segment, "/she_resp");
        assert!(config.nvm_journal_path.is_none());
    }

    #[test]
    fn partial_toml_fills_remaining_fields_from_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("she.toml");
        std::fs::write(&path, "payload_capacity = 512\n").unwrap();

        let config = ServerConfig::load_from_file(&path).unwrap();
        assert_eq!(config.payload_capacity, 512);
        assert_eq!(config.request_segment, "/she_req");
    }
}
