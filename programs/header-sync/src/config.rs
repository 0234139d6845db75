//! Defines the configuration file of the CLI.

use std::{collections::BTreeSet, path::PathBuf, str::FromStr};

use anyhow::{bail, Context};
use header_sync_core::{config::parse_config, SyncConfig};
use serde::{Deserialize, Serialize};
use tracing::Level;

/// The top level configuration of the CLI.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
#[allow(clippy::module_name_repetitions)]
pub struct AppConfig {
    /// Log level, overridden by `RUST_LOG` when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Path of the JSON file holding the synchroniser state.
    pub state_path: PathBuf,
    /// The external chains served.
    pub chains: Vec<ChainConfig>,
}

/// One external chain.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
#[allow(clippy::module_name_repetitions)]
pub struct ChainConfig {
    /// Relay chain id of the external chain.
    pub chain_id: u64,
    /// The consensus family of the chain.
    pub family: Family,
    /// Sync settings of the chain.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Supported chain families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Tendermint/CometBFT chains with ed25519 validators.
    Cosmos,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Reads, parses and validates a JSON config file.
    ///
    /// # Errors
    /// Fails if the file cannot be read, does not parse or is inconsistent.
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let bz = std::fs::read(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_slice(&bz)
            .with_context(|| format!("config {} is not valid JSON", path.display()))?;
        Self::from_value(value)
    }

    /// Parses and validates a JSON config value.
    ///
    /// # Errors
    /// Fails with the JSON path of the first invalid value, on duplicate chain ids
    /// or on inconsistent sync settings.
    pub fn from_value(value: serde_json::Value) -> anyhow::Result<Self> {
        let config: Self = parse_config(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks chain entries for consistency.
    ///
    /// # Errors
    /// Fails on duplicate chain ids or invalid sync settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = BTreeSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                bail!("chain {} is configured more than once", chain.chain_id);
            }
            chain
                .sync
                .validate()
                .with_context(|| format!("chain {}", chain.chain_id))?;
        }
        Ok(())
    }

    /// Returns the log level, `info` if unparsable.
    #[must_use]
    pub fn log_level(&self) -> Level {
        Level::from_str(&self.log_level).unwrap_or(Level::INFO)
    }

    /// The entry of `chain_id`, if configured.
    #[must_use]
    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }
}
