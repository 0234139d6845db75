//! Configuration of a header sync handler.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use thiserror::Error;

use crate::{error::HeaderSyncError, Address};

/// Per-chain synchronisation settings, injected when the handler is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(clippy::module_name_repetitions)]
pub struct SyncConfig {
    /// How the parent of a submitted header is resolved.
    #[serde(default)]
    pub parent_linkage: ParentLinkage,
    /// Maximum number of headers accepted in one batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Who may bootstrap a chain with its genesis header.
    #[serde(default)]
    pub genesis_policy: GenesisPolicy,
}

/// Parent resolution policy for submitted headers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentLinkage {
    /// The header at `height - 1` must be stored and its hash must be the declared parent hash.
    #[default]
    Strict,
    /// As [`Self::Strict`] when `height - 1` is stored. Otherwise a header above the current
    /// height links to the current header and is verified against the validator set trusted there.
    NearestAncestor,
}

/// Trust policy for genesis bootstrap.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenesisPolicy {
    /// The host authorizes the submitter; the genesis payload is self-certifying.
    #[default]
    Open,
    /// At least `min_signers` of `addresses` must have signed the genesis request.
    Authorities {
        /// Relay chain accounts allowed to approve a genesis header
        #[serde_as(as = "Vec<Hex>")]
        addresses: Vec<Address>,
        /// Number of distinct approvals required
        min_signers: usize,
    },
}

/// Configuration could not be parsed or is inconsistent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub enum ConfigError {
    /// The JSON does not match the expected shape.
    #[error("config error at {path}: {message}")]
    Parse {
        /// JSON path of the failing value
        path: String,
        /// The serde error message
        message: String,
    },
    /// The values are well formed but unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

const fn default_max_batch_size() -> usize {
    256
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            parent_linkage: ParentLinkage::default(),
            max_batch_size: default_max_batch_size(),
            genesis_policy: GenesisPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Checks the settings for consistency.
    ///
    /// # Errors
    /// Fails on a zero batch size or an unsatisfiable genesis policy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "max_batch_size must be positive".to_string(),
            ));
        }
        if let GenesisPolicy::Authorities {
            addresses,
            min_signers,
        } = &self.genesis_policy
        {
            let unique = addresses.iter().collect::<BTreeSet<_>>().len();
            if unique != addresses.len() {
                return Err(ConfigError::Invalid(
                    "duplicate genesis authority".to_string(),
                ));
            }
            if *min_signers == 0 || *min_signers > unique {
                return Err(ConfigError::Invalid(format!(
                    "min_signers must be between 1 and {unique}, got {min_signers}"
                )));
            }
        }
        Ok(())
    }
}

impl GenesisPolicy {
    /// Checks that `signers` satisfy the policy.
    ///
    /// # Errors
    /// Returns [`HeaderSyncError::GenesisUnauthorized`] if too few authorities signed.
    pub fn authorize(&self, signers: &[Address]) -> Result<(), HeaderSyncError> {
        match self {
            Self::Open => Ok(()),
            Self::Authorities {
                addresses,
                min_signers,
            } => {
                let approved = signers
                    .iter()
                    .filter(|s| addresses.contains(s))
                    .collect::<BTreeSet<_>>()
                    .len();
                if approved >= *min_signers {
                    Ok(())
                } else {
                    Err(HeaderSyncError::GenesisUnauthorized {
                        approved,
                        required: *min_signers,
                    })
                }
            }
        }
    }
}

/// Parses a JSON value into the target type with path-aware error messages
/// (e.g. `chains[0].sync.max_batch_size`).
///
/// # Errors
/// Returns [`ConfigError::Parse`] with the failing path and the serde message.
pub fn parse_config<T>(value: serde_json::Value) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned,
{
    // Round-trip through a string so the deserializer can report line/column.
    let json_string = value.to_string();

    let mut deserializer = serde_json::Deserializer::from_str(&json_string);
    serde_path_to_error::deserialize::<_, T>(&mut deserializer).map_err(|e| ConfigError::Parse {
        path: e.path().to_string(),
        message: e.inner().to_string(),
    })
}
