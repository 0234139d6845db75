//! The epoch ledger: per chain, a height-ordered sequence of epoch switches.
//!
//! The checkpoint recorded at height `h` holds the validator set announced by
//! the header at `h`, so it is authoritative for headers above `h` until the
//! next checkpoint.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use tracing::{debug, info};

use crate::{
    error::HeaderSyncError,
    storage::{load, save, Storage},
    validator::ValidatorSet,
};

/// Key prefix of the genesis markers.
pub const GENESIS_PREFIX: &str = "genesis";
/// Key prefix of the epoch switch checkpoints.
pub const EPOCHS_PREFIX: &str = "epochs";

/// A validator set checkpoint of an external chain.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSwitchInfo {
    /// Relay chain id of the external chain
    pub chain_id: u64,
    /// Chain id the external chain uses in its own headers
    pub external_chain_id: String,
    /// Height of the header that announced this validator set
    pub height: u64,
    /// Hash of that header
    #[serde_as(as = "Hex")]
    pub block_hash: Vec<u8>,
    /// Hash of `validators`, as declared by that header
    #[serde_as(as = "Hex")]
    pub next_validators_hash: Vec<u8>,
    /// The validator set that signs the headers following `height`
    pub validators: ValidatorSet,
}

/// Marks a chain as bootstrapped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisMarker {
    /// Height of the genesis header
    pub height: u64,
    /// Chain id the external chain uses in its own headers
    pub external_chain_id: String,
}

fn genesis_key(chain_id: u64) -> String {
    format!("{GENESIS_PREFIX}/{chain_id}")
}

fn index_key(chain_id: u64) -> String {
    format!("{EPOCHS_PREFIX}/{chain_id}/index")
}

fn epoch_key(chain_id: u64, height: u64) -> String {
    format!("{EPOCHS_PREFIX}/{chain_id}/{height}")
}

/// Returns the genesis marker of a chain, if it was bootstrapped.
///
/// # Errors
/// Returns an error if the stored marker is corrupted.
pub fn genesis(storage: &dyn Storage, chain_id: u64) -> Result<Option<GenesisMarker>, HeaderSyncError> {
    load(storage, &genesis_key(chain_id))
}

/// Whether a chain was bootstrapped.
///
/// # Errors
/// Returns an error if the stored marker is corrupted.
pub fn is_initialized(storage: &dyn Storage, chain_id: u64) -> Result<bool, HeaderSyncError> {
    Ok(genesis(storage, chain_id)?.is_some())
}

/// Records the first checkpoint of a chain and marks it initialized.
///
/// # Errors
/// Returns [`HeaderSyncError::GenesisAlreadyInitialized`] if the chain was bootstrapped before.
pub fn init_genesis(storage: &mut dyn Storage, info: &EpochSwitchInfo) -> Result<(), HeaderSyncError> {
    if is_initialized(storage, info.chain_id)? {
        return Err(HeaderSyncError::GenesisAlreadyInitialized {
            chain_id: info.chain_id,
        });
    }

    save(
        storage,
        &genesis_key(info.chain_id),
        &GenesisMarker {
            height: info.height,
            external_chain_id: info.external_chain_id.clone(),
        },
    )?;
    save(storage, &index_key(info.chain_id), &vec![info.height])?;
    save(storage, &epoch_key(info.chain_id, info.height), info)?;

    info!(
        chain_id = info.chain_id,
        height = info.height,
        validators = info.validators.len(),
        "genesis epoch recorded"
    );
    Ok(())
}

/// Heights of all checkpoints of a chain, ascending.
///
/// # Errors
/// Returns an error if the stored index is corrupted.
pub fn epoch_heights(storage: &dyn Storage, chain_id: u64) -> Result<Vec<u64>, HeaderSyncError> {
    Ok(load(storage, &index_key(chain_id))?.unwrap_or_default())
}

/// The checkpoint with the greatest height not above `height`.
///
/// # Errors
/// Returns [`HeaderSyncError::NotFound`] if the chain has no checkpoint at or below `height`.
pub fn epoch_switch_info_at(
    storage: &dyn Storage,
    chain_id: u64,
    height: u64,
) -> Result<EpochSwitchInfo, HeaderSyncError> {
    let heights = epoch_heights(storage, chain_id)?;
    let idx = heights.partition_point(|h| *h <= height);
    let not_found = HeaderSyncError::NotFound {
        chain_id,
        what: "epoch switch",
    };
    if idx == 0 {
        return Err(not_found);
    }
    load(storage, &epoch_key(chain_id, heights[idx - 1]))?.ok_or(not_found)
}

/// The validator set from the latest checkpoint at or below `height`.
///
/// # Errors
/// Returns [`HeaderSyncError::NotFound`] if the chain is unknown or `height` precedes genesis.
pub fn active_validator_set(
    storage: &dyn Storage,
    chain_id: u64,
    height: u64,
) -> Result<ValidatorSet, HeaderSyncError> {
    epoch_switch_info_at(storage, chain_id, height).map(|info| info.validators)
}

/// The most recent checkpoint of a chain.
///
/// # Errors
/// Returns [`HeaderSyncError::NotFound`] if the chain was never initialized.
pub fn latest_epoch(storage: &dyn Storage, chain_id: u64) -> Result<EpochSwitchInfo, HeaderSyncError> {
    epoch_switch_info_at(storage, chain_id, u64::MAX)
}

/// Appends a checkpoint if it is strictly above the latest one.
///
/// Returns whether the checkpoint was recorded.
///
/// # Errors
/// Returns [`HeaderSyncError::NotFound`] if the chain was never initialized.
pub fn record_rotation(storage: &mut dyn Storage, info: &EpochSwitchInfo) -> Result<bool, HeaderSyncError> {
    let mut heights = epoch_heights(storage, info.chain_id)?;
    let Some(latest) = heights.last().copied() else {
        return Err(HeaderSyncError::NotFound {
            chain_id: info.chain_id,
            what: "epoch switch",
        });
    };

    if info.height <= latest {
        debug!(
            chain_id = info.chain_id,
            height = info.height,
            latest,
            "ignoring rotation at or below latest epoch switch"
        );
        return Ok(false);
    }

    heights.push(info.height);
    save(storage, &index_key(info.chain_id), &heights)?;
    save(storage, &epoch_key(info.chain_id, info.height), info)?;

    info!(
        chain_id = info.chain_id,
        height = info.height,
        validators = info.validators.len(),
        total_voting_power = info.validators.total_voting_power(),
        "validator set rotation recorded"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{storage::MemoryStorage, validator::Validator};

    fn epoch(chain_id: u64, height: u64, power: u64) -> EpochSwitchInfo {
        EpochSwitchInfo {
            chain_id,
            external_chain_id: "testing".to_string(),
            height,
            block_hash: vec![height as u8; 32],
            next_validators_hash: vec![power as u8; 32],
            validators: ValidatorSet::new(vec![Validator {
                address: vec![1; 20],
                pub_key: vec![1; 32],
                voting_power: power,
            }])
            .unwrap(),
        }
    }

    #[test]
    fn genesis_is_recorded_once() {
        let mut store = MemoryStorage::new();
        assert!(!is_initialized(&store, 5).unwrap());

        init_genesis(&mut store, &epoch(5, 10_000, 10)).unwrap();
        assert!(is_initialized(&store, 5).unwrap());
        assert_eq!(
            genesis(&store, 5).unwrap(),
            Some(GenesisMarker {
                height: 10_000,
                external_chain_id: "testing".to_string()
            })
        );

        assert_eq!(
            init_genesis(&mut store, &epoch(5, 20_000, 20)),
            Err(HeaderSyncError::GenesisAlreadyInitialized { chain_id: 5 })
        );
        assert_eq!(latest_epoch(&store, 5).unwrap(), epoch(5, 10_000, 10));
    }

    #[test]
    fn active_set_follows_checkpoints() {
        let mut store = MemoryStorage::new();
        init_genesis(&mut store, &epoch(5, 100, 10)).unwrap();
        assert!(record_rotation(&mut store, &epoch(5, 150, 20)).unwrap());
        assert!(record_rotation(&mut store, &epoch(5, 200, 30)).unwrap());

        let power_at = |h| {
            active_validator_set(&store, 5, h)
                .map(|set| set.total_voting_power())
                .ok()
        };
        assert_eq!(power_at(99), None);
        assert_eq!(power_at(100), Some(10));
        assert_eq!(power_at(149), Some(10));
        assert_eq!(power_at(150), Some(20));
        assert_eq!(power_at(199), Some(20));
        assert_eq!(power_at(u64::MAX), Some(30));

        assert_eq!(epoch_heights(&store, 5).unwrap(), vec![100, 150, 200]);
        assert_eq!(latest_epoch(&store, 5).unwrap().height, 200);
    }

    #[test]
    fn rotation_must_be_above_latest() {
        let mut store = MemoryStorage::new();
        init_genesis(&mut store, &epoch(5, 100, 10)).unwrap();
        assert!(record_rotation(&mut store, &epoch(5, 150, 20)).unwrap());

        assert!(!record_rotation(&mut store, &epoch(5, 150, 30)).unwrap());
        assert!(!record_rotation(&mut store, &epoch(5, 120, 30)).unwrap());
        assert_eq!(epoch_heights(&store, 5).unwrap(), vec![100, 150]);
        assert_eq!(latest_epoch(&store, 5).unwrap(), epoch(5, 150, 20));
    }

    #[test]
    fn chains_are_isolated() {
        let mut store = MemoryStorage::new();
        init_genesis(&mut store, &epoch(5, 100, 10)).unwrap();

        assert_eq!(
            latest_epoch(&store, 6),
            Err(HeaderSyncError::NotFound {
                chain_id: 6,
                what: "epoch switch"
            })
        );
        assert!(record_rotation(&mut store, &epoch(6, 150, 20)).is_err());
        init_genesis(&mut store, &epoch(6, 7, 20)).unwrap();
        assert_eq!(latest_epoch(&store, 5).unwrap().height, 100);
        assert_eq!(latest_epoch(&store, 6).unwrap().height, 7);
    }
}
