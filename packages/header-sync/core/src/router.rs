//! Defines the [`HeaderSyncRouter`] that dispatches requests to the handler
//! registered for a relay chain id.

use std::collections::HashMap;

use tracing::{info, instrument};

use crate::{
    epoch::EpochSwitchInfo,
    error::HeaderSyncError,
    handler::{HeaderSync, SyncReport},
    params::{SyncBlockHeaderParam, SyncGenesisHeaderParam},
    storage::Storage,
    Address,
};

/// Routes header sync requests by relay chain id.
#[derive(Default)]
#[allow(clippy::module_name_repetitions)]
pub struct HeaderSyncRouter {
    /// Mapping of relay chain id to the handler of its chain family.
    handlers: HashMap<u64, Box<dyn HeaderSync>>,
}

impl HeaderSyncRouter {
    /// Create a new, empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler serving `chain_id`.
    /// # Panics
    /// Panics if a handler is already registered for `chain_id`.
    #[instrument(skip(self, handler), fields(family = %handler.family()))]
    pub fn add_chain<T: HeaderSync + 'static>(&mut self, chain_id: u64, handler: T) -> &mut Self {
        assert!(
            !self.handlers.contains_key(&chain_id),
            "Header sync handler already added for chain {chain_id}"
        );

        self.handlers.insert(chain_id, Box::new(handler));
        info!("Header sync handler added");
        self
    }

    /// Relay chain ids with a registered handler, ascending.
    #[must_use]
    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids = self.handlers.keys().copied().collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    /// The handler registered for `chain_id`.
    ///
    /// # Errors
    /// Returns [`HeaderSyncError::UnknownChain`] if none is registered.
    pub fn handler(&self, chain_id: u64) -> Result<&dyn HeaderSync, HeaderSyncError> {
        self.handlers
            .get(&chain_id)
            .map(|v| &**v)
            .ok_or(HeaderSyncError::UnknownChain { chain_id })
    }

    /// Decodes a borsh encoded [`SyncGenesisHeaderParam`] and bootstraps the chain.
    ///
    /// # Errors
    /// Returns a decoding error, [`HeaderSyncError::UnknownChain`] or the handler's error.
    #[instrument(skip_all, err(Display))]
    pub fn sync_genesis_header(
        &self,
        storage: &mut dyn Storage,
        signers: &[Address],
        param: &[u8],
    ) -> Result<EpochSwitchInfo, HeaderSyncError> {
        let param = SyncGenesisHeaderParam::decode(param)?;
        self.handler(param.chain_id)?
            .sync_genesis_header(storage, signers, &param)
    }

    /// Decodes a borsh encoded [`SyncBlockHeaderParam`] and extends the chain.
    ///
    /// # Errors
    /// Returns a decoding error, [`HeaderSyncError::UnknownChain`] or the handler's error.
    #[instrument(skip_all, err(Display))]
    pub fn sync_block_header(
        &self,
        storage: &mut dyn Storage,
        param: &[u8],
    ) -> Result<SyncReport, HeaderSyncError> {
        let param = SyncBlockHeaderParam::decode(param)?;
        self.handler(param.chain_id)?.sync_block_header(storage, &param)
    }

    /// The latest epoch switch of `chain_id`.
    ///
    /// # Errors
    /// Returns [`HeaderSyncError::UnknownChain`] or [`HeaderSyncError::NotFound`].
    pub fn get_epoch_switch_info(
        &self,
        storage: &dyn Storage,
        chain_id: u64,
    ) -> Result<EpochSwitchInfo, HeaderSyncError> {
        self.handler(chain_id)?.epoch_switch_info(storage, chain_id)
    }
}
