//! Wires the router, the configured chains and the state file together.

use anyhow::Context;
use header_sync_core::{
    epoch::{self, EpochSwitchInfo},
    header_store,
    params::{SyncBlockHeaderParam, SyncGenesisHeaderParam},
    Address, HeaderSyncError, HeaderSyncRouter, StoredHeader, SyncReport,
};
use header_sync_cosmos::{CosmosChain, CosmosHeaderSync};
use serde::Serialize;
use tracing::info;

use crate::{
    config::{AppConfig, Family},
    state::StateFile,
};

/// Snapshot of one chain's synchronisation state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainStatus {
    /// Relay chain id
    pub chain_id: u64,
    /// Chain family serving the chain
    pub family: &'static str,
    /// Height of the genesis header, if bootstrapped
    pub genesis_height: Option<u64>,
    /// Chain id used in the external chain's headers, if bootstrapped
    pub external_chain_id: Option<String>,
    /// The highest stored header, if bootstrapped
    pub current: Option<StoredHeader>,
    /// Heights of all epoch switches, ascending
    pub epoch_heights: Vec<u64>,
}

/// The header synchroniser with its configuration and state file.
pub struct App {
    router: HeaderSyncRouter,
    state: StateFile,
}

impl App {
    /// Registers a handler for every configured chain.
    ///
    /// # Errors
    /// Fails if the sync settings of a chain are inconsistent.
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let mut router = HeaderSyncRouter::new();
        for chain in &config.chains {
            match chain.family {
                Family::Cosmos => {
                    let handler = CosmosHeaderSync::new(CosmosChain::new(), chain.sync.clone())
                        .with_context(|| format!("chain {}", chain.chain_id))?;
                    router.add_chain(chain.chain_id, handler);
                }
            }
        }
        info!(chains = ?router.chain_ids(), "header sync router built");

        Ok(Self {
            router,
            state: StateFile::new(&config.state_path),
        })
    }

    /// The router serving the configured chains.
    #[must_use]
    pub const fn router(&self) -> &HeaderSyncRouter {
        &self.router
    }

    /// Bootstraps `chain_id` from its genesis header.
    ///
    /// # Errors
    /// Fails if the state cannot be loaded or saved, or if the sync is rejected.
    pub fn genesis(
        &self,
        chain_id: u64,
        genesis_header: Vec<u8>,
        signers: &[Address],
    ) -> anyhow::Result<EpochSwitchInfo> {
        let param = SyncGenesisHeaderParam {
            chain_id,
            genesis_header,
        }
        .encode()?;

        let mut storage = self.state.load()?;
        let info = self
            .router
            .sync_genesis_header(&mut storage, signers, &param)
            .with_context(|| format!("genesis sync of chain {chain_id} rejected"))?;
        self.state.save(&storage)?;
        Ok(info)
    }

    /// Extends `chain_id` with a batch of headers submitted by `submitter`.
    ///
    /// # Errors
    /// Fails if the state cannot be loaded or saved, or if the batch is rejected.
    /// The state file is untouched on rejection.
    pub fn sync(
        &self,
        chain_id: u64,
        submitter: Address,
        headers: Vec<Vec<u8>>,
    ) -> anyhow::Result<SyncReport> {
        let param = SyncBlockHeaderParam {
            chain_id,
            address: submitter,
            headers,
        }
        .encode()?;

        let mut storage = self.state.load()?;
        let report = self
            .router
            .sync_block_header(&mut storage, &param)
            .with_context(|| format!("header sync of chain {chain_id} rejected"))?;
        self.state.save(&storage)?;
        Ok(report)
    }

    /// The epoch switch authoritative at `height`, or the latest one.
    ///
    /// # Errors
    /// Fails if the chain is unknown, not bootstrapped or `height` is below genesis.
    pub fn epoch(&self, chain_id: u64, height: Option<u64>) -> anyhow::Result<EpochSwitchInfo> {
        let storage = self.state.load()?;
        let info = match height {
            None => self.router.get_epoch_switch_info(&storage, chain_id)?,
            Some(height) => {
                self.router.handler(chain_id)?;
                epoch::epoch_switch_info_at(&storage, chain_id, height)?
            }
        };
        Ok(info)
    }

    /// The synchronisation state of `chain_id`.
    ///
    /// # Errors
    /// Fails if the chain is unknown or the state is unreadable.
    pub fn status(&self, chain_id: u64) -> anyhow::Result<ChainStatus> {
        let family = self.router.handler(chain_id)?.family();
        let storage = self.state.load()?;

        let Some(genesis) = epoch::genesis(&storage, chain_id)? else {
            return Ok(ChainStatus {
                chain_id,
                family,
                genesis_height: None,
                external_chain_id: None,
                current: None,
                epoch_heights: Vec::new(),
            });
        };

        let height = header_store::current_height(&storage, chain_id)?;
        let current = header_store::get_header(&storage, chain_id, height)?.ok_or(
            HeaderSyncError::NotFound {
                chain_id,
                what: "current header",
            },
        )?;

        Ok(ChainStatus {
            chain_id,
            family,
            genesis_height: Some(genesis.height),
            external_chain_id: Some(genesis.external_chain_id),
            current: Some(current),
            epoch_heights: epoch::epoch_heights(&storage, chain_id)?,
        })
    }
}
