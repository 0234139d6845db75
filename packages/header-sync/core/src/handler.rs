//! The sync orchestrator: genesis bootstrap and batch extension on top of the
//! epoch ledger and header store, generic over the external chain family.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::{ConfigError, SyncConfig},
    ensure,
    epoch::{self, EpochSwitchInfo},
    error::{ConsensusMismatch, DeserializationError, HeaderSyncError, QuorumError},
    header_store::{self, StoreOutcome, StoredHeader},
    params::{SyncBlockHeaderParam, SyncGenesisHeaderParam},
    quorum::VotingPowerTally,
    storage::{transact, Storage},
    validator::{BlockTime, ValidatorSet},
    Address,
};

/// A decoded header of an external chain, with its commit.
pub trait SyncHeader {
    /// Header height.
    fn height(&self) -> u64;
    /// Header hash, the value the commit signs.
    fn hash(&self) -> &[u8];
    /// Hash of the parent header.
    fn parent_hash(&self) -> &[u8];
    /// Chain id the external chain uses in its own headers.
    fn external_chain_id(&self) -> &str;
    /// Header time.
    fn time(&self) -> BlockTime;
    /// Application state hash.
    fn app_hash(&self) -> &[u8];
    /// Hash of the validator set that signed this header.
    fn validators_hash(&self) -> &[u8];
    /// Hash of the validator set that signs the next header.
    fn next_validators_hash(&self) -> &[u8];
    /// The validator set embedded alongside the header, if any.
    fn validators(&self) -> Option<&ValidatorSet>;
    /// The next validator set embedded alongside the header, if any.
    fn next_validators(&self) -> Option<&ValidatorSet>;

    /// The metadata persisted in the header store.
    fn to_stored(&self) -> StoredHeader {
        StoredHeader {
            height: self.height(),
            hash: self.hash().to_vec(),
            parent_hash: self.parent_hash().to_vec(),
            time: self.time(),
            app_hash: self.app_hash().to_vec(),
            validators_hash: self.validators_hash().to_vec(),
            next_validators_hash: self.next_validators_hash().to_vec(),
        }
    }
}

/// The capabilities one external chain family provides to the orchestrator.
pub trait ChainFamily {
    /// The decoded header type.
    type Header: SyncHeader;

    /// Short name of the family, used in logs.
    fn name(&self) -> &'static str;

    /// Decodes a header with its commit from the family's wire format.
    ///
    /// # Errors
    /// Returns a [`DeserializationError`] naming the stage that failed.
    fn decode_header(&self, raw: &[u8]) -> Result<Self::Header, DeserializationError>;

    /// Hashes a validator set the way headers of this family commit to it.
    fn validator_set_hash(&self, validators: &ValidatorSet) -> Vec<u8>;

    /// Verifies that `validators` signed `header` with a BFT quorum.
    ///
    /// # Errors
    /// Returns a [`QuorumError`] if the commit does not reference the header or
    /// lacks voting power.
    fn verify_commit(
        &self,
        header: &Self::Header,
        validators: &ValidatorSet,
    ) -> Result<VotingPowerTally, QuorumError>;
}

/// Object-safe entry points of a configured handler, used by the router.
pub trait HeaderSync {
    /// Name of the chain family served by this handler.
    fn family(&self) -> &'static str;

    /// Bootstraps a chain from its genesis header.
    ///
    /// `signers` are the relay accounts the host verified as signers of the request.
    ///
    /// # Errors
    /// Fails if the chain is already initialized, the payload is malformed, the
    /// signers do not satisfy the genesis policy or the embedded commit is invalid.
    fn sync_genesis_header(
        &self,
        storage: &mut dyn Storage,
        signers: &[Address],
        param: &SyncGenesisHeaderParam,
    ) -> Result<EpochSwitchInfo, HeaderSyncError>;

    /// Extends a chain with a batch of headers. All or nothing.
    ///
    /// # Errors
    /// Returns the first error encountered; no state is written in that case.
    fn sync_block_header(
        &self,
        storage: &mut dyn Storage,
        param: &SyncBlockHeaderParam,
    ) -> Result<SyncReport, HeaderSyncError>;

    /// The latest epoch switch of a chain.
    ///
    /// # Errors
    /// Returns [`HeaderSyncError::NotFound`] if the chain was never initialized.
    fn epoch_switch_info(
        &self,
        storage: &dyn Storage,
        chain_id: u64,
    ) -> Result<EpochSwitchInfo, HeaderSyncError> {
        epoch::latest_epoch(storage, chain_id)
    }
}

/// Summary of a successful batch extension.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Relay chain id of the external chain
    pub chain_id: u64,
    /// Heights verified and stored by this call
    pub applied: Vec<u64>,
    /// Heights that were already stored and left untouched
    pub skipped: Vec<u64>,
    /// Heights at which a validator set rotation was recorded
    pub rotations: Vec<u64>,
    /// Current height after the call
    pub current_height: u64,
}

/// The sync orchestrator for one chain family.
#[derive(Clone, Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct HeaderSyncHandler<F> {
    family: F,
    config: SyncConfig,
}

impl<F: ChainFamily> HeaderSyncHandler<F> {
    /// Creates a handler for `family` with the given settings.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the settings are inconsistent, see
    /// [`SyncConfig::validate`].
    pub fn new(family: F, config: SyncConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { family, config })
    }

    /// The chain family.
    pub const fn chain_family(&self) -> &F {
        &self.family
    }

    /// The settings of this handler.
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Decodes the batch, orders it by height and collapses identical duplicates.
    fn prepare_batch(
        &self,
        chain_id: u64,
        raw_headers: &[Vec<u8>],
    ) -> Result<Vec<F::Header>, HeaderSyncError> {
        ensure!(
            !raw_headers.is_empty(),
            HeaderSyncError::EmptyBatch { chain_id }
        );
        ensure!(
            raw_headers.len() <= self.config.max_batch_size,
            HeaderSyncError::BatchTooLarge {
                chain_id,
                size: raw_headers.len(),
                max: self.config.max_batch_size,
            }
        );

        let mut headers = raw_headers
            .iter()
            .map(|raw| self.family.decode_header(raw))
            .collect::<Result<Vec<_>, _>>()?;
        headers.sort_by_key(|h| h.height());

        let mut batch: Vec<F::Header> = Vec::with_capacity(headers.len());
        for header in headers {
            if let Some(prev) = batch.last() {
                if prev.height() == header.height() {
                    ensure!(
                        prev.hash() == header.hash(),
                        HeaderSyncError::ConflictingHeader {
                            chain_id,
                            height: header.height(),
                            stored: prev.hash().to_vec(),
                            submitted: header.hash().to_vec(),
                        }
                    );
                    continue;
                }
            }
            batch.push(header);
        }
        Ok(batch)
    }

    /// Resolves the validator set announced by `header` for the following heights.
    fn next_validator_set(
        &self,
        chain_id: u64,
        header: &F::Header,
    ) -> Result<ValidatorSet, HeaderSyncError> {
        let mismatch = |kind| HeaderSyncError::ConsensusParamMismatch {
            chain_id,
            height: header.height(),
            mismatch: kind,
        };

        let next = header
            .next_validators()
            .ok_or_else(|| mismatch(ConsensusMismatch::MissingNextValidatorSet))?;
        let next_hash = self.family.validator_set_hash(next);
        ensure!(
            next_hash == header.next_validators_hash(),
            mismatch(ConsensusMismatch::NextValidatorsHash {
                expected: header.next_validators_hash().to_vec(),
                actual: next_hash,
            })
        );
        Ok(next.clone())
    }

    /// Verifies one header on top of the current state and writes it.
    fn apply_header(
        &self,
        storage: &mut dyn Storage,
        chain_id: u64,
        genesis: &epoch::GenesisMarker,
        header: &F::Header,
        report: &mut SyncReport,
    ) -> Result<(), HeaderSyncError> {
        let height = header.height();
        let mismatch = |kind| HeaderSyncError::ConsensusParamMismatch {
            chain_id,
            height,
            mismatch: kind,
        };

        if let Some(stored) = header_store::get_header(storage, chain_id, height)? {
            ensure!(
                stored.hash == header.hash(),
                HeaderSyncError::ConflictingHeader {
                    chain_id,
                    height,
                    stored: stored.hash,
                    submitted: header.hash().to_vec(),
                }
            );
            debug!(chain_id, height, "header already synced");
            report.skipped.push(height);
            return Ok(());
        }

        ensure!(
            header.external_chain_id() == genesis.external_chain_id,
            mismatch(ConsensusMismatch::ChainId {
                expected: genesis.external_chain_id.clone(),
                actual: header.external_chain_id().to_string(),
            })
        );

        let parent = header_store::get_parent(
            storage,
            chain_id,
            height,
            header.parent_hash(),
            genesis.height,
            self.config.parent_linkage,
        )?;
        ensure!(
            header.time() > parent.time,
            mismatch(ConsensusMismatch::NonIncreasingTime {
                parent_time: parent.time,
                time: header.time(),
            })
        );

        let trusted = epoch::epoch_switch_info_at(storage, chain_id, parent.height)?;
        ensure!(
            trusted.next_validators_hash == header.validators_hash(),
            mismatch(ConsensusMismatch::ValidatorsHash {
                expected: trusted.next_validators_hash.clone(),
                actual: header.validators_hash().to_vec(),
            })
        );

        let tally = self
            .family
            .verify_commit(header, &trusted.validators)
            .map_err(|source| HeaderSyncError::Quorum {
                chain_id,
                height,
                source,
            })?;
        info!(
            chain_id,
            height,
            signed_power = tally.signed,
            total_power = tally.total,
            "header verified"
        );

        if header.next_validators_hash() != trusted.next_validators_hash {
            let validators = self.next_validator_set(chain_id, header)?;
            let info = EpochSwitchInfo {
                chain_id,
                external_chain_id: genesis.external_chain_id.clone(),
                height,
                block_hash: header.hash().to_vec(),
                next_validators_hash: header.next_validators_hash().to_vec(),
                validators,
            };
            if !epoch::record_rotation(storage, &info)? {
                let latest = epoch::latest_epoch(storage, chain_id)?.height;
                warn!(chain_id, height, latest, "rotation below latest epoch switch");
                return Err(mismatch(ConsensusMismatch::StaleRotation { latest }));
            }
            report.rotations.push(height);
        }

        match header_store::store_header(storage, chain_id, &header.to_stored())? {
            StoreOutcome::Inserted => report.applied.push(height),
            StoreOutcome::Unchanged => report.skipped.push(height),
        }
        Ok(())
    }
}

impl<F: ChainFamily> HeaderSync for HeaderSyncHandler<F> {
    fn family(&self) -> &'static str {
        self.family.name()
    }

    #[instrument(skip_all, fields(family = self.family.name(), chain_id = param.chain_id))]
    fn sync_genesis_header(
        &self,
        storage: &mut dyn Storage,
        signers: &[Address],
        param: &SyncGenesisHeaderParam,
    ) -> Result<EpochSwitchInfo, HeaderSyncError> {
        let chain_id = param.chain_id;
        ensure!(
            !epoch::is_initialized(storage, chain_id)?,
            HeaderSyncError::GenesisAlreadyInitialized { chain_id }
        );

        let header = self.family.decode_header(&param.genesis_header)?;
        let height = header.height();
        let mismatch = |kind| HeaderSyncError::ConsensusParamMismatch {
            chain_id,
            height,
            mismatch: kind,
        };

        self.config.genesis_policy.authorize(signers)?;

        let validators = header
            .validators()
            .ok_or_else(|| mismatch(ConsensusMismatch::MissingValidatorSet))?;
        let validators_hash = self.family.validator_set_hash(validators);
        ensure!(
            validators_hash == header.validators_hash(),
            mismatch(ConsensusMismatch::ValidatorsHash {
                expected: validators_hash,
                actual: header.validators_hash().to_vec(),
            })
        );

        let tally = self
            .family
            .verify_commit(&header, validators)
            .map_err(|source| HeaderSyncError::Quorum {
                chain_id,
                height,
                source,
            })?;

        let next_validators = if header.next_validators_hash() == header.validators_hash() {
            validators.clone()
        } else {
            self.next_validator_set(chain_id, &header)?
        };

        let info = EpochSwitchInfo {
            chain_id,
            external_chain_id: header.external_chain_id().to_string(),
            height,
            block_hash: header.hash().to_vec(),
            next_validators_hash: header.next_validators_hash().to_vec(),
            validators: next_validators,
        };

        transact(storage, |cache| {
            epoch::init_genesis(cache, &info)?;
            header_store::store_header(cache, chain_id, &header.to_stored())?;
            Ok::<_, HeaderSyncError>(())
        })?;

        info!(
            height,
            external_chain_id = %info.external_chain_id,
            signed_power = tally.signed,
            total_power = tally.total,
            "genesis header synced"
        );
        Ok(info)
    }

    #[instrument(
        skip_all,
        fields(
            family = self.family.name(),
            chain_id = param.chain_id,
            submitter = %hex::encode(param.address),
            batch = param.headers.len()
        )
    )]
    fn sync_block_header(
        &self,
        storage: &mut dyn Storage,
        param: &SyncBlockHeaderParam,
    ) -> Result<SyncReport, HeaderSyncError> {
        let chain_id = param.chain_id;
        let genesis = epoch::genesis(storage, chain_id)?
            .ok_or(HeaderSyncError::NotInitialized { chain_id })?;

        let batch = self.prepare_batch(chain_id, &param.headers)?;

        let report = transact(storage, |cache| {
            let mut report = SyncReport {
                chain_id,
                ..SyncReport::default()
            };
            for header in &batch {
                self.apply_header(cache, chain_id, &genesis, header, &mut report)?;
            }
            report.current_height = header_store::current_height(cache, chain_id)?;
            Ok::<_, HeaderSyncError>(report)
        })?;

        info!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            rotations = report.rotations.len(),
            current_height = report.current_height,
            "header batch synced"
        );
        Ok(report)
    }
}
