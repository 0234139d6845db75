//! Error types for header synchronisation.
//!
//! Every failure aborts only the current call. Variants carry the chain id, the
//! height and the offending hashes so callers never need to inspect message text.

use thiserror::Error;

use crate::validator::BlockTime;

/// Top level error returned by every header sync operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub enum HeaderSyncError {
    /// A parameter, header, commit or validator set could not be decoded.
    #[error("deserialization failed: {0}")]
    Deserialization(#[from] DeserializationError),

    /// Genesis was requested for a chain that is already bootstrapped.
    #[error("genesis header of chain {chain_id} is already initialized")]
    GenesisAlreadyInitialized {
        /// Relay chain id of the external chain
        chain_id: u64,
    },

    /// Genesis submitters do not satisfy the configured trust policy.
    #[error("genesis not authorized: {approved} of {required} required authorities signed")]
    GenesisUnauthorized {
        /// Number of distinct configured authorities among the signers
        approved: usize,
        /// Minimum number of authorities required
        required: usize,
    },

    /// The chain has never been bootstrapped with a genesis header.
    #[error("chain {chain_id} is not initialized")]
    NotInitialized {
        /// Relay chain id of the external chain
        chain_id: u64,
    },

    /// Parent linkage of a header cannot be established from stored state.
    #[error("orphan header at height {height} on chain {chain_id}: {reason}")]
    Orphan {
        /// Relay chain id of the external chain
        chain_id: u64,
        /// Height of the rejected header
        height: u64,
        /// Why no parent could be resolved
        reason: OrphanReason,
    },

    /// A header fails a chain sanity rule before any signature is checked.
    #[error("consensus parameter mismatch at height {height} on chain {chain_id}: {mismatch}")]
    ConsensusParamMismatch {
        /// Relay chain id of the external chain
        chain_id: u64,
        /// Height of the rejected header
        height: u64,
        /// The rule that was violated
        mismatch: ConsensusMismatch,
    },

    /// The commit of a header fails BFT verification.
    #[error("commit verification failed at height {height} on chain {chain_id}: {source}")]
    Quorum {
        /// Relay chain id of the external chain
        chain_id: u64,
        /// Height of the rejected header
        height: u64,
        /// The quorum failure
        #[source]
        source: QuorumError,
    },

    /// A different header is already stored at this height.
    #[error(
        "conflicting header at height {height} on chain {chain_id}: stored {}, submitted {}",
        hex::encode(.stored),
        hex::encode(.submitted)
    )]
    ConflictingHeader {
        /// Relay chain id of the external chain
        chain_id: u64,
        /// Height of both headers
        height: u64,
        /// Hash of the header already in the store
        stored: Vec<u8>,
        /// Hash of the submitted header
        submitted: Vec<u8>,
    },

    /// A queried entry does not exist.
    #[error("{what} not found for chain {chain_id}")]
    NotFound {
        /// Relay chain id of the external chain
        chain_id: u64,
        /// The kind of entry that was looked up
        what: &'static str,
    },

    /// No handler is registered for the relay chain id.
    #[error("no header sync handler registered for chain {chain_id}")]
    UnknownChain {
        /// Relay chain id of the request
        chain_id: u64,
    },

    /// A block header batch contains no headers.
    #[error("header batch for chain {chain_id} is empty")]
    EmptyBatch {
        /// Relay chain id of the request
        chain_id: u64,
    },

    /// A block header batch exceeds the configured size limit.
    #[error("header batch of {size} headers for chain {chain_id} exceeds the limit of {max}")]
    BatchTooLarge {
        /// Relay chain id of the request
        chain_id: u64,
        /// Number of submitted headers
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// A validator set violates its invariants.
    #[error("invalid validator set: {0}")]
    InvalidValidatorSet(#[from] ValidatorSetError),

    /// A persisted value could not be encoded or decoded.
    #[error("corrupted state at key {key}: {reason}")]
    CorruptedState {
        /// Storage key of the value
        key: String,
        /// Underlying codec error
        reason: String,
    },
}

/// A decoding failure, naming the stage at which it happened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage}: {reason}")]
pub struct DeserializationError {
    /// The structure or field being decoded
    pub stage: &'static str,
    /// What was wrong with it
    pub reason: String,
}

impl DeserializationError {
    /// Creates a new decoding error for the given stage.
    #[must_use]
    pub fn new(stage: &'static str, reason: impl ToString) -> Self {
        Self {
            stage,
            reason: reason.to_string(),
        }
    }
}

/// Why a header has no usable parent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrphanReason {
    /// The header is at or below the genesis height.
    #[error("height is not above genesis height {genesis_height}")]
    BelowGenesis {
        /// Height of the genesis header
        genesis_height: u64,
    },
    /// No header is stored at the required parent height.
    #[error("no header stored at parent height {parent_height}")]
    MissingParent {
        /// Height at which the parent was expected
        parent_height: u64,
    },
    /// The stored parent hash differs from the declared one.
    #[error(
        "parent hash mismatch: stored {}, declared {}",
        hex::encode(.stored),
        hex::encode(.declared)
    )]
    ParentHashMismatch {
        /// Hash of the header stored at the parent height
        stored: Vec<u8>,
        /// Parent hash declared by the header
        declared: Vec<u8>,
    },
}

/// Chain sanity rules checked before the commit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusMismatch {
    /// The header belongs to another external chain.
    #[error("chain id {actual} does not match genesis chain id {expected}")]
    ChainId {
        /// Chain id recorded at genesis
        expected: String,
        /// Chain id of the header
        actual: String,
    },
    /// The header time does not advance past its parent.
    #[error("header time {time} is not after parent time {parent_time}")]
    NonIncreasingTime {
        /// Time of the stored parent
        parent_time: BlockTime,
        /// Time of the header
        time: BlockTime,
    },
    /// The header's validator set hash is not the trusted set.
    #[error(
        "validators hash mismatch: trusted {}, header {}",
        hex::encode(.expected),
        hex::encode(.actual)
    )]
    ValidatorsHash {
        /// Hash of the trusted validator set
        expected: Vec<u8>,
        /// Hash declared by the header
        actual: Vec<u8>,
    },
    /// The embedded next validator set does not hash to the declared value.
    #[error(
        "next validators hash mismatch: declared {}, embedded set {}",
        hex::encode(.expected),
        hex::encode(.actual)
    )]
    NextValidatorsHash {
        /// Hash declared by the header
        expected: Vec<u8>,
        /// Hash of the embedded next validator set
        actual: Vec<u8>,
    },
    /// A header announcing a rotation carries no next validator set.
    #[error("header announces a new validator set but does not embed it")]
    MissingNextValidatorSet,
    /// A genesis header carries no validator set.
    #[error("genesis header does not embed its validator set")]
    MissingValidatorSet,
    /// A rotation was announced below the latest recorded epoch switch.
    #[error("validator set rotation below latest epoch switch at height {latest}")]
    StaleRotation {
        /// Height of the latest epoch switch
        latest: u64,
    },
}

/// BFT commit verification failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuorumError {
    /// Signers hold two thirds or less of the total voting power.
    #[error("insufficient voting power: signed {signed} of total {total}")]
    InsufficientVotingPower {
        /// Voting power of validators with a valid signature
        signed: u64,
        /// Total voting power of the validator set
        total: u64,
    },
    /// The commit signs a different block than the header.
    #[error(
        "commit signs block {}, header hash is {}",
        hex::encode(.commit_hash),
        hex::encode(.header_hash)
    )]
    CommitHeaderMismatch {
        /// Hash of the header
        header_hash: Vec<u8>,
        /// Block hash referenced by the commit
        commit_hash: Vec<u8>,
    },
    /// The commit is for a different height than the header.
    #[error("commit height {commit_height} does not match header height {header_height}")]
    CommitHeightMismatch {
        /// Height of the header
        header_height: u64,
        /// Height declared by the commit
        commit_height: u64,
    },
}

/// Validator set invariant violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidatorSetError {
    /// The set has no members.
    #[error("validator set is empty")]
    Empty,
    /// The same identity appears twice.
    #[error("duplicate validator {}", hex::encode(.0))]
    DuplicateValidator(Vec<u8>),
    /// The members hold no voting power.
    #[error("total voting power is zero")]
    ZeroVotingPower,
    /// The total voting power exceeds the supported maximum.
    #[error("total voting power exceeds {max}")]
    VotingPowerOverflow {
        /// Maximum supported total voting power
        max: u64,
    },
}
