//! Decoding and hashing of Tendermint headers and validator sets.

use header_sync_core::{
    error::DeserializationError,
    validator::{BlockTime, Validator, ValidatorSet},
    SyncHeader,
};
use prost::Message;
use sha2::{Digest, Sha256};
use tendermint::{
    account,
    block::{self, Height, Round},
    validator, vote, Hash, PublicKey,
};
use tendermint_proto::{
    google::protobuf::Timestamp,
    v0_38::types::{Commit as RawCommit, CommitSig as RawCommitSig, Validator as RawValidator},
};

use crate::proto;

/// Length of a validator address.
pub const ADDRESS_LEN: usize = 20;

/// The parts of a commit that every precommit signs, with the signatures as
/// they were received.
///
/// Signatures stay in wire form so a malformed entry only disqualifies itself
/// when the commit is verified.
#[derive(Clone, Debug, PartialEq)]
pub struct CosmosCommit {
    /// Height of the committed block
    pub height: Height,
    /// Consensus round of the commit
    pub round: Round,
    /// Identifier of the committed block
    pub block_id: block::Id,
    /// One entry per validator, in validator set order
    pub signatures: Vec<RawCommitSig>,
}

impl TryFrom<RawCommit> for CosmosCommit {
    type Error = DeserializationError;

    fn try_from(raw: RawCommit) -> Result<Self, Self::Error> {
        const STAGE: &str = "commit";

        let height = Height::try_from(raw.height)
            .ok()
            .filter(|h| h.value() > 0)
            .ok_or_else(|| DeserializationError::new(STAGE, format!("invalid height {}", raw.height)))?;
        let round = Round::try_from(raw.round)
            .map_err(|_| DeserializationError::new(STAGE, format!("invalid round {}", raw.round)))?;

        let block_id = raw
            .block_id
            .ok_or_else(|| DeserializationError::new(STAGE, "missing block id"))?;
        let block_id =
            block::Id::try_from(block_id).map_err(|e| DeserializationError::new(STAGE, e))?;
        if !matches!(block_id.hash, Hash::Sha256(_)) {
            return Err(DeserializationError::new(STAGE, "block id without hash"));
        }

        if raw.signatures.is_empty() {
            return Err(DeserializationError::new(STAGE, "no signatures"));
        }

        Ok(Self {
            height,
            round,
            block_id,
            signatures: raw.signatures,
        })
    }
}

/// A decoded and structurally validated header with its commit.
#[derive(Clone, Debug, PartialEq)]
pub struct CosmosHeader {
    header: block::Header,
    commit: CosmosCommit,
    validators: Option<ValidatorSet>,
    next_validators: Option<ValidatorSet>,
    hash: Hash,
    time: BlockTime,
}

impl CosmosHeader {
    /// Decodes a protobuf encoded [`proto::CosmosHeader`].
    ///
    /// # Errors
    /// Returns a [`DeserializationError`] naming the failing stage if the bytes
    /// are not a well-formed header payload.
    pub fn decode(raw: &[u8]) -> Result<Self, DeserializationError> {
        let payload = proto::CosmosHeader::decode(raw)
            .map_err(|e| DeserializationError::new("cosmos header", e))?;

        let header = payload
            .header
            .ok_or_else(|| DeserializationError::new("header", "missing"))?;
        let time = header
            .time
            .ok_or_else(|| DeserializationError::new("header", "missing time"))
            .and_then(|time| block_time("header", time))?;
        let header =
            block::Header::try_from(header).map_err(|e| DeserializationError::new("header", e))?;
        validate_header(&header)?;

        let commit = payload
            .commit
            .ok_or_else(|| DeserializationError::new("commit", "missing"))?;
        let commit = CosmosCommit::try_from(commit)?;

        let validators = decode_validator_set("validator set", payload.valsets)?;
        let next_validators = decode_validator_set("next validator set", payload.next_valsets)?;

        Ok(Self {
            hash: header.hash(),
            header,
            commit,
            validators,
            next_validators,
            time,
        })
    }

    /// The block header.
    #[must_use]
    pub const fn header(&self) -> &block::Header {
        &self.header
    }

    /// The commit for this header.
    #[must_use]
    pub const fn commit(&self) -> &CosmosCommit {
        &self.commit
    }
}

impl SyncHeader for CosmosHeader {
    fn height(&self) -> u64 {
        self.header.height.value()
    }

    fn hash(&self) -> &[u8] {
        self.hash.as_bytes()
    }

    fn parent_hash(&self) -> &[u8] {
        self.header
            .last_block_id
            .as_ref()
            .map(|id| id.hash.as_bytes())
            .unwrap_or_default()
    }

    fn external_chain_id(&self) -> &str {
        self.header.chain_id.as_str()
    }

    fn time(&self) -> BlockTime {
        self.time
    }

    fn app_hash(&self) -> &[u8] {
        self.header.app_hash.as_bytes()
    }

    fn validators_hash(&self) -> &[u8] {
        self.header.validators_hash.as_bytes()
    }

    fn next_validators_hash(&self) -> &[u8] {
        self.header.next_validators_hash.as_bytes()
    }

    fn validators(&self) -> Option<&ValidatorSet> {
        self.validators.as_ref()
    }

    fn next_validators(&self) -> Option<&ValidatorSet> {
        self.next_validators.as_ref()
    }
}

/// Tendermint validator set hash of `validators`.
///
/// # Errors
/// Returns a [`DeserializationError`] if a validator does not carry a 20 byte
/// address, an ed25519 key and a representable voting power.
pub fn validator_set_hash(validators: &ValidatorSet) -> Result<Hash, DeserializationError> {
    const STAGE: &str = "validator set";

    let validators = validators
        .validators()
        .iter()
        .map(|v| {
            Ok(validator::Info {
                address: account::Id::try_from(v.address.clone())
                    .map_err(|e| DeserializationError::new(STAGE, e))?,
                pub_key: PublicKey::from_raw_ed25519(&v.pub_key)
                    .ok_or_else(|| DeserializationError::new(STAGE, "invalid ed25519 key"))?,
                power: vote::Power::try_from(v.voting_power)
                    .map_err(|e| DeserializationError::new(STAGE, e))?,
                name: None,
                proposer_priority: validator::ProposerPriority::from(0),
            })
        })
        .collect::<Result<Vec<_>, DeserializationError>>()?;

    Ok(validator::Set::without_proposer(validators).hash())
}

/// Address of an ed25519 validator: the first 20 bytes of the sha256 of its key.
#[must_use]
pub fn validator_address(pub_key: &[u8]) -> Vec<u8> {
    Sha256::digest(pub_key)[..ADDRESS_LEN].to_vec()
}

/// Converts a block time, rejecting out of range nanoseconds.
///
/// # Errors
/// Returns a [`DeserializationError`] if `nanos` is outside `0..1_000_000_000`.
pub fn block_time(stage: &'static str, timestamp: Timestamp) -> Result<BlockTime, DeserializationError> {
    let nanos = u32::try_from(timestamp.nanos)
        .ok()
        .filter(|n| *n < 1_000_000_000)
        .ok_or_else(|| {
            DeserializationError::new(stage, format!("invalid nanos {}", timestamp.nanos))
        })?;
    Ok(BlockTime {
        seconds: timestamp.seconds,
        nanos,
    })
}

fn validate_header(header: &block::Header) -> Result<(), DeserializationError> {
    const STAGE: &str = "header";

    if header.height.value() == 0 {
        return Err(DeserializationError::new(STAGE, "invalid height 0"));
    }
    for (field, hash) in [
        ("validators_hash", &header.validators_hash),
        ("next_validators_hash", &header.next_validators_hash),
    ] {
        if !matches!(hash, Hash::Sha256(_)) {
            return Err(DeserializationError::new(
                STAGE,
                format!("{field} must be a sha256 hash"),
            ));
        }
    }
    Ok(())
}

fn decode_validator(stage: &'static str, raw: RawValidator) -> Result<Validator, DeserializationError> {
    let info = validator::Info::try_from(raw).map_err(|e| DeserializationError::new(stage, e))?;
    let key = info
        .pub_key
        .ed25519()
        .ok_or_else(|| DeserializationError::new(stage, "only ed25519 keys are supported"))?;

    if validator_address(key.as_bytes()) != info.address.as_bytes() {
        return Err(DeserializationError::new(
            stage,
            format!("address {} does not match public key", info.address),
        ));
    }

    Ok(Validator {
        address: info.address.as_bytes().to_vec(),
        pub_key: key.as_bytes().to_vec(),
        voting_power: info.power.value(),
    })
}

fn decode_validator_set(
    stage: &'static str,
    validators: Vec<RawValidator>,
) -> Result<Option<ValidatorSet>, DeserializationError> {
    if validators.is_empty() {
        return Ok(None);
    }

    let validators = validators
        .into_iter()
        .map(|v| decode_validator(stage, v))
        .collect::<Result<Vec<_>, _>>()?;

    ValidatorSet::new(validators)
        .map(Some)
        .map_err(|e| DeserializationError::new(stage, e))
}
