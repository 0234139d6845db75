//! Deterministic validators and a builder for signed header payloads.

use ed25519_dalek::{Signer, SigningKey};
use header_sync_core::{Validator, ValidatorSet};
use prost::Message;
use tendermint::{
    block::{self, parts},
    chain, Hash, Time,
};
use tendermint_proto::{
    google::protobuf::Timestamp,
    v0_38::{
        crypto::{public_key::Sum, PublicKey as RawPublicKey},
        types::{
            BlockId as RawBlockId, BlockIdFlag, Commit as RawCommit, CommitSig as RawCommitSig,
            Header as RawHeader, PartSetHeader as RawPartSetHeader, Validator as RawValidator,
        },
        version::Consensus,
    },
};

use crate::{
    header::{validator_address, validator_set_hash, CosmosCommit},
    proto,
    verify::vote_sign_bytes,
};

const HASH_SIZE: usize = 32;

/// Block time of the header at height zero; each height adds one second.
pub const BASE_TIME: i64 = 1_700_000_000;

/// A validator with a known signing key.
#[derive(Clone, Debug)]
pub struct TestValidator {
    signing_key: SigningKey,
    /// Voting power
    pub power: u64,
}

impl TestValidator {
    /// The validator with key seed `seed`.
    #[must_use]
    pub fn new(seed: u8, power: u64) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&[seed; 32]),
            power,
        }
    }

    /// The ed25519 public key.
    #[must_use]
    pub fn public_key(&self) -> Vec<u8> {
        self.signing_key.verifying_key().to_bytes().to_vec()
    }

    /// The validator address.
    #[must_use]
    pub fn address(&self) -> Vec<u8> {
        validator_address(&self.public_key())
    }

    /// Signs `msg` with the validator key.
    #[must_use]
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        self.signing_key.sign(msg).to_bytes().to_vec()
    }

    /// The wire representation of the validator.
    #[must_use]
    pub fn to_proto(&self) -> RawValidator {
        RawValidator {
            address: self.address(),
            pub_key: Some(RawPublicKey {
                sum: Some(Sum::Ed25519(self.public_key())),
            }),
            voting_power: i64::try_from(self.power).unwrap_or(i64::MAX),
            proposer_priority: 0,
        }
    }
}

/// One validator per entry of `powers`, with seeds `1, 2, ...` by position.
///
/// # Panics
/// Panics if more than 255 powers are given.
#[must_use]
pub fn test_validators(powers: &[u64]) -> Vec<TestValidator> {
    powers
        .iter()
        .enumerate()
        .map(|(i, power)| {
            let seed = u8::try_from(i + 1).expect("at most 255 test validators");
            TestValidator::new(seed, *power)
        })
        .collect()
}

/// The validator set formed by `validators`.
///
/// # Panics
/// Panics if the validators do not form a valid set.
#[must_use]
pub fn validator_set(validators: &[TestValidator]) -> ValidatorSet {
    ValidatorSet::new(
        validators
            .iter()
            .map(|v| Validator {
                address: v.address(),
                pub_key: v.public_key(),
                voting_power: v.power,
            })
            .collect(),
    )
    .expect("valid test validator set")
}

/// A header payload with its hash.
#[derive(Clone, Debug)]
pub struct BuiltHeader {
    /// The protobuf encoded payload
    pub bytes: Vec<u8>,
    /// The header hash
    pub hash: [u8; HASH_SIZE],
}

type Hook<T> = Box<dyn FnOnce(&mut T)>;

/// Builds a header at a height, signed by a validator set.
///
/// By default every validator signs, the next validator set equals the signing
/// set, the signing set is embedded and the next set is not.
pub struct HeaderBuilder {
    chain_id: String,
    height: u64,
    validators: Vec<TestValidator>,
    next_validators: Option<Vec<TestValidator>>,
    signers: Option<Vec<usize>>,
    parent: Vec<u8>,
    time: i64,
    header_hooks: Vec<Hook<RawHeader>>,
    commit_hooks: Vec<Hook<RawCommit>>,
    payload_hooks: Vec<Hook<proto::CosmosHeader>>,
}

impl HeaderBuilder {
    /// A header of `chain_id` at `height` signed by all of `validators`.
    #[must_use]
    pub fn new(chain_id: &str, height: u64, validators: &[TestValidator]) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            height,
            validators: validators.to_vec(),
            next_validators: None,
            signers: None,
            parent: vec![0; HASH_SIZE],
            time: BASE_TIME.saturating_add_unsigned(height),
            header_hooks: Vec::new(),
            commit_hooks: Vec::new(),
            payload_hooks: Vec::new(),
        }
    }

    /// Links the header to the parent with hash `hash`.
    #[must_use]
    pub fn parent(mut self, hash: &[u8]) -> Self {
        self.parent = hash.to_vec();
        self
    }

    /// Sets the block time in seconds.
    #[must_use]
    pub const fn time(mut self, seconds: i64) -> Self {
        self.time = seconds;
        self
    }

    /// Announces and embeds `validators` as the next validator set.
    #[must_use]
    pub fn next_validators(mut self, validators: &[TestValidator]) -> Self {
        self.next_validators = Some(validators.to_vec());
        self
    }

    /// Only the validators at `indices` sign; the others are absent.
    #[must_use]
    pub fn signers(mut self, indices: &[usize]) -> Self {
        self.signers = Some(indices.to_vec());
        self
    }

    /// Edits the header before it is hashed and signed.
    #[must_use]
    pub fn map_header(mut self, f: impl FnOnce(&mut RawHeader) + 'static) -> Self {
        self.header_hooks.push(Box::new(f));
        self
    }

    /// Edits the commit after it is signed.
    #[must_use]
    pub fn map_commit(mut self, f: impl FnOnce(&mut RawCommit) + 'static) -> Self {
        self.commit_hooks.push(Box::new(f));
        self
    }

    /// Edits the final payload before it is encoded.
    #[must_use]
    pub fn map_payload(mut self, f: impl FnOnce(&mut proto::CosmosHeader) + 'static) -> Self {
        self.payload_hooks.push(Box::new(f));
        self
    }

    /// Hashes, signs and encodes the header.
    ///
    /// A header that does not convert to a valid Tendermint header gets a
    /// zero hash, so decoding it fails before the hash matters.
    ///
    /// # Panics
    /// Panics if the chain id or block time cannot be signed over.
    #[must_use]
    pub fn build(self) -> BuiltHeader {
        let set = validator_set(&self.validators);
        let next_set = self
            .next_validators
            .as_deref()
            .map_or_else(|| set.clone(), validator_set);
        let set_hash = |set: &ValidatorSet| {
            validator_set_hash(set)
                .expect("test validators hash")
                .as_bytes()
                .to_vec()
        };

        let timestamp = Timestamp {
            seconds: self.time,
            nanos: 0,
        };
        let mut header = RawHeader {
            version: Some(Consensus { block: 11, app: 0 }),
            chain_id: self.chain_id.clone(),
            height: i64::try_from(self.height).unwrap_or(i64::MAX),
            time: Some(timestamp.clone()),
            last_block_id: Some(RawBlockId {
                hash: self.parent,
                part_set_header: Some(RawPartSetHeader {
                    total: 1,
                    hash: vec![0xaa; HASH_SIZE],
                }),
            }),
            last_commit_hash: vec![0x01; HASH_SIZE],
            data_hash: vec![0x02; HASH_SIZE],
            validators_hash: set_hash(&set),
            next_validators_hash: set_hash(&next_set),
            consensus_hash: vec![0x03; HASH_SIZE],
            app_hash: self.height.to_be_bytes().repeat(4),
            last_results_hash: vec![0x04; HASH_SIZE],
            evidence_hash: vec![0x05; HASH_SIZE],
            proposer_address: self
                .validators
                .first()
                .map(TestValidator::address)
                .unwrap_or_default(),
        };
        for hook in self.header_hooks {
            hook(&mut header);
        }
        let hash = block::Header::try_from(header.clone())
            .ok()
            .and_then(|h| h.hash().as_bytes().try_into().ok())
            .unwrap_or([0; HASH_SIZE]);

        let signed = CosmosCommit {
            height: block::Height::try_from(self.height).expect("test height"),
            round: block::Round::from(0_u8),
            block_id: block::Id {
                hash: Hash::Sha256(hash),
                part_set_header: parts::Header::new(1, Hash::Sha256([0xbb; HASH_SIZE]))
                    .expect("test part set header"),
            },
            signatures: Vec::new(),
        };
        let chain_id = chain::Id::try_from(self.chain_id).expect("test chain id");
        let time = Time::from_unix_timestamp(self.time, 0).expect("test block time");
        let sign_bytes = vote_sign_bytes(&chain_id, &signed, time);

        let signs = |i: usize| self.signers.as_ref().is_none_or(|s| s.contains(&i));
        let signatures = self
            .validators
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if !signs(i) {
                    return RawCommitSig {
                        block_id_flag: BlockIdFlag::Absent as i32,
                        ..RawCommitSig::default()
                    };
                }
                RawCommitSig {
                    block_id_flag: BlockIdFlag::Commit as i32,
                    validator_address: v.address(),
                    timestamp: Some(timestamp.clone()),
                    signature: v.sign(&sign_bytes),
                }
            })
            .collect();
        let mut commit = RawCommit {
            height: header.height,
            round: 0,
            block_id: Some(RawBlockId::from(signed.block_id)),
            signatures,
        };
        for hook in self.commit_hooks {
            hook(&mut commit);
        }

        let mut payload = proto::CosmosHeader {
            header: Some(header),
            commit: Some(commit),
            valsets: self.validators.iter().map(TestValidator::to_proto).collect(),
            next_valsets: self
                .next_validators
                .iter()
                .flatten()
                .map(TestValidator::to_proto)
                .collect(),
        };
        for hook in self.payload_hooks {
            hook(&mut payload);
        }

        BuiltHeader {
            bytes: payload.encode_to_vec(),
            hash,
        }
    }
}
