//! Commit verification: rebuilding precommit sign bytes and tallying the voting
//! power of valid signatures against a trusted validator set.

use std::collections::HashSet;

use ed25519_dalek::{Signature, VerifyingKey};
use header_sync_core::{error::QuorumError, quorum::VotingPowerTally, SyncHeader, ValidatorSet};
use tendermint::{
    block::CommitSig,
    chain,
    vote::{self, CanonicalVote},
    Time,
};
use tendermint_proto::{v0_38::types::CanonicalVote as RawCanonicalVote, Protobuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::header::{CosmosCommit, CosmosHeader};

/// Why a single signature was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidSignature {
    /// The public key is not a valid ed25519 point.
    #[error("malformed public key: {0}")]
    PublicKey(String),
    /// The signature bytes are not a well-formed ed25519 signature.
    #[error("malformed signature: {0}")]
    Signature(String),
    /// The signature does not verify against the message.
    #[error("signature does not verify")]
    Mismatch,
}

/// Checks a signature over a message for a given public key.
pub trait SignatureVerifier {
    /// Verifies `signature` over `msg` by `pub_key`.
    ///
    /// # Errors
    /// Returns [`InvalidSignature`] if the key or signature is malformed or does
    /// not verify.
    fn verify(&self, pub_key: &[u8], msg: &[u8], signature: &[u8]) -> Result<(), InvalidSignature>;
}

/// Strict ed25519 verification, rejecting small order keys and malleable signatures.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, pub_key: &[u8], msg: &[u8], signature: &[u8]) -> Result<(), InvalidSignature> {
        let pub_key: &[u8; 32] = pub_key
            .try_into()
            .map_err(|_| InvalidSignature::PublicKey(format!("{} bytes", pub_key.len())))?;
        let key = VerifyingKey::from_bytes(pub_key)
            .map_err(|e| InvalidSignature::PublicKey(e.to_string()))?;
        let signature =
            Signature::from_slice(signature).map_err(|e| InvalidSignature::Signature(e.to_string()))?;
        key.verify_strict(msg, &signature)
            .map_err(|_| InvalidSignature::Mismatch)
    }
}

/// The length prefixed canonical precommit a validator signed for `commit`
/// at `timestamp`.
#[must_use]
pub fn vote_sign_bytes(chain_id: &chain::Id, commit: &CosmosCommit, timestamp: Time) -> Vec<u8> {
    let vote = CanonicalVote {
        vote_type: vote::Type::Precommit,
        height: commit.height,
        round: commit.round,
        block_id: Some(commit.block_id),
        timestamp: Some(timestamp),
        chain_id: chain_id.clone(),
    };
    <CanonicalVote as Protobuf<RawCanonicalVote>>::encode_length_delimited_vec(vote)
}

/// Verifies that `validators` committed `header` with more than two thirds of
/// their voting power.
///
/// Only votes for the block count. Absent and nil votes, malformed entries,
/// signers outside the set, invalid signatures and repeated signers are skipped.
///
/// # Errors
/// Returns a [`QuorumError`] if the commit is for another height or block, or
/// if the counted power does not reach quorum.
pub fn verify_commit<V: SignatureVerifier>(
    verifier: &V,
    header: &CosmosHeader,
    validators: &ValidatorSet,
) -> Result<VotingPowerTally, QuorumError> {
    let commit = header.commit();
    if commit.height.value() != header.height() {
        return Err(QuorumError::CommitHeightMismatch {
            header_height: header.height(),
            commit_height: commit.height.value(),
        });
    }
    let commit_hash = commit.block_id.hash.as_bytes();
    if commit_hash != header.hash() {
        return Err(QuorumError::CommitHeaderMismatch {
            header_hash: header.hash().to_vec(),
            commit_hash: commit_hash.to_vec(),
        });
    }

    let chain_id = &header.header().chain_id;
    let mut tally = VotingPowerTally::new(validators.total_voting_power());
    let mut seen = HashSet::new();

    for raw in &commit.signatures {
        let sig = match CommitSig::try_from(raw.clone()) {
            Ok(sig) => sig,
            Err(e) => {
                debug!(error = %e, "skipping malformed commit signature");
                continue;
            }
        };
        let CommitSig::BlockIdFlagCommit {
            validator_address,
            timestamp,
            signature: Some(signature),
        } = sig
        else {
            continue;
        };

        let Some(validator) = validators.get_by_address(validator_address.as_bytes()) else {
            debug!(
                address = %validator_address,
                "signature from validator outside the set"
            );
            continue;
        };
        if seen.contains(&validator.address) {
            debug!(address = %validator_address, "repeated signature");
            continue;
        }

        let sign_bytes = vote_sign_bytes(chain_id, commit, timestamp);
        if let Err(e) = verifier.verify(&validator.pub_key, &sign_bytes, signature.as_bytes()) {
            warn!(
                address = %validator_address,
                height = header.height(),
                error = %e,
                "invalid commit signature"
            );
            continue;
        }

        seen.insert(validator.address.clone());
        tally.add(validator.voting_power);
    }

    debug!(
        height = header.height(),
        signed = tally.signed,
        total = tally.total,
        "commit tallied"
    );
    tally.check()
}
