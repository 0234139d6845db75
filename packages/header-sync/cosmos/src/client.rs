//! The Cosmos chain family plugged into the sync orchestrator.

use header_sync_core::{
    error::{DeserializationError, QuorumError},
    quorum::VotingPowerTally,
    ChainFamily, HeaderSyncHandler, ValidatorSet,
};

use crate::{
    header::{validator_set_hash, CosmosHeader},
    verify::{verify_commit, Ed25519Verifier, SignatureVerifier},
};

/// Name of the family in logs and configuration.
pub const FAMILY_NAME: &str = "cosmos";

/// Tendermint based chains, verified with the signature scheme `V`.
#[derive(Clone, Debug, Default)]
pub struct CosmosChain<V = Ed25519Verifier> {
    verifier: V,
}

impl CosmosChain {
    /// Creates the family with strict ed25519 verification.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            verifier: Ed25519Verifier,
        }
    }
}

impl<V: SignatureVerifier> CosmosChain<V> {
    /// Creates the family with a custom signature verifier.
    #[must_use]
    pub const fn with_verifier(verifier: V) -> Self {
        Self { verifier }
    }
}

impl<V: SignatureVerifier> ChainFamily for CosmosChain<V> {
    type Header = CosmosHeader;

    fn name(&self) -> &'static str {
        FAMILY_NAME
    }

    fn decode_header(&self, raw: &[u8]) -> Result<CosmosHeader, DeserializationError> {
        CosmosHeader::decode(raw)
    }

    fn validator_set_hash(&self, validators: &ValidatorSet) -> Vec<u8> {
        validator_set_hash(validators)
            .map(|hash| hash.as_bytes().to_vec())
            .unwrap_or_default()
    }

    fn verify_commit(
        &self,
        header: &CosmosHeader,
        validators: &ValidatorSet,
    ) -> Result<VotingPowerTally, QuorumError> {
        verify_commit(&self.verifier, header, validators)
    }
}

/// Orchestrator for Cosmos chains with ed25519 validators.
pub type CosmosHeaderSync = HeaderSyncHandler<CosmosChain>;

#[cfg(test)]
mod tests {
    use header_sync_core::{config::ConfigError, HeaderSync, SyncConfig};

    use super::*;
    use crate::verify::InvalidSignature;

    struct AcceptAll;

    impl SignatureVerifier for AcceptAll {
        fn verify(&self, _: &[u8], _: &[u8], _: &[u8]) -> Result<(), InvalidSignature> {
            Ok(())
        }
    }

    #[test]
    fn family_uses_its_verifier() {
        use crate::test_utils::{test_validators, validator_set, HeaderBuilder};

        let validators = test_validators(&[10, 10, 10]);
        let built = HeaderBuilder::new("testing", 3, &validators)
            .map_commit(|c| {
                for sig in &mut c.signatures {
                    sig.signature = vec![0; 64];
                }
            })
            .build();

        let strict = CosmosChain::new();
        let header = strict.decode_header(&built.bytes).unwrap();
        assert!(strict
            .verify_commit(&header, &validator_set(&validators))
            .is_err());

        let lenient = CosmosChain::with_verifier(AcceptAll);
        assert_eq!(
            lenient
                .verify_commit(&header, &validator_set(&validators))
                .unwrap()
                .signed,
            30
        );
    }

    #[test]
    fn handler_reports_family_name() {
        let handler = CosmosHeaderSync::new(CosmosChain::new(), SyncConfig::default()).unwrap();
        assert_eq!(handler.family(), FAMILY_NAME);
    }

    #[test]
    fn handler_rejects_inconsistent_config() {
        let config = SyncConfig {
            max_batch_size: 0,
            ..SyncConfig::default()
        };
        assert!(matches!(
            CosmosHeaderSync::new(CosmosChain::new(), config),
            Err(ConfigError::Invalid(_))
        ));
    }
}
