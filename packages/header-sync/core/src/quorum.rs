//! BFT quorum arithmetic.

use serde::{Deserialize, Serialize};

use crate::error::QuorumError;

/// Voting power accumulated while verifying a commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingPowerTally {
    /// Power of the validators whose signature verified
    pub signed: u64,
    /// Total power of the validator set
    pub total: u64,
}

impl VotingPowerTally {
    /// Starts an empty tally against a validator set with the given total power.
    #[must_use]
    pub const fn new(total: u64) -> Self {
        Self { signed: 0, total }
    }

    /// Adds the power of one verified signer.
    pub fn add(&mut self, voting_power: u64) {
        self.signed = self.signed.saturating_add(voting_power);
    }

    /// True iff the signers hold strictly more than two thirds of the total power.
    #[must_use]
    pub fn has_quorum(&self) -> bool {
        3 * u128::from(self.signed) > 2 * u128::from(self.total)
    }

    /// Returns the tally if it reaches quorum.
    ///
    /// # Errors
    /// Returns [`QuorumError::InsufficientVotingPower`] otherwise.
    pub fn check(self) -> Result<Self, QuorumError> {
        if self.has_quorum() {
            Ok(self)
        } else {
            Err(QuorumError::InsufficientVotingPower {
                signed: self.signed,
                total: self.total,
            })
        }
    }
}
