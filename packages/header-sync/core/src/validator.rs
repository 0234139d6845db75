//! Validator sets and block times shared by all chain families.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::error::ValidatorSetError;

/// Upper bound on the total voting power of a validator set.
pub const MAX_TOTAL_VOTING_POWER: u64 = (i64::MAX / 8) as u64;

/// A single validator of an external chain.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Validator identity as it appears in commit signatures
    #[serde_as(as = "Hex")]
    pub address: Vec<u8>,
    /// Raw public key bytes, interpreted by the chain family
    #[serde_as(as = "Hex")]
    pub pub_key: Vec<u8>,
    /// Voting power
    pub voting_power: u64,
}

/// An ordered validator set with unique identities and non-zero total power.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Validator>", into = "Vec<Validator>")]
#[allow(clippy::module_name_repetitions)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
    total_voting_power: u64,
}

impl ValidatorSet {
    /// Builds a validator set, keeping the given order.
    ///
    /// # Errors
    /// Fails if the set is empty, contains a duplicate address, has zero total
    /// voting power or exceeds [`MAX_TOTAL_VOTING_POWER`].
    pub fn new(validators: Vec<Validator>) -> Result<Self, ValidatorSetError> {
        if validators.is_empty() {
            return Err(ValidatorSetError::Empty);
        }

        let mut total: u64 = 0;
        for (i, validator) in validators.iter().enumerate() {
            if validators[..i]
                .iter()
                .any(|v| v.address == validator.address)
            {
                return Err(ValidatorSetError::DuplicateValidator(
                    validator.address.clone(),
                ));
            }
            total = total
                .checked_add(validator.voting_power)
                .filter(|t| *t <= MAX_TOTAL_VOTING_POWER)
                .ok_or(ValidatorSetError::VotingPowerOverflow {
                    max: MAX_TOTAL_VOTING_POWER,
                })?;
        }

        if total == 0 {
            return Err(ValidatorSetError::ZeroVotingPower);
        }

        Ok(Self {
            validators,
            total_voting_power: total,
        })
    }

    /// The validators in set order.
    #[must_use]
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Sum of all voting powers.
    #[must_use]
    pub const fn total_voting_power(&self) -> u64 {
        self.total_voting_power
    }

    /// Looks up a validator by its address.
    #[must_use]
    pub fn get_by_address(&self, address: &[u8]) -> Option<&Validator> {
        self.validators.iter().find(|v| v.address == address)
    }

    /// Number of validators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Always false, a validator set is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl TryFrom<Vec<Validator>> for ValidatorSet {
    type Error = ValidatorSetError;

    fn try_from(validators: Vec<Validator>) -> Result<Self, Self::Error> {
        Self::new(validators)
    }
}

impl From<ValidatorSet> for Vec<Validator> {
    fn from(set: ValidatorSet) -> Self {
        set.validators
    }
}

/// Block time as seconds and nanoseconds since the unix epoch.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockTime {
    /// Whole seconds since the unix epoch
    pub seconds: i64,
    /// Nanoseconds within the second, in `0..1_000_000_000`
    pub nanos: u32,
}

impl fmt::Display for BlockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}
