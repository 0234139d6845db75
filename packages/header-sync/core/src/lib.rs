//! Light-client header synchronisation for external BFT chains.

#![doc = include_str!("../README.md")]
#![deny(
    clippy::nursery,
    clippy::pedantic,
    warnings,
    missing_docs,
    unused_crate_dependencies
)]

pub mod config;
pub mod epoch;
pub mod error;
pub mod handler;
pub mod header_store;
pub mod params;
pub mod quorum;
pub mod router;
pub mod storage;
pub mod validator;

pub use config::{GenesisPolicy, ParentLinkage, SyncConfig};
pub use epoch::EpochSwitchInfo;
pub use error::{HeaderSyncError, QuorumError};
pub use handler::{ChainFamily, HeaderSync, HeaderSyncHandler, SyncHeader, SyncReport};
pub use header_store::StoredHeader;
pub use router::HeaderSyncRouter;
pub use storage::{MemoryStorage, Storage};
pub use validator::{Validator, ValidatorSet};

/// A 20-byte account or validator identity.
pub type Address = [u8; 20];

/// Ensure that a condition is true, otherwise return an error.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}
