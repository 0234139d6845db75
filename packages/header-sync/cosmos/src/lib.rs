//! Tendermint/CometBFT chain family for the header synchroniser.

#![doc = include_str!("../README.md")]
#![deny(
    clippy::nursery,
    clippy::pedantic,
    warnings,
    missing_docs,
    unused_crate_dependencies
)]

pub mod client;
pub mod header;
pub mod proto;
pub mod verify;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::{CosmosChain, CosmosHeaderSync};
pub use header::CosmosHeader;
pub use verify::{Ed25519Verifier, SignatureVerifier};
