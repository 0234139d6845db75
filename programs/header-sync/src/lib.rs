//! Operator CLI of the header synchroniser.

#![doc = include_str!("../README.md")]
#![deny(
    clippy::nursery,
    clippy::pedantic,
    warnings,
    missing_docs,
    unused_crate_dependencies
)]

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod state;

/// Reads a file holding hex encoded bytes, ignoring surrounding whitespace and
/// an optional `0x` prefix.
///
/// # Errors
/// Fails if the file cannot be read or is not valid hex.
pub fn read_hex_file(path: &std::path::Path) -> anyhow::Result<Vec<u8>> {
    use anyhow::Context;

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    decode_hex(text.trim()).with_context(|| format!("{} is not valid hex", path.display()))
}

/// Parses a hex encoded 20-byte address, with or without `0x` prefix.
///
/// # Errors
/// Fails if the input is not 20 bytes of hex.
pub fn parse_address(s: &str) -> anyhow::Result<header_sync_core::Address> {
    let bz = decode_hex(s)?;
    <[u8; 20]>::try_from(bz.as_slice())
        .map_err(|_| anyhow::anyhow!("address must be 20 bytes, got {}", bz.len()))
}

fn decode_hex(s: &str) -> anyhow::Result<Vec<u8>> {
    Ok(hex::decode(s.strip_prefix("0x").unwrap_or(s))?)
}
