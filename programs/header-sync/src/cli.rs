//! Command line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Light-client header synchroniser for external BFT chains.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path of the JSON config file
    #[arg(long, global = true, default_value = "header-sync.json")]
    pub config: PathBuf,

    /// The operation to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Operations on the synchroniser state.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bootstrap a chain from its genesis header.
    Genesis {
        /// Relay chain id of the external chain
        #[arg(long)]
        chain_id: u64,
        /// File holding the hex encoded genesis header payload
        #[arg(long)]
        header: PathBuf,
        /// Hex addresses of the accounts approving the genesis
        #[arg(long, num_args = 0..)]
        signers: Vec<String>,
    },
    /// Verify and store a batch of headers.
    Sync {
        /// Relay chain id of the external chain
        #[arg(long)]
        chain_id: u64,
        /// Hex address of the submitting account
        #[arg(long)]
        submitter: String,
        /// Files holding hex encoded header payloads
        #[arg(long, num_args = 1.., required = true)]
        headers: Vec<PathBuf>,
    },
    /// Show the validator set checkpoint of a chain.
    Epoch {
        /// Relay chain id of the external chain
        #[arg(long)]
        chain_id: u64,
        /// Height whose authoritative checkpoint to show, latest if omitted
        #[arg(long)]
        height: Option<u64>,
    },
    /// Show the synchronisation state of a chain.
    Status {
        /// Relay chain id of the external chain
        #[arg(long)]
        chain_id: u64,
    },
}
