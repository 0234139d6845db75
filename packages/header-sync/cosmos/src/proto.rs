//! The relay payload: a Tendermint header bundled with its commit and the
//! validator sets needed to check it.

use tendermint_proto::v0_38::types::{Commit, Header, Validator};

/// Header, commit and validator sets submitted for one height.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CosmosHeader {
    /// The block header
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,
    /// The commit for this header
    #[prost(message, optional, tag = "2")]
    pub commit: Option<Commit>,
    /// The validator set that signed the header
    #[prost(message, repeated, tag = "3")]
    pub valsets: Vec<Validator>,
    /// The validator set announced by `header.next_validators_hash`, when it changes
    #[prost(message, repeated, tag = "4")]
    pub next_valsets: Vec<Validator>,
}
