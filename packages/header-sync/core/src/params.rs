//! Borsh encoded request parameters exchanged with the host.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::{error::DeserializationError, Address};

/// Parameter of the genesis bootstrap call.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SyncGenesisHeaderParam {
    /// Relay chain id assigned to the external chain
    pub chain_id: u64,
    /// Genesis header in the external chain's wire format
    pub genesis_header: Vec<u8>,
}

/// Parameter of the batch extension call.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SyncBlockHeaderParam {
    /// Relay chain id assigned to the external chain
    pub chain_id: u64,
    /// Relay account that submitted the batch
    pub address: Address,
    /// Headers in the external chain's wire format, in any order
    pub headers: Vec<Vec<u8>>,
}

impl SyncGenesisHeaderParam {
    /// Decodes the parameter.
    ///
    /// # Errors
    /// Returns a [`DeserializationError`] if the bytes are not a valid encoding.
    pub fn decode(bz: &[u8]) -> Result<Self, DeserializationError> {
        borsh::from_slice(bz).map_err(|e| DeserializationError::new("genesis header param", e))
    }

    /// Encodes the parameter.
    ///
    /// # Errors
    /// Propagates writer errors from borsh.
    pub fn encode(&self) -> std::io::Result<Vec<u8>> {
        borsh::to_vec(self)
    }
}

impl SyncBlockHeaderParam {
    /// Decodes the parameter.
    ///
    /// # Errors
    /// Returns a [`DeserializationError`] if the bytes are not a valid encoding.
    pub fn decode(bz: &[u8]) -> Result<Self, DeserializationError> {
        borsh::from_slice(bz).map_err(|e| DeserializationError::new("block header param", e))
    }

    /// Encodes the parameter.
    ///
    /// # Errors
    /// Propagates writer errors from borsh.
    pub fn encode(&self) -> std::io::Result<Vec<u8>> {
        borsh::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_param_layout() {
        let param = SyncGenesisHeaderParam {
            chain_id: 5,
            genesis_header: vec![0xaa, 0xbb],
        };
        let bz = param.encode().unwrap();
        assert_eq!(
            bz,
            [5, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0xaa, 0xbb].to_vec()
        );
        assert_eq!(SyncGenesisHeaderParam::decode(&bz).unwrap(), param);
    }

    #[test]
    fn rejects_truncated_and_trailing_bytes() {
        let param = SyncBlockHeaderParam {
            chain_id: 5,
            address: [7; 20],
            headers: vec![vec![1, 2, 3], vec![]],
        };
        let bz = param.encode().unwrap();

        let err = SyncBlockHeaderParam::decode(&bz[..bz.len() - 1]).unwrap_err();
        assert_eq!(err.stage, "block header param");

        let mut trailing = bz;
        trailing.push(0);
        assert!(SyncBlockHeaderParam::decode(&trailing).is_err());
    }
}
