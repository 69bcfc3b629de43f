use crate::{
    BeaconBlockHeader, ExecutionBlockHash, Hash256, IndexedAttestation, KzgCommitment,
    SignatureBytes, SignedBeaconBlockHeader, Slot,
};
use serde::{Deserialize, Serialize};
use ssz::Encode;
use ssz_derive::{Decode, Encode};

/// The subset of a block body this core consumes: the attestations it
/// carries into fork choice, the blob commitments that drive DA
/// expectations and the execution block hash handed to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct BeaconBlockBody {
    pub attestations: Vec<IndexedAttestation>,
    pub blob_kzg_commitments: Vec<KzgCommitment>,
    pub execution_block_hash: ExecutionBlockHash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct BeaconBlock {
    pub slot: Slot,
    pub proposer_index: u64,
    pub parent_root: Hash256,
    pub state_root: Hash256,
    pub body: BeaconBlockBody,
}

impl BeaconBlock {
    /// Digest of the SSZ-encoded body. Full hash-tree-root math lives with
    /// the state-transition collaborator; within this core the body root
    /// only needs to be a stable commitment.
    pub fn body_root(&self) -> Hash256 {
        Hash256::from_slice(&ethereum_hashing::hash(&self.body.as_ssz_bytes()))
    }

    pub fn block_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: self.slot,
            proposer_index: self.proposer_index,
            parent_root: self.parent_root,
            state_root: self.state_root,
            body_root: self.body_root(),
        }
    }

    pub fn canonical_root(&self) -> Hash256 {
        self.block_header().canonical_root()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct SignedBeaconBlock {
    pub message: BeaconBlock,
    pub signature: SignatureBytes,
}

impl SignedBeaconBlock {
    pub fn slot(&self) -> Slot {
        self.message.slot
    }

    pub fn proposer_index(&self) -> u64 {
        self.message.proposer_index
    }

    pub fn parent_root(&self) -> Hash256 {
        self.message.parent_root
    }

    pub fn state_root(&self) -> Hash256 {
        self.message.state_root
    }

    pub fn message(&self) -> &BeaconBlock {
        &self.message
    }

    pub fn canonical_root(&self) -> Hash256 {
        self.message.canonical_root()
    }

    /// The number of sidecars (blobs or matrix rows) this block commits to.
    pub fn num_expected_blobs(&self) -> usize {
        self.message.body.blob_kzg_commitments.len()
    }

    pub fn signed_block_header(&self) -> SignedBeaconBlockHeader {
        SignedBeaconBlockHeader {
            message: self.message.block_header(),
            signature: self.signature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixed_bytes::FixedBytesExtended;

    fn block() -> SignedBeaconBlock {
        SignedBeaconBlock {
            message: BeaconBlock {
                slot: Slot::new(5),
                proposer_index: 11,
                parent_root: Hash256::from_low_u64_be(1),
                state_root: Hash256::from_low_u64_be(2),
                body: BeaconBlockBody {
                    attestations: vec![],
                    blob_kzg_commitments: vec![KzgCommitment::empty(); 3],
                    execution_block_hash: ExecutionBlockHash::zero(),
                },
            },
            signature: SignatureBytes::empty(),
        }
    }

    #[test]
    fn header_root_matches_block_root() {
        let block = block();
        assert_eq!(
            block.signed_block_header().message.canonical_root(),
            block.canonical_root()
        );
    }

    #[test]
    fn expected_blobs_tracks_commitments() {
        assert_eq!(block().num_expected_blobs(), 3);
    }

    #[test]
    fn root_changes_with_body() {
        let block_a = block();
        let mut block_b = block_a.clone();
        block_b.message.body.blob_kzg_commitments.pop();
        assert_ne!(block_a.canonical_root(), block_b.canonical_root());
    }
}
