use crate::{Cell, Hash256, KzgCommitment, KzgProof, SignedBeaconBlockHeader, Slot};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use std::sync::Arc;

pub type ColumnIndex = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub struct DataColumnIdentifier {
    pub block_root: Hash256,
    pub index: ColumnIndex,
}

/// One column of the extended-blob matrix: the `index`-th cell of every
/// blob in the block, with per-cell proofs against the block's
/// commitments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct DataColumnSidecar {
    pub index: ColumnIndex,
    pub column: Vec<Cell>,
    pub kzg_commitments: Vec<KzgCommitment>,
    pub kzg_proofs: Vec<KzgProof>,
    pub signed_block_header: SignedBeaconBlockHeader,
}

impl DataColumnSidecar {
    pub fn slot(&self) -> Slot {
        self.signed_block_header.message.slot
    }

    pub fn block_root(&self) -> Hash256 {
        self.signed_block_header.message.canonical_root()
    }

    pub fn block_parent_root(&self) -> Hash256 {
        self.signed_block_header.message.parent_root
    }

    pub fn block_proposer_index(&self) -> u64 {
        self.signed_block_header.message.proposer_index
    }

    pub fn num_of_blobs(&self) -> usize {
        self.kzg_commitments.len()
    }

    pub fn id(&self) -> DataColumnIdentifier {
        DataColumnIdentifier {
            block_root: self.block_root(),
            index: self.index,
        }
    }
}

pub type DataColumnSidecarList = Vec<Arc<DataColumnSidecar>>;
