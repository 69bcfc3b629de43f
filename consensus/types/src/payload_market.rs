use crate::{BuilderIndex, ExecutionBlockHash, Hash256, SignatureBytes, Slot};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// A builder's commitment to deliver an execution payload for a slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct ExecutionPayloadBid {
    pub slot: Slot,
    pub builder_index: BuilderIndex,
    pub parent_block_hash: ExecutionBlockHash,
    pub block_hash: ExecutionBlockHash,
    pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct SignedExecutionPayloadBid {
    pub message: ExecutionPayloadBid,
    pub signature: SignatureBytes,
}

impl SignedExecutionPayloadBid {
    /// Root used to detect equivocating bids from the same builder.
    pub fn bid_root(&self) -> Hash256 {
        self.message.tree_hash_root()
    }
}

/// The revealed payload for a block, delivered separately from the block.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct ExecutionPayloadEnvelope {
    pub beacon_block_root: Hash256,
    pub slot: Slot,
    pub builder_index: BuilderIndex,
    pub block_hash: ExecutionBlockHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct SignedExecutionPayloadEnvelope {
    pub message: ExecutionPayloadEnvelope,
    pub signature: SignatureBytes,
}
