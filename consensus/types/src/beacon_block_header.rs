use crate::{Hash256, SignatureBytes, Slot};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct BeaconBlockHeader {
    pub slot: Slot,
    pub proposer_index: u64,
    pub parent_root: Hash256,
    pub state_root: Hash256,
    pub body_root: Hash256,
}

impl BeaconBlockHeader {
    /// The block root this header commits to.
    pub fn canonical_root(&self) -> Hash256 {
        self.tree_hash_root()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub struct SignedBeaconBlockHeader {
    pub message: BeaconBlockHeader,
    pub signature: SignatureBytes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixed_bytes::FixedBytesExtended;

    #[test]
    fn canonical_root_is_stable_and_field_sensitive() {
        let header = BeaconBlockHeader {
            slot: Slot::new(42),
            proposer_index: 7,
            parent_root: Hash256::from_low_u64_be(1),
            state_root: Hash256::from_low_u64_be(2),
            body_root: Hash256::from_low_u64_be(3),
        };
        assert_eq!(header.canonical_root(), header.canonical_root());

        let mut other = header;
        other.slot = Slot::new(43);
        assert_ne!(header.canonical_root(), other.canonical_root());
    }
}
