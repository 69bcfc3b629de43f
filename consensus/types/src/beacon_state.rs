use crate::{Checkpoint, Slot};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};

/// The view of post-state this core consumes from the state-transition
/// collaborator: the FFG checkpoints fork choice ingests and the
/// effective balances that weight LMD votes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct BeaconState {
    pub slot: Slot,
    pub current_justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    /// Effective balances indexed by validator index.
    pub balances: Vec<u64>,
}

impl BeaconState {
    pub fn current_epoch(&self, slots_per_epoch: u64) -> crate::Epoch {
        self.slot.epoch(slots_per_epoch)
    }
}
