//! The chain's implementation of the fork-choice `Store`.

use fork_choice::ForkChoiceStore;
use proto_array::JustifiedBalances;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use types::{BeaconState, Checkpoint, EthSpec, Hash256, SignedBeaconBlock, Slot};

#[derive(Debug)]
pub enum Error {
    UnknownJustifiedState(Checkpoint),
}

pub struct BeaconForkChoiceStore<E: EthSpec> {
    current_slot: Slot,
    justified_checkpoint: Checkpoint,
    justified_balances: JustifiedBalances,
    finalized_checkpoint: Checkpoint,
    proposer_boost_root: Hash256,
    equivocating_indices: BTreeSet<u64>,
    _phantom: PhantomData<E>,
}

impl<E: EthSpec> BeaconForkChoiceStore<E> {
    /// Initialise the store from an anchor state whose checkpoints are
    /// taken as both justified and finalized.
    pub fn from_anchor_state(anchor_block_root: Hash256, anchor_state: &BeaconState) -> Self {
        let anchor_epoch = anchor_state.slot.epoch(E::slots_per_epoch());
        let anchor_checkpoint = Checkpoint {
            epoch: anchor_epoch,
            root: anchor_block_root,
        };

        Self {
            current_slot: anchor_state.slot,
            justified_checkpoint: anchor_checkpoint,
            justified_balances: JustifiedBalances::from_justified_state(anchor_state),
            finalized_checkpoint: anchor_checkpoint,
            proposer_boost_root: Hash256::ZERO,
            equivocating_indices: BTreeSet::new(),
            _phantom: PhantomData,
        }
    }
}

impl<E: EthSpec> ForkChoiceStore<E> for BeaconForkChoiceStore<E> {
    type Error = Error;

    fn get_current_slot(&self) -> Slot {
        self.current_slot
    }

    fn set_current_slot(&mut self, slot: Slot) {
        self.current_slot = slot;
    }

    fn on_verified_block(
        &mut self,
        _block: &SignedBeaconBlock,
        _block_root: Hash256,
        _state: &BeaconState,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn justified_checkpoint(&self) -> &Checkpoint {
        &self.justified_checkpoint
    }

    fn justified_balances(&self) -> &JustifiedBalances {
        &self.justified_balances
    }

    fn finalized_checkpoint(&self) -> &Checkpoint {
        &self.finalized_checkpoint
    }

    fn set_finalized_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.finalized_checkpoint = checkpoint;
    }

    fn set_justified_checkpoint(
        &mut self,
        checkpoint: Checkpoint,
        state: &BeaconState,
    ) -> Result<(), Self::Error> {
        self.justified_checkpoint = checkpoint;
        self.justified_balances = JustifiedBalances::from_justified_state(state);
        Ok(())
    }

    fn equivocating_indices(&self) -> &BTreeSet<u64> {
        &self.equivocating_indices
    }

    fn extend_equivocating_indices(&mut self, indices: impl IntoIterator<Item = u64>) {
        self.equivocating_indices.extend(indices);
    }

    fn proposer_boost_root(&self) -> Hash256 {
        self.proposer_boost_root
    }

    fn set_proposer_boost_root(&mut self, proposer_boost_root: Hash256) {
        self.proposer_boost_root = proposer_boost_root;
    }
}
