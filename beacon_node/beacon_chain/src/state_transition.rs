//! The state-transition seam.
//!
//! State-transition math is an external collaborator: the chain treats it
//! as a pure function from `(pre-state, block)` to a post-state.

use types::{BeaconState, SignedBeaconBlock};

#[derive(Debug, Clone, Copy)]
pub struct StateTransitionOpts {
    pub verify_signatures: bool,
    pub verify_state_root: bool,
}

impl Default for StateTransitionOpts {
    fn default() -> Self {
        Self {
            verify_signatures: true,
            verify_state_root: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateTransitionError {
    /// The block does not apply to the state; the block is invalid.
    InvalidBlock(String),
    /// The implementation itself failed; retriable.
    Internal(String),
}

pub trait StateTransition: Send + Sync {
    fn apply(
        &self,
        state: &BeaconState,
        block: &SignedBeaconBlock,
        opts: StateTransitionOpts,
    ) -> Result<BeaconState, StateTransitionError>;
}

/// Test/interop double: advances the state to the block's slot and adopts
/// the checkpoints carried in the state unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlotAdvancingStateTransition;

impl StateTransition for SlotAdvancingStateTransition {
    fn apply(
        &self,
        state: &BeaconState,
        block: &SignedBeaconBlock,
        _opts: StateTransitionOpts,
    ) -> Result<BeaconState, StateTransitionError> {
        if block.slot() <= state.slot {
            return Err(StateTransitionError::InvalidBlock(format!(
                "block slot {} not beyond state slot {}",
                block.slot(),
                state.slot
            )));
        }
        let mut post_state = state.clone();
        post_state.slot = block.slot();
        Ok(post_state)
    }
}
