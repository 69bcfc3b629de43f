use crate::block_input::BlockInputError;
use crate::block_input::completion::WaitError;
use crate::execution_payload::EngineError;
use crate::state_transition::StateTransitionError;
use types::{ExecutionBlockHash, Hash256};

#[derive(Debug)]
pub enum BeaconChainError {
    BlockInputError(BlockInputError),
    /// No post-state is cached for the parent; the block cannot be
    /// applied.
    MissingParentState(Hash256),
    StateTransitionError(StateTransitionError),
    /// The engine declared the payload invalid.
    ExecutionPayloadInvalid {
        block_root: Hash256,
        latest_valid_hash: Option<ExecutionBlockHash>,
    },
    EngineError(EngineError),
    ForkChoiceError(String),
    /// Persistence kept failing after bounded retries.
    StoreError(store::Error),
    /// A wait on a block input ended without a value.
    WaitError(WaitError),
}

impl From<BlockInputError> for BeaconChainError {
    fn from(e: BlockInputError) -> Self {
        BeaconChainError::BlockInputError(e)
    }
}

impl From<StateTransitionError> for BeaconChainError {
    fn from(e: StateTransitionError) -> Self {
        BeaconChainError::StateTransitionError(e)
    }
}

impl From<EngineError> for BeaconChainError {
    fn from(e: EngineError) -> Self {
        BeaconChainError::EngineError(e)
    }
}

impl From<store::Error> for BeaconChainError {
    fn from(e: store::Error) -> Self {
        BeaconChainError::StoreError(e)
    }
}

impl From<WaitError> for BeaconChainError {
    fn from(e: WaitError) -> Self {
        BeaconChainError::WaitError(e)
    }
}
