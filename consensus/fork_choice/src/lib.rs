mod fork_choice;
mod fork_choice_store;
pub mod metrics;

pub use crate::fork_choice::{
    AttestationFromBlock, Error, ForkChoice, ForkChoiceView, ForkchoiceUpdateParameters,
    INTERVALS_PER_SLOT, InvalidAttestation, InvalidBlock, PayloadVerificationStatus,
    PersistedForkChoice, QueuedAttestation,
};
pub use crate::fork_choice_store::ForkChoiceStore;
pub use proto_array::{Block as ProtoBlock, ExecutionStatus, InvalidationOperation};
