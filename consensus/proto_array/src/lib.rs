mod error;
mod justified_balances;
pub mod proto_array;
mod proto_array_fork_choice;
mod ssz_container;

pub use crate::justified_balances::JustifiedBalances;
pub use crate::proto_array::{
    InvalidationOperation, Iter, ProposerBoost, ProtoArray, ProtoNode,
    calculate_committee_fraction,
};
pub use crate::proto_array_fork_choice::{
    Block, ExecutionStatus, ProtoArrayForkChoice, VoteTracker,
};
pub use crate::ssz_container::SszContainer;
pub use error::Error;
