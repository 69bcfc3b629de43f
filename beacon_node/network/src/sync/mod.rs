pub mod block_sidecar_coupling;
pub mod chain_target;

pub use block_sidecar_coupling::{RangeBlockComponents, RangeBlockData, RangeRequestId};
pub use chain_target::{ChainTarget, select_chain_target};
