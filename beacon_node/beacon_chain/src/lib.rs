pub mod archiver;
pub mod attestation_verification;
pub mod beacon_chain;
pub mod beacon_fork_choice_store;
pub mod blob_verification;
pub mod block_input;
pub mod block_verification;
pub mod canonical_head;
pub mod chain_config;
pub mod custody_context;
pub mod data_column_verification;
pub mod errors;
pub mod execution_payload;
pub mod metrics;
pub mod observed_attesters;
pub mod observed_block_producers;
pub mod observed_data_sidecars;
pub mod observed_execution_bids;
pub mod observed_payload_envelopes;
pub mod payload_market_verification;
pub mod state_transition;
pub mod sync_committee_verification;
pub mod test_utils;

use std::fmt;

pub use crate::beacon_chain::{BeaconChain, BeaconChainTypes};
pub use crate::canonical_head::{CachedHead, CanonicalHead, UpdateHeadReason};
pub use crate::chain_config::ChainConfig;
pub use crate::custody_context::CustodyContext;
pub use crate::errors::BeaconChainError;
pub use block_input::{
    BlockInput, BlockInputError, BlockInputType, BlockSource, ErrorCategory, SourceMeta,
    registry::BlockInputRegistry,
};

/// Opaque peer identity as reported by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId(pub String);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The decision a gossip validator hands back to the network layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GossipVerdict {
    /// Propagate the message and process it.
    Accept,
    /// Drop the message without penalising the peer (duplicates, already
    /// seen, not yet relevant).
    Ignore,
    /// Drop the message and penalise the peer (structurally or
    /// cryptographically invalid).
    Reject,
}
