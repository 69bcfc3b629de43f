//! Gossip admission for beacon blocks.
//!
//! Cheap structural checks run first, then the proposer-dedup cache, then
//! the signature. Only a block passing all of them is observed and
//! forwarded to the block input registry.

use crate::beacon_chain::{BeaconChain, BeaconChainTypes};
use crate::metrics;
use crate::observed_block_producers;
use crate::{GossipVerdict, PeerId};
use bls::SignatureSet;
use slot_clock::SlotClock;
use std::sync::Arc;
use tracing::debug;
use types::{EthSpec, Hash256, SignedBeaconBlock, Slot};

#[derive(Debug)]
pub enum BlockGossipError {
    /// The block is too far ahead of our clock, even with tolerance.
    FutureSlot {
        message_slot: Slot,
        latest_permissible_slot: Slot,
    },
    /// The block is at or before the finalized slot.
    WouldRevertFinalizedSlot {
        block_slot: Slot,
        finalized_slot: Slot,
    },
    /// The proposer already produced a block at this slot.
    RepeatProposal { proposer_index: u64, slot: Slot },
    /// The block's parent is unknown to fork choice and not pending
    /// assembly.
    ParentUnknown(Hash256),
    /// The proposer signature did not verify.
    ProposalSignatureInvalid,
    ObservationError(observed_block_producers::Error),
    /// Could not read the slot clock.
    UnableToReadSlot,
}

impl BlockGossipError {
    pub fn verdict(&self) -> GossipVerdict {
        match self {
            BlockGossipError::FutureSlot { .. }
            | BlockGossipError::WouldRevertFinalizedSlot { .. }
            | BlockGossipError::RepeatProposal { .. }
            | BlockGossipError::ParentUnknown(_)
            | BlockGossipError::ObservationError(_)
            | BlockGossipError::UnableToReadSlot => GossipVerdict::Ignore,
            BlockGossipError::ProposalSignatureInvalid => GossipVerdict::Reject,
        }
    }
}

impl From<observed_block_producers::Error> for BlockGossipError {
    fn from(e: observed_block_producers::Error) -> Self {
        BlockGossipError::ObservationError(e)
    }
}

/// A block that has passed gossip admission and may be forwarded to the
/// registry and re-published.
pub struct GossipVerifiedBlock {
    pub block: Arc<SignedBeaconBlock>,
    pub block_root: Hash256,
}

pub fn validate_block_for_gossip<T: BeaconChainTypes>(
    chain: &BeaconChain<T>,
    block: Arc<SignedBeaconBlock>,
    peer_id: Option<&PeerId>,
) -> Result<GossipVerifiedBlock, BlockGossipError> {
    let block_root = block.canonical_root();

    // The block must not be from a slot further ahead than the clock
    // disparity tolerance allows.
    let latest_permissible_slot = chain
        .slot_clock
        .now_with_future_tolerance(chain.spec.maximum_gossip_clock_disparity())
        .ok_or(BlockGossipError::UnableToReadSlot)?;
    if block.slot() > latest_permissible_slot {
        return Err(BlockGossipError::FutureSlot {
            message_slot: block.slot(),
            latest_permissible_slot,
        });
    }

    // The block must be beyond finality.
    let finalized_checkpoint = chain
        .canonical_head
        .fork_choice_read_lock()
        .finalized_checkpoint();
    let finalized_slot = finalized_checkpoint
        .epoch
        .start_slot(T::EthSpec::slots_per_epoch());
    if block.slot() <= finalized_slot {
        return Err(BlockGossipError::WouldRevertFinalizedSlot {
            block_slot: block.slot(),
            finalized_slot,
        });
    }

    // Identity dedup: at most one propagated block per (slot, proposer).
    if chain
        .observed_block_producers
        .read()
        .proposer_has_been_observed(block.slot(), block.proposer_index())?
    {
        return Err(BlockGossipError::RepeatProposal {
            proposer_index: block.proposer_index(),
            slot: block.slot(),
        });
    }

    // The parent must be known to fork choice, or at least pending
    // assembly in the registry.
    let parent_root = block.parent_root();
    let parent_known = chain
        .canonical_head
        .fork_choice_read_lock()
        .contains_block(&parent_root)
        || chain.block_input_registry.contains(&parent_root);
    if !parent_known {
        debug!(?parent_root, ?block_root, ?peer_id, "Block with unknown parent");
        return Err(BlockGossipError::ParentUnknown(parent_root));
    }

    // Proposer signature. Key resolution against the validator registry
    // lives with the BLS collaborator.
    let signature_set = SignatureSet {
        pubkeys: vec![],
        signing_root: block_root,
        signature: block.signature,
    };
    if !chain.bls.verify_batch(&[signature_set]) {
        return Err(BlockGossipError::ProposalSignatureInvalid);
    }

    // Admission succeeded: observe so duplicates are dropped from here on.
    let previously_observed = chain
        .observed_block_producers
        .write()
        .observe_proposal(block.slot(), block.proposer_index())?;
    if previously_observed {
        return Err(BlockGossipError::RepeatProposal {
            proposer_index: block.proposer_index(),
            slot: block.slot(),
        });
    }

    metrics::inc_counter(&metrics::GOSSIP_BLOCKS_VERIFIED);

    Ok(GossipVerifiedBlock { block, block_root })
}
