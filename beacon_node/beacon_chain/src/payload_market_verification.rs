//! Gossip admission for execution payload bids and revealed payload
//! envelopes.

use crate::beacon_chain::{BeaconChain, BeaconChainTypes};
use crate::observed_execution_bids;
use crate::{GossipVerdict, PeerId};
use bls::SignatureSet;
use slot_clock::SlotClock;
use tracing::{debug, warn};
use types::{Hash256, SignedExecutionPayloadBid, SignedExecutionPayloadEnvelope, Slot};

#[derive(Debug)]
pub enum PayloadMarketGossipError {
    /// The bid's slot is outside the bidding window.
    BidSlotOutOfWindow { bid_slot: Slot, current_slot: Slot },
    /// The same bid was seen before.
    DuplicateBid {
        builder_index: u64,
        slot: Slot,
    },
    /// The builder published conflicting bids for the slot. Slashable.
    EquivocatingBuilder {
        builder_index: u64,
        slot: Slot,
        first_bid_root: Hash256,
    },
    /// An envelope was seen for this block root already.
    DuplicateEnvelope(Hash256),
    /// An envelope referenced a block root we know nothing about.
    UnknownBlockRoot(Hash256),
    InvalidSignature,
    ObservationError(observed_execution_bids::Error),
    UnableToReadSlot,
}

impl PayloadMarketGossipError {
    pub fn verdict(&self) -> GossipVerdict {
        match self {
            PayloadMarketGossipError::BidSlotOutOfWindow { .. }
            | PayloadMarketGossipError::DuplicateBid { .. }
            | PayloadMarketGossipError::DuplicateEnvelope(_)
            | PayloadMarketGossipError::UnknownBlockRoot(_)
            | PayloadMarketGossipError::ObservationError(_)
            | PayloadMarketGossipError::UnableToReadSlot => GossipVerdict::Ignore,
            PayloadMarketGossipError::EquivocatingBuilder { .. }
            | PayloadMarketGossipError::InvalidSignature => GossipVerdict::Reject,
        }
    }
}

impl From<observed_execution_bids::Error> for PayloadMarketGossipError {
    fn from(e: observed_execution_bids::Error) -> Self {
        PayloadMarketGossipError::ObservationError(e)
    }
}

/// Admission for a builder's payload bid: bids are only relevant for the
/// current slot or the one after it.
pub fn verify_execution_bid<T: BeaconChainTypes>(
    chain: &BeaconChain<T>,
    signed_bid: &SignedExecutionPayloadBid,
    peer_id: Option<&PeerId>,
) -> Result<(), PayloadMarketGossipError> {
    let bid = &signed_bid.message;
    let current_slot = chain
        .slot_clock
        .now_with_future_tolerance(chain.spec.maximum_gossip_clock_disparity())
        .ok_or(PayloadMarketGossipError::UnableToReadSlot)?;

    if bid.slot + 1 < current_slot || bid.slot > current_slot + 1 {
        return Err(PayloadMarketGossipError::BidSlotOutOfWindow {
            bid_slot: bid.slot,
            current_slot,
        });
    }

    // Signature before observation, so a forged bid cannot poison the
    // equivocation record for an honest builder.
    let signature_set = SignatureSet {
        pubkeys: vec![],
        signing_root: signed_bid.bid_root(),
        signature: signed_bid.signature,
    };
    if !chain.bls.verify_batch(&[signature_set]) {
        return Err(PayloadMarketGossipError::InvalidSignature);
    }

    let bid_root = signed_bid.bid_root();
    match chain
        .observed_execution_bids
        .write()
        .observe_bid(bid.builder_index, bid.slot, bid_root)?
    {
        None => {
            debug!(
                slot = %bid.slot,
                builder_index = bid.builder_index,
                ?peer_id,
                "Execution bid verified"
            );
            Ok(())
        }
        Some(first_bid_root) if first_bid_root == bid_root => {
            Err(PayloadMarketGossipError::DuplicateBid {
                builder_index: bid.builder_index,
                slot: bid.slot,
            })
        }
        Some(first_bid_root) => {
            warn!(
                slot = %bid.slot,
                builder_index = bid.builder_index,
                ?first_bid_root,
                ?bid_root,
                ?peer_id,
                "Equivocating execution bid"
            );
            Err(PayloadMarketGossipError::EquivocatingBuilder {
                builder_index: bid.builder_index,
                slot: bid.slot,
                first_bid_root,
            })
        }
    }
}

/// Admission for a revealed payload envelope: at most one valid envelope
/// per block root is processed and re-published.
pub fn verify_payload_envelope<T: BeaconChainTypes>(
    chain: &BeaconChain<T>,
    signed_envelope: &SignedExecutionPayloadEnvelope,
    peer_id: Option<&PeerId>,
) -> Result<(), PayloadMarketGossipError> {
    let envelope = &signed_envelope.message;
    let block_root = envelope.beacon_block_root;

    // The envelope must correspond to a block we know (in fork choice or
    // pending assembly).
    let block_known = chain
        .canonical_head
        .fork_choice_read_lock()
        .contains_block(&block_root)
        || chain.block_input_registry.contains(&block_root);
    if !block_known {
        return Err(PayloadMarketGossipError::UnknownBlockRoot(block_root));
    }

    if chain
        .observed_payload_envelopes
        .read()
        .is_known(&block_root)
    {
        return Err(PayloadMarketGossipError::DuplicateEnvelope(block_root));
    }

    let signature_set = SignatureSet {
        pubkeys: vec![],
        signing_root: block_root,
        signature: signed_envelope.signature,
    };
    if !chain.bls.verify_batch(&[signature_set]) {
        return Err(PayloadMarketGossipError::InvalidSignature);
    }

    // Only a fully valid envelope is recorded, so an invalid one cannot
    // block a later valid envelope for the same root.
    chain
        .observed_payload_envelopes
        .write()
        .observe_envelope(block_root, envelope.slot);

    debug!(
        ?block_root,
        slot = %envelope.slot,
        builder_index = envelope.builder_index,
        ?peer_id,
        "Payload envelope verified"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ChainHarness;
    use bls::SignatureBytes;
    use types::{ExecutionBlockHash, ExecutionPayloadBid, ExecutionPayloadEnvelope};

    fn bid(slot: u64, builder_index: u64, value: u64) -> SignedExecutionPayloadBid {
        SignedExecutionPayloadBid {
            message: ExecutionPayloadBid {
                slot: Slot::new(slot),
                builder_index,
                parent_block_hash: ExecutionBlockHash::zero(),
                block_hash: ExecutionBlockHash::repeat_byte(value as u8),
                value,
            },
            signature: SignatureBytes::empty(),
        }
    }

    #[test]
    fn accepts_fresh_bid_then_flags_duplicate_and_equivocation() {
        let harness = ChainHarness::new();
        harness.set_slot(5);

        verify_execution_bid(&harness.chain, &bid(5, 1, 10), None).unwrap();

        let err = verify_execution_bid(&harness.chain, &bid(5, 1, 10), None).unwrap_err();
        assert!(matches!(err, PayloadMarketGossipError::DuplicateBid { .. }));
        assert_eq!(err.verdict(), GossipVerdict::Ignore);

        // Same builder, same slot, different bid: equivocation.
        let err = verify_execution_bid(&harness.chain, &bid(5, 1, 20), None).unwrap_err();
        assert!(matches!(
            err,
            PayloadMarketGossipError::EquivocatingBuilder { .. }
        ));
        assert_eq!(err.verdict(), GossipVerdict::Reject);
    }

    #[test]
    fn stale_bids_are_ignored() {
        let harness = ChainHarness::new();
        harness.set_slot(10);

        let err = verify_execution_bid(&harness.chain, &bid(3, 1, 10), None).unwrap_err();
        assert!(matches!(
            err,
            PayloadMarketGossipError::BidSlotOutOfWindow { .. }
        ));
    }

    #[test]
    fn envelope_requires_known_block_and_dedups() {
        let harness = ChainHarness::new();
        harness.set_slot(1);

        let envelope = SignedExecutionPayloadEnvelope {
            message: ExecutionPayloadEnvelope {
                beacon_block_root: harness.anchor_root,
                slot: Slot::new(1),
                builder_index: 1,
                block_hash: ExecutionBlockHash::repeat_byte(1),
            },
            signature: SignatureBytes::empty(),
        };

        verify_payload_envelope(&harness.chain, &envelope, None).unwrap();
        let err = verify_payload_envelope(&harness.chain, &envelope, None).unwrap_err();
        assert!(matches!(
            err,
            PayloadMarketGossipError::DuplicateEnvelope(_)
        ));

        let unknown = SignedExecutionPayloadEnvelope {
            message: ExecutionPayloadEnvelope {
                beacon_block_root: Hash256::repeat_byte(0xaa),
                ..envelope.message
            },
            signature: SignatureBytes::empty(),
        };
        let err = verify_payload_envelope(&harness.chain, &unknown, None).unwrap_err();
        assert!(matches!(
            err,
            PayloadMarketGossipError::UnknownBlockRoot(_)
        ));
    }
}
