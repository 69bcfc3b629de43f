//! Gossip admission for sync-committee messages and contributions.
//!
//! Both topics are single-slot: a message is only propagated during its
//! own slot (with clock-disparity tolerance), so the seen caches carry a
//! one-slot horizon.

use crate::beacon_chain::{BeaconChain, BeaconChainTypes};
use crate::observed_attesters;
use crate::{GossipVerdict, PeerId};
use bls::SignatureSet;
use slot_clock::SlotClock;
use tracing::debug;
use types::{SignedContributionAndProof, Slot, SyncCommitteeMessage};

#[derive(Debug)]
pub enum SyncCommitteeGossipError {
    /// The message is not for the current slot (with tolerance).
    NotCurrentSlot { message_slot: Slot, current_slot: Slot },
    /// The subcommittee index is out of range.
    InvalidSubcommittee { subcommittee_index: u64, max: u64 },
    /// This validator already published on this subnet at this slot.
    PriorSyncCommitteeMessageKnown { validator_index: u64, slot: Slot },
    /// This aggregator already published a contribution for this
    /// subcommittee at this slot.
    PriorSyncContributionKnown {
        aggregator_index: u64,
        subcommittee_index: u64,
        slot: Slot,
    },
    InvalidSignature,
    ObservationError(observed_attesters::Error),
    UnableToReadSlot,
}

impl SyncCommitteeGossipError {
    pub fn verdict(&self) -> GossipVerdict {
        match self {
            SyncCommitteeGossipError::NotCurrentSlot { .. }
            | SyncCommitteeGossipError::PriorSyncCommitteeMessageKnown { .. }
            | SyncCommitteeGossipError::PriorSyncContributionKnown { .. }
            | SyncCommitteeGossipError::ObservationError(_)
            | SyncCommitteeGossipError::UnableToReadSlot => GossipVerdict::Ignore,
            SyncCommitteeGossipError::InvalidSubcommittee { .. }
            | SyncCommitteeGossipError::InvalidSignature => GossipVerdict::Reject,
        }
    }
}

impl From<observed_attesters::Error> for SyncCommitteeGossipError {
    fn from(e: observed_attesters::Error) -> Self {
        SyncCommitteeGossipError::ObservationError(e)
    }
}

/// The message must be for the current slot: within the disparity-widened
/// window `[current - tolerance, current + tolerance]`.
fn verify_current_slot<T: BeaconChainTypes>(
    chain: &BeaconChain<T>,
    message_slot: Slot,
) -> Result<(), SyncCommitteeGossipError> {
    let disparity = chain.spec.maximum_gossip_clock_disparity();
    let earliest_slot = chain
        .slot_clock
        .now_with_past_tolerance(disparity)
        .ok_or(SyncCommitteeGossipError::UnableToReadSlot)?;
    let latest_slot = chain
        .slot_clock
        .now_with_future_tolerance(disparity)
        .ok_or(SyncCommitteeGossipError::UnableToReadSlot)?;

    if message_slot < earliest_slot || message_slot > latest_slot {
        return Err(SyncCommitteeGossipError::NotCurrentSlot {
            message_slot,
            current_slot: chain.current_slot(),
        });
    }
    Ok(())
}

pub fn verify_sync_committee_message<T: BeaconChainTypes>(
    chain: &BeaconChain<T>,
    message: &SyncCommitteeMessage,
    subnet_id: u64,
    peer_id: Option<&PeerId>,
) -> Result<(), SyncCommitteeGossipError> {
    verify_current_slot(chain, message.slot)?;

    if subnet_id >= chain.spec.sync_committee_subnet_count {
        return Err(SyncCommitteeGossipError::InvalidSubcommittee {
            subcommittee_index: subnet_id,
            max: chain.spec.sync_committee_subnet_count,
        });
    }

    let identity = (subnet_id, message.validator_index);
    if chain
        .observed_sync_contributors
        .read()
        .item_has_been_observed(message.slot, identity)?
    {
        return Err(SyncCommitteeGossipError::PriorSyncCommitteeMessageKnown {
            validator_index: message.validator_index,
            slot: message.slot,
        });
    }

    let signature_set = SignatureSet {
        pubkeys: vec![],
        signing_root: message.beacon_block_root,
        signature: message.signature,
    };
    if !chain.bls.verify_batch(&[signature_set]) {
        return Err(SyncCommitteeGossipError::InvalidSignature);
    }

    if chain
        .observed_sync_contributors
        .write()
        .observe_item(message.slot, identity)?
    {
        return Err(SyncCommitteeGossipError::PriorSyncCommitteeMessageKnown {
            validator_index: message.validator_index,
            slot: message.slot,
        });
    }

    debug!(
        slot = %message.slot,
        validator_index = message.validator_index,
        subnet_id,
        ?peer_id,
        "Sync committee message verified"
    );
    Ok(())
}

pub fn verify_sync_contribution<T: BeaconChainTypes>(
    chain: &BeaconChain<T>,
    signed_contribution: &SignedContributionAndProof,
    peer_id: Option<&PeerId>,
) -> Result<(), SyncCommitteeGossipError> {
    let contribution = &signed_contribution.message.contribution;
    let aggregator_index = signed_contribution.message.aggregator_index;

    verify_current_slot(chain, contribution.slot)?;

    if contribution.subcommittee_index >= chain.spec.sync_committee_subnet_count {
        return Err(SyncCommitteeGossipError::InvalidSubcommittee {
            subcommittee_index: contribution.subcommittee_index,
            max: chain.spec.sync_committee_subnet_count,
        });
    }

    let identity = (aggregator_index, contribution.subcommittee_index);
    if chain
        .observed_sync_aggregators
        .read()
        .item_has_been_observed(contribution.slot, identity)?
    {
        return Err(SyncCommitteeGossipError::PriorSyncContributionKnown {
            aggregator_index,
            subcommittee_index: contribution.subcommittee_index,
            slot: contribution.slot,
        });
    }

    let signature_sets = [
        SignatureSet {
            pubkeys: vec![],
            signing_root: contribution.beacon_block_root,
            signature: signed_contribution.message.selection_proof,
        },
        SignatureSet {
            pubkeys: vec![],
            signing_root: contribution.beacon_block_root,
            signature: signed_contribution.signature,
        },
        SignatureSet {
            pubkeys: vec![],
            signing_root: contribution.beacon_block_root,
            signature: contribution.signature,
        },
    ];
    if !chain.bls.verify_batch(&signature_sets) {
        return Err(SyncCommitteeGossipError::InvalidSignature);
    }

    if chain
        .observed_sync_aggregators
        .write()
        .observe_item(contribution.slot, identity)?
    {
        return Err(SyncCommitteeGossipError::PriorSyncContributionKnown {
            aggregator_index,
            subcommittee_index: contribution.subcommittee_index,
            slot: contribution.slot,
        });
    }

    debug!(
        slot = %contribution.slot,
        aggregator_index,
        subcommittee_index = contribution.subcommittee_index,
        ?peer_id,
        "Sync contribution verified"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ChainHarness;
    use bls::SignatureBytes;
    use types::{ContributionAndProof, SyncCommitteeContribution};

    fn message_at(harness: &ChainHarness, slot: u64, validator_index: u64) -> SyncCommitteeMessage {
        SyncCommitteeMessage {
            slot: Slot::new(slot),
            beacon_block_root: harness.anchor_root,
            validator_index,
            signature: SignatureBytes::empty(),
        }
    }

    #[test]
    fn accepts_then_dedups_per_subnet() {
        let harness = ChainHarness::new();
        harness.set_slot(5);
        let message = message_at(&harness, 5, 11);

        verify_sync_committee_message(&harness.chain, &message, 0, None).unwrap();

        // Same validator, same subnet: duplicate.
        let err = verify_sync_committee_message(&harness.chain, &message, 0, None).unwrap_err();
        assert!(matches!(
            err,
            SyncCommitteeGossipError::PriorSyncCommitteeMessageKnown { .. }
        ));

        // Same validator on a different subnet is a distinct identity.
        verify_sync_committee_message(&harness.chain, &message, 1, None).unwrap();
    }

    #[test]
    fn ignores_messages_for_other_slots() {
        let harness = ChainHarness::new();
        harness.set_slot(5);

        let stale = message_at(&harness, 4, 11);
        let err = verify_sync_committee_message(&harness.chain, &stale, 0, None).unwrap_err();
        assert!(matches!(
            err,
            SyncCommitteeGossipError::NotCurrentSlot { .. }
        ));
        assert_eq!(err.verdict(), GossipVerdict::Ignore);
    }

    #[test]
    fn rejects_invalid_subnet() {
        let harness = ChainHarness::new();
        harness.set_slot(5);
        let message = message_at(&harness, 5, 11);

        let err = verify_sync_committee_message(&harness.chain, &message, 99, None).unwrap_err();
        assert!(matches!(
            err,
            SyncCommitteeGossipError::InvalidSubcommittee { .. }
        ));
        assert_eq!(err.verdict(), GossipVerdict::Reject);
    }

    #[test]
    fn contribution_dedup_is_per_aggregator_and_subcommittee() {
        let harness = ChainHarness::new();
        harness.set_slot(5);

        let contribution = |aggregator_index: u64, subcommittee_index: u64| {
            SignedContributionAndProof {
                message: ContributionAndProof {
                    aggregator_index,
                    contribution: SyncCommitteeContribution {
                        slot: Slot::new(5),
                        beacon_block_root: harness.anchor_root,
                        subcommittee_index,
                        aggregation_bits: vec![0xff],
                        signature: SignatureBytes::empty(),
                    },
                    selection_proof: SignatureBytes::empty(),
                },
                signature: SignatureBytes::empty(),
            }
        };

        verify_sync_contribution(&harness.chain, &contribution(3, 0), None).unwrap();
        let err = verify_sync_contribution(&harness.chain, &contribution(3, 0), None).unwrap_err();
        assert!(matches!(
            err,
            SyncCommitteeGossipError::PriorSyncContributionKnown { .. }
        ));

        verify_sync_contribution(&harness.chain, &contribution(3, 1), None).unwrap();
        verify_sync_contribution(&harness.chain, &contribution(4, 0), None).unwrap();
    }
}
