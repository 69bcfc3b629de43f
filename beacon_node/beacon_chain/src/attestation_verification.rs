//! Gossip admission for unaggregated and aggregated attestations.
//!
//! Fork-choice-level validation (target ancestry, known roots) happens
//! when the attestation is applied; this module is only concerned with
//! the cheap admission checks, identity dedup and signatures.

use crate::beacon_chain::{BeaconChain, BeaconChainTypes};
use crate::observed_attesters;
use crate::{GossipVerdict, PeerId};
use bls::SignatureSet;
use slot_clock::SlotClock;
use tracing::debug;
use types::{Epoch, EthSpec, IndexedAttestation, SignedAggregateAndProof};

#[derive(Debug)]
pub enum AttestationGossipError {
    /// The attestation targets an epoch ahead of the clock.
    FutureEpoch {
        attestation_epoch: Epoch,
        current_epoch: Epoch,
    },
    /// The attestation targets an epoch beyond the propagation window.
    PastEpoch {
        attestation_epoch: Epoch,
        current_epoch: Epoch,
    },
    /// The target epoch does not match the attestation slot's epoch.
    BadTargetEpoch,
    /// An unaggregated attestation must carry exactly one attester.
    NotExactlyOneAttesterSet(usize),
    /// An aggregate must attest with at least one validator.
    EmptyAggregationBitfield,
    /// The validator already published an attestation for this epoch.
    PriorAttestationKnown { validator_index: u64, epoch: Epoch },
    /// The aggregator already published an aggregate for this epoch.
    AggregatorAlreadyKnown { aggregator_index: u64, epoch: Epoch },
    InvalidSignature,
    ObservationError(observed_attesters::Error),
    UnableToReadSlot,
}

impl AttestationGossipError {
    pub fn verdict(&self) -> GossipVerdict {
        match self {
            AttestationGossipError::FutureEpoch { .. }
            | AttestationGossipError::PastEpoch { .. }
            | AttestationGossipError::PriorAttestationKnown { .. }
            | AttestationGossipError::AggregatorAlreadyKnown { .. }
            | AttestationGossipError::ObservationError(_)
            | AttestationGossipError::UnableToReadSlot => GossipVerdict::Ignore,
            AttestationGossipError::BadTargetEpoch
            | AttestationGossipError::NotExactlyOneAttesterSet(_)
            | AttestationGossipError::EmptyAggregationBitfield
            | AttestationGossipError::InvalidSignature => GossipVerdict::Reject,
        }
    }
}

impl From<observed_attesters::Error> for AttestationGossipError {
    fn from(e: observed_attesters::Error) -> Self {
        AttestationGossipError::ObservationError(e)
    }
}

/// Check the target epoch lies within the gossip propagation window
/// (current or previous epoch, with clock-disparity tolerance each way).
fn verify_propagation_window<T: BeaconChainTypes>(
    chain: &BeaconChain<T>,
    attestation_epoch: Epoch,
) -> Result<(), AttestationGossipError> {
    let slots_per_epoch = T::EthSpec::slots_per_epoch();
    let disparity = chain.spec.maximum_gossip_clock_disparity();

    let earliest_epoch = chain
        .slot_clock
        .now_with_past_tolerance(disparity)
        .ok_or(AttestationGossipError::UnableToReadSlot)?
        .epoch(slots_per_epoch);
    let latest_epoch = chain
        .slot_clock
        .now_with_future_tolerance(disparity)
        .ok_or(AttestationGossipError::UnableToReadSlot)?
        .epoch(slots_per_epoch);

    if attestation_epoch > latest_epoch {
        return Err(AttestationGossipError::FutureEpoch {
            attestation_epoch,
            current_epoch: latest_epoch,
        });
    }
    if attestation_epoch + 1 < earliest_epoch {
        return Err(AttestationGossipError::PastEpoch {
            attestation_epoch,
            current_epoch: earliest_epoch,
        });
    }
    Ok(())
}

/// Admission for a single-attester attestation from an attestation
/// subnet. On success the attester is recorded and the attestation may be
/// applied to fork choice.
pub fn verify_unaggregated_attestation<T: BeaconChainTypes>(
    chain: &BeaconChain<T>,
    attestation: &IndexedAttestation,
    peer_id: Option<&PeerId>,
) -> Result<(), AttestationGossipError> {
    let target_epoch = attestation.data.target.epoch;

    verify_propagation_window(chain, target_epoch)?;

    if target_epoch != attestation.data.slot.epoch(T::EthSpec::slots_per_epoch()) {
        return Err(AttestationGossipError::BadTargetEpoch);
    }

    if attestation.attesting_indices.len() != 1 {
        return Err(AttestationGossipError::NotExactlyOneAttesterSet(
            attestation.attesting_indices.len(),
        ));
    }
    let validator_index = attestation.attesting_indices[0];

    if chain
        .observed_attesters
        .read()
        .item_has_been_observed(target_epoch, validator_index)?
    {
        return Err(AttestationGossipError::PriorAttestationKnown {
            validator_index,
            epoch: target_epoch,
        });
    }

    let signature_set = SignatureSet {
        pubkeys: vec![],
        signing_root: attestation.data.beacon_block_root,
        signature: attestation.signature,
    };
    if !chain.bls.verify_batch(&[signature_set]) {
        return Err(AttestationGossipError::InvalidSignature);
    }

    if chain
        .observed_attesters
        .write()
        .observe_item(target_epoch, validator_index)?
    {
        return Err(AttestationGossipError::PriorAttestationKnown {
            validator_index,
            epoch: target_epoch,
        });
    }

    debug!(
        slot = %attestation.data.slot,
        validator_index,
        ?peer_id,
        "Gossip attestation verified"
    );
    Ok(())
}

/// Admission for an aggregate-and-proof from the aggregate topic.
pub fn verify_aggregated_attestation<T: BeaconChainTypes>(
    chain: &BeaconChain<T>,
    signed_aggregate: &SignedAggregateAndProof,
    peer_id: Option<&PeerId>,
) -> Result<(), AttestationGossipError> {
    let aggregate = &signed_aggregate.message.aggregate;
    let aggregator_index = signed_aggregate.message.aggregator_index;
    let target_epoch = aggregate.data.target.epoch;

    verify_propagation_window(chain, target_epoch)?;

    if target_epoch != aggregate.data.slot.epoch(T::EthSpec::slots_per_epoch()) {
        return Err(AttestationGossipError::BadTargetEpoch);
    }

    if aggregate.is_empty() {
        return Err(AttestationGossipError::EmptyAggregationBitfield);
    }

    if chain
        .observed_aggregators
        .read()
        .item_has_been_observed(target_epoch, aggregator_index)?
    {
        return Err(AttestationGossipError::AggregatorAlreadyKnown {
            aggregator_index,
            epoch: target_epoch,
        });
    }

    // Selection proof, aggregator signature and the aggregate itself are
    // verified as a single batch.
    let signature_sets = [
        SignatureSet {
            pubkeys: vec![],
            signing_root: aggregate.data.beacon_block_root,
            signature: signed_aggregate.message.selection_proof,
        },
        SignatureSet {
            pubkeys: vec![],
            signing_root: aggregate.data.beacon_block_root,
            signature: signed_aggregate.signature,
        },
        SignatureSet {
            pubkeys: vec![],
            signing_root: aggregate.data.beacon_block_root,
            signature: aggregate.signature,
        },
    ];
    if !chain.bls.verify_batch(&signature_sets) {
        return Err(AttestationGossipError::InvalidSignature);
    }

    if chain
        .observed_aggregators
        .write()
        .observe_item(target_epoch, aggregator_index)?
    {
        return Err(AttestationGossipError::AggregatorAlreadyKnown {
            aggregator_index,
            epoch: target_epoch,
        });
    }

    debug!(
        slot = %aggregate.data.slot,
        aggregator_index,
        ?peer_id,
        "Gossip aggregate verified"
    );
    Ok(())
}
