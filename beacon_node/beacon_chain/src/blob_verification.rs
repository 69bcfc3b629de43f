//! Gossip admission and KZG verification for blob sidecars.

use crate::beacon_chain::{BeaconChain, BeaconChainTypes};
use crate::metrics;
use crate::observed_data_sidecars::{self, ObservationStrategy};
use crate::{GossipVerdict, PeerId};
use kzg::{Blob, KzgCommitment, KzgError, KzgProof, KzgVerifier};
use slot_clock::SlotClock;
use std::marker::PhantomData;
use std::sync::Arc;
use types::{BlobSidecar, EthSpec, Hash256, Slot};

#[derive(Debug)]
pub enum GossipBlobError {
    /// The sidecar index exceeds the fork's maximum blob count.
    InvalidIndex { index: u64, max: u64 },
    FutureSlot {
        message_slot: Slot,
        latest_permissible_slot: Slot,
    },
    PastFinalizedSlot {
        blob_slot: Slot,
        finalized_slot: Slot,
    },
    /// This (slot, proposer, index) was seen before.
    RepeatSidecar {
        proposer_index: u64,
        slot: Slot,
        index: u64,
    },
    /// The KZG proof did not verify against the commitment.
    InvalidKzgProof,
    /// The KZG backend failed outright.
    KzgError(KzgError),
    ObservationError(observed_data_sidecars::Error),
    UnableToReadSlot,
}

impl GossipBlobError {
    pub fn verdict(&self) -> GossipVerdict {
        match self {
            GossipBlobError::FutureSlot { .. }
            | GossipBlobError::PastFinalizedSlot { .. }
            | GossipBlobError::RepeatSidecar { .. }
            | GossipBlobError::ObservationError(_)
            | GossipBlobError::UnableToReadSlot => GossipVerdict::Ignore,
            GossipBlobError::InvalidIndex { .. }
            | GossipBlobError::InvalidKzgProof
            | GossipBlobError::KzgError(_) => GossipVerdict::Reject,
        }
    }
}

impl From<observed_data_sidecars::Error> for GossipBlobError {
    fn from(e: observed_data_sidecars::Error) -> Self {
        GossipBlobError::ObservationError(e)
    }
}

/// A blob whose KZG proof has been verified against its commitment.
#[derive(Debug, Clone)]
pub struct KzgVerifiedBlob {
    blob: Arc<BlobSidecar>,
}

impl KzgVerifiedBlob {
    pub fn new(blob: Arc<BlobSidecar>, kzg: &dyn KzgVerifier) -> Result<Self, KzgError> {
        verify_kzg_for_blob_list(std::iter::once(&blob), kzg)?;
        Ok(Self { blob })
    }

    /// Batch verification: fault attribution is left to the caller since
    /// all blobs typically come from the same peer.
    pub fn from_batch(
        blobs: Vec<Arc<BlobSidecar>>,
        kzg: &dyn KzgVerifier,
    ) -> Result<Vec<Self>, KzgError> {
        verify_kzg_for_blob_list(blobs.iter(), kzg)?;
        Ok(blobs.into_iter().map(|blob| Self { blob }).collect())
    }

    pub fn as_blob(&self) -> &BlobSidecar {
        &self.blob
    }

    pub fn into_inner(self) -> Arc<BlobSidecar> {
        self.blob
    }

    pub fn blob_index(&self) -> u64 {
        self.blob.index
    }
}

/// Verify every blob-commitment-proof triplet in one batched call.
pub fn verify_kzg_for_blob_list<'a, I>(
    blob_iter: I,
    kzg: &dyn KzgVerifier,
) -> Result<(), KzgError>
where
    I: Iterator<Item = &'a Arc<BlobSidecar>>,
{
    let (blobs, (commitments, proofs)): (Vec<&Blob>, (Vec<KzgCommitment>, Vec<KzgProof>)) =
        blob_iter
            .map(|sidecar| (&sidecar.blob, (sidecar.kzg_commitment, sidecar.kzg_proof)))
            .unzip();

    if blobs.is_empty() {
        return Ok(());
    }

    if kzg.verify_blob_batch(&blobs, &commitments, &proofs)? {
        Ok(())
    } else {
        Err(KzgError::VerificationFailed)
    }
}

/// A blob sidecar that passed gossip admission.
pub struct GossipVerifiedBlob<O: ObservationStrategy> {
    blob: KzgVerifiedBlob,
    _phantom: PhantomData<O>,
}

impl<O: ObservationStrategy> GossipVerifiedBlob<O> {
    pub fn block_root(&self) -> Hash256 {
        self.blob.as_blob().block_root()
    }

    pub fn slot(&self) -> Slot {
        self.blob.as_blob().slot()
    }

    pub fn index(&self) -> u64 {
        self.blob.as_blob().index
    }

    pub fn into_inner(self) -> Arc<BlobSidecar> {
        self.blob.into_inner()
    }
}

pub fn validate_blob_sidecar_for_gossip<T: BeaconChainTypes, O: ObservationStrategy>(
    chain: &BeaconChain<T>,
    blob: Arc<BlobSidecar>,
    peer_id: Option<&PeerId>,
) -> Result<GossipVerifiedBlob<O>, GossipBlobError> {
    let blob_slot = blob.slot();
    let blob_epoch = blob_slot.epoch(T::EthSpec::slots_per_epoch());
    let proposer_index = blob.block_proposer_index();

    // Index within the fork's bound.
    let max_blobs = chain.spec.max_blobs_per_block(blob_epoch);
    if blob.index >= max_blobs {
        return Err(GossipBlobError::InvalidIndex {
            index: blob.index,
            max: max_blobs,
        });
    }

    // Slot bounds: not future (with tolerance), not finalized.
    let latest_permissible_slot = chain
        .slot_clock
        .now_with_future_tolerance(chain.spec.maximum_gossip_clock_disparity())
        .ok_or(GossipBlobError::UnableToReadSlot)?;
    if blob_slot > latest_permissible_slot {
        return Err(GossipBlobError::FutureSlot {
            message_slot: blob_slot,
            latest_permissible_slot,
        });
    }

    let finalized_slot = chain
        .canonical_head
        .fork_choice_read_lock()
        .finalized_checkpoint()
        .epoch
        .start_slot(T::EthSpec::slots_per_epoch());
    if blob_slot <= finalized_slot {
        return Err(GossipBlobError::PastFinalizedSlot {
            blob_slot,
            finalized_slot,
        });
    }

    // Identity dedup.
    if chain
        .observed_blob_sidecars
        .read()
        .is_known(blob_slot, proposer_index, blob.index)?
    {
        return Err(GossipBlobError::RepeatSidecar {
            proposer_index,
            slot: blob_slot,
            index: blob.index,
        });
    }

    // Cryptographic verification, batched per message.
    let verified = KzgVerifiedBlob::new(blob, chain.kzg.as_ref()).map_err(|e| match e {
        KzgError::VerificationFailed => GossipBlobError::InvalidKzgProof,
        other => GossipBlobError::KzgError(other),
    })?;

    if O::observe() {
        let previously_observed = chain.observed_blob_sidecars.write().observe_sidecar(
            blob_slot,
            proposer_index,
            verified.blob_index(),
        )?;
        if previously_observed {
            return Err(GossipBlobError::RepeatSidecar {
                proposer_index,
                slot: blob_slot,
                index: verified.blob_index(),
            });
        }
    }

    metrics::inc_counter(&metrics::GOSSIP_BLOB_SIDECARS_VERIFIED);
    tracing::debug!(
        block_root = ?verified.as_blob().block_root(),
        index = verified.blob_index(),
        ?peer_id,
        "Gossip blob verified"
    );

    Ok(GossipVerifiedBlob {
        blob: verified,
        _phantom: PhantomData,
    })
}
