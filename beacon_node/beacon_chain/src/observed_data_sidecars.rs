//! Provides the `ObservedDataSidecars` struct which allows us to reject
//! duplicate blob or column sidecars, keyed by
//! `(slot, proposer, sidecar index)`.

use derivative::Derivative;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use types::Slot;

#[derive(Debug, PartialEq)]
pub enum Error {
    /// The slot is finalized; sidecars at or below it are never relevant.
    FinalizedSidecar { slot: Slot, finalized_slot: Slot },
}

/// Whether a verification flow should record the sidecar in the observed
/// cache. Data recovered from the execution engine is verified with
/// `DoNotObserve` so the same sidecar can still be accepted (and
/// propagated) if it arrives over gossip before we publish.
pub trait ObservationStrategy {
    fn observe() -> bool;
}

/// Observe the sidecar after successful verification.
pub struct Observe;
/// Don't observe the sidecar after successful verification.
pub struct DoNotObserve;

impl ObservationStrategy for Observe {
    fn observe() -> bool {
        true
    }
}

impl ObservationStrategy for DoNotObserve {
    fn observe() -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SidecarKey {
    slot: Slot,
    proposer_index: u64,
}

/// Tracks the sidecar indices seen per `(slot, proposer)`, pruned against
/// finality.
#[derive(Derivative)]
#[derivative(Default(bound = ""))]
pub struct ObservedDataSidecars<T> {
    finalized_slot: Slot,
    items: HashMap<SidecarKey, HashSet<u64>>,
    _phantom: PhantomData<T>,
}

impl<T> ObservedDataSidecars<T> {
    /// Observe a sidecar at `(slot, proposer, index)`. Returns `Ok(true)`
    /// if it had been seen before.
    pub fn observe_sidecar(
        &mut self,
        slot: Slot,
        proposer_index: u64,
        index: u64,
    ) -> Result<bool, Error> {
        self.sanitize_slot(slot)?;
        let newly_inserted = self
            .items
            .entry(SidecarKey {
                slot,
                proposer_index,
            })
            .or_default()
            .insert(index);
        Ok(!newly_inserted)
    }

    pub fn is_known(&self, slot: Slot, proposer_index: u64, index: u64) -> Result<bool, Error> {
        self.sanitize_slot(slot)?;
        Ok(self
            .items
            .get(&SidecarKey {
                slot,
                proposer_index,
            })
            .is_some_and(|indices| indices.contains(&index)))
    }

    fn sanitize_slot(&self, slot: Slot) -> Result<(), Error> {
        if self.finalized_slot > Slot::new(0) && slot <= self.finalized_slot {
            Err(Error::FinalizedSidecar {
                slot,
                finalized_slot: self.finalized_slot,
            })
        } else {
            Ok(())
        }
    }

    /// Prune all observations at or below `finalized_slot`.
    pub fn prune(&mut self, finalized_slot: Slot) {
        if finalized_slot <= self.finalized_slot {
            return;
        }
        self.finalized_slot = finalized_slot;
        self.items.retain(|key, _| key.slot > finalized_slot);
    }

    pub fn len(&self) -> usize {
        self.items.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Marker for the blob sidecar cache.
pub struct BlobSidecarKind;
/// Marker for the data-column sidecar cache.
pub struct DataColumnSidecarKind;

pub type ObservedBlobSidecars = ObservedDataSidecars<BlobSidecarKind>;
pub type ObservedColumnSidecars = ObservedDataSidecars<DataColumnSidecarKind>;
