//! Provides the `ObservedBlockProducers` struct which allows us to reject
//! gossip blocks from validators that have already produced a block at
//! the same slot.

use std::collections::{HashMap, HashSet};
use types::Slot;

#[derive(Debug, PartialEq)]
pub enum Error {
    /// The slot is finalized; equal or lower proposals can never be
    /// relevant again.
    FinalizedBlock { slot: Slot, finalized_slot: Slot },
}

/// Maintains a cache of observed `(block.slot, block.proposer_index)`.
///
/// The cache is pruned when `prune` is called with a finalized slot:
/// everything at or below it is discarded and later observations below
/// the watermark are errors.
#[derive(Default)]
pub struct ObservedBlockProducers {
    finalized_slot: Slot,
    items: HashMap<Slot, HashSet<u64>>,
}

impl ObservedBlockProducers {
    /// Observe that a proposal from `proposer_index` was seen at `slot`.
    ///
    /// Returns `Ok(true)` if a proposal from the same proposer at the
    /// same slot had been seen before.
    pub fn observe_proposal(&mut self, slot: Slot, proposer_index: u64) -> Result<bool, Error> {
        self.sanitize_slot(slot)?;
        let newly_inserted = self
            .items
            .entry(slot)
            .or_default()
            .insert(proposer_index);
        Ok(!newly_inserted)
    }

    /// Returns `Ok(true)` if a proposal from `proposer_index` at `slot`
    /// has been observed.
    pub fn proposer_has_been_observed(
        &self,
        slot: Slot,
        proposer_index: u64,
    ) -> Result<bool, Error> {
        self.sanitize_slot(slot)?;
        Ok(self
            .items
            .get(&slot)
            .is_some_and(|set| set.contains(&proposer_index)))
    }

    fn sanitize_slot(&self, slot: Slot) -> Result<(), Error> {
        if self.finalized_slot > Slot::new(0) && slot <= self.finalized_slot {
            Err(Error::FinalizedBlock {
                slot,
                finalized_slot: self.finalized_slot,
            })
        } else {
            Ok(())
        }
    }

    /// Removes all observations at or below `finalized_slot` and advances
    /// the watermark.
    pub fn prune(&mut self, finalized_slot: Slot) {
        if finalized_slot <= self.finalized_slot {
            return;
        }
        self.finalized_slot = finalized_slot;
        self.items.retain(|slot, _| *slot > finalized_slot);
    }

    pub fn len(&self) -> usize {
        self.items.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observes_and_dedups() {
        let mut cache = ObservedBlockProducers::default();

        assert_eq!(cache.observe_proposal(Slot::new(10), 0), Ok(false));
        assert_eq!(cache.observe_proposal(Slot::new(10), 0), Ok(true));
        assert_eq!(cache.observe_proposal(Slot::new(10), 1), Ok(false));
        assert_eq!(cache.observe_proposal(Slot::new(11), 0), Ok(false));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.proposer_has_been_observed(Slot::new(10), 0), Ok(true));
        assert_eq!(
            cache.proposer_has_been_observed(Slot::new(11), 1),
            Ok(false)
        );
    }

    #[test]
    fn prune_rejects_finalized_slots() {
        let mut cache = ObservedBlockProducers::default();
        cache.observe_proposal(Slot::new(10), 0).unwrap();
        cache.observe_proposal(Slot::new(20), 0).unwrap();

        cache.prune(Slot::new(15));
        assert_eq!(cache.len(), 1);

        assert_eq!(
            cache.observe_proposal(Slot::new(10), 0),
            Err(Error::FinalizedBlock {
                slot: Slot::new(10),
                finalized_slot: Slot::new(15),
            })
        );
        // At the boundary is also finalized.
        assert!(cache.observe_proposal(Slot::new(15), 0).is_err());
        assert_eq!(cache.observe_proposal(Slot::new(16), 0), Ok(false));
    }

    #[test]
    fn prune_never_regresses() {
        let mut cache = ObservedBlockProducers::default();
        cache.prune(Slot::new(20));
        cache.prune(Slot::new(10));
        assert!(cache.observe_proposal(Slot::new(15), 0).is_err());
        assert_eq!(cache.observe_proposal(Slot::new(21), 0), Ok(false));
    }
}
