//! Tracks which `beacon_block_root` values have had a valid
//! `SignedExecutionPayloadEnvelope` accepted via gossip.
//!
//! Without deduplication a peer can replay valid envelopes and trigger
//! repeated `newPayload` EL calls (mild DoS vector).

use std::collections::HashMap;
use types::{Hash256, Slot};

/// Upper bound on retained roots. Finality normally prunes this cache,
/// but finality can stall; the FIFO bound keeps it bounded under duress.
const MAX_OBSERVED_ROOTS: usize = 256;

/// Tracks block roots for which a valid envelope has been seen.
#[derive(Debug, Default)]
pub struct ObservedPayloadEnvelopes {
    /// Block roots for which we've accepted a valid envelope, with the
    /// slot used for finality pruning.
    observed_roots: HashMap<Hash256, Slot>,
    /// Insertion-ordered roots for FIFO pruning.
    insertion_order: Vec<Hash256>,
}

impl ObservedPayloadEnvelopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a valid envelope has already been recorded for
    /// this root.
    pub fn is_known(&self, beacon_block_root: &Hash256) -> bool {
        self.observed_roots.contains_key(beacon_block_root)
    }

    /// Record that a valid envelope has been accepted for the given root.
    ///
    /// Call this only after full validation succeeds, so that invalid
    /// envelopes don't prevent a later valid one from being processed.
    pub fn observe_envelope(&mut self, beacon_block_root: Hash256, slot: Slot) {
        if self
            .observed_roots
            .insert(beacon_block_root, slot)
            .is_none()
        {
            self.insertion_order.push(beacon_block_root);
        }

        // Enforce the FIFO bound immediately.
        if self.insertion_order.len() > MAX_OBSERVED_ROOTS {
            let to_remove = self.insertion_order.len() - MAX_OBSERVED_ROOTS;
            for root in self.insertion_order.drain(..to_remove) {
                self.observed_roots.remove(&root);
            }
        }
    }

    /// Drop all roots whose slot is at or below `finalized_slot`.
    pub fn prune(&mut self, finalized_slot: Slot) {
        self.observed_roots
            .retain(|_root, slot| *slot > finalized_slot);
        self.insertion_order
            .retain(|root| self.observed_roots.contains_key(root));
    }

    /// Number of block roots currently tracked.
    pub fn len(&self) -> usize {
        self.observed_roots.len()
    }

    /// Returns true if no roots are tracked.
    pub fn is_empty(&self) -> bool {
        self.observed_roots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::FixedBytesExtended;

    #[test]
    fn new_root_not_known() {
        let cache = ObservedPayloadEnvelopes::new();
        assert!(!cache.is_known(&Hash256::from_low_u64_be(1)));
    }

    #[test]
    fn observed_root_is_known() {
        let mut cache = ObservedPayloadEnvelopes::new();
        let root = Hash256::from_low_u64_be(1);

        cache.observe_envelope(root, Slot::new(5));
        assert!(cache.is_known(&root));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn duplicate_observe_is_idempotent() {
        let mut cache = ObservedPayloadEnvelopes::new();
        let root = Hash256::from_low_u64_be(1);

        cache.observe_envelope(root, Slot::new(5));
        cache.observe_envelope(root, Slot::new(5));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn finality_prunes_old_roots() {
        let mut cache = ObservedPayloadEnvelopes::new();
        for slot in 1..=10_u64 {
            cache.observe_envelope(Hash256::from_low_u64_be(slot), Slot::new(slot));
        }

        cache.prune(Slot::new(6));

        assert_eq!(cache.len(), 4);
        assert!(!cache.is_known(&Hash256::from_low_u64_be(6)));
        assert!(cache.is_known(&Hash256::from_low_u64_be(7)));
    }

    #[test]
    fn fifo_bound_holds_without_finality() {
        let mut cache = ObservedPayloadEnvelopes::new();

        for i in 0..(MAX_OBSERVED_ROOTS + 50) {
            cache.observe_envelope(Hash256::from_low_u64_be(i as u64), Slot::new(i as u64));
        }

        assert_eq!(cache.len(), MAX_OBSERVED_ROOTS);

        // Oldest entries were evicted first.
        assert!(
            !cache.is_known(&Hash256::from_low_u64_be(0)),
            "evicted entry should not be known"
        );
        assert!(
            cache.is_known(&Hash256::from_low_u64_be(100)),
            "recent entry should still be known"
        );
    }
}
