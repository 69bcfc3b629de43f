//! Provides an `ObservedExecutionBids` struct which allows us to reject
//! duplicate or equivocating execution payload bids.
//!
//! Builders submit execution payload bids for slots. We need to track:
//! - Which bids we've already seen (to avoid reprocessing)
//! - Conflicting bids from the same builder for the same slot
//!   (equivocation detection)

use std::collections::HashMap;
use types::{Hash256, Slot};

/// Bids are only relevant around the present slot; retain the current and
/// previous slot.
const RETAINED_SLOTS: u64 = 2;

#[derive(Debug, PartialEq)]
pub enum Error {
    /// The slot fell behind the retention watermark.
    SlotTooLow {
        slot: Slot,
        lowest_permissible_slot: Slot,
    },
}

#[derive(Eq, Hash, PartialEq, Debug, Clone, Copy)]
struct BidKey {
    builder_index: u64,
    slot: Slot,
}

/// Stores a record of execution bids seen on gossip.
///
/// ## Behavior
///
/// - When a new bid is observed for `(builder_index, slot)`:
///   - If we've never seen a bid for this (builder, slot), record it and
///     return `None`
///   - If we've seen the SAME bid (same root), return `Some(root)`
///     (duplicate)
///   - If we've seen a DIFFERENT bid (different root), return
///     `Some(prev_root)` (equivocation)
///
/// ## Equivocation Detection
///
/// If `observe_bid` returns `Some(prev_root)` where `prev_root !=
/// new_root`, then the builder has equivocated by submitting two
/// different bids for the same slot. This is slashable.
pub struct ObservedExecutionBids {
    lowest_permissible_slot: Slot,
    /// Map from (builder_index, slot) to the bid root we've seen.
    items: HashMap<BidKey, Hash256>,
}

impl Default for ObservedExecutionBids {
    fn default() -> Self {
        Self {
            lowest_permissible_slot: Slot::new(0),
            items: HashMap::new(),
        }
    }
}

impl ObservedExecutionBids {
    /// Observe an execution bid for `(builder_index, slot)`.
    ///
    /// ## Returns
    ///
    /// - `Ok(None)`: This is a new bid, not seen before. Proceed with
    ///   validation.
    /// - `Ok(Some(root))` where `root == bid_root`: Duplicate bid.
    /// - `Ok(Some(root))` where `root != bid_root`: the builder submitted
    ///   conflicting bids.
    /// - `Err(...)`: The slot fell behind the watermark.
    pub fn observe_bid(
        &mut self,
        builder_index: u64,
        slot: Slot,
        bid_root: Hash256,
    ) -> Result<Option<Hash256>, Error> {
        self.sanitize_slot(slot)?;

        let key = BidKey {
            builder_index,
            slot,
        };

        match self.items.get(&key) {
            Some(&prev_root) => {
                // We've seen a bid before. Return the previous root; the
                // caller must check it against the new root for
                // equivocation.
                Ok(Some(prev_root))
            }
            None => {
                self.items.insert(key, bid_root);
                Ok(None)
            }
        }
    }

    fn sanitize_slot(&self, slot: Slot) -> Result<(), Error> {
        if slot < self.lowest_permissible_slot {
            Err(Error::SlotTooLow {
                slot,
                lowest_permissible_slot: self.lowest_permissible_slot,
            })
        } else {
            Ok(())
        }
    }

    /// Advance the watermark to retain only the last `RETAINED_SLOTS`.
    pub fn prune(&mut self, current_slot: Slot) {
        let lowest_permissible_slot =
            current_slot.saturating_sub(RETAINED_SLOTS.saturating_sub(1));
        if lowest_permissible_slot <= self.lowest_permissible_slot {
            return;
        }
        self.lowest_permissible_slot = lowest_permissible_slot;
        self.items
            .retain(|key, _| key.slot >= lowest_permissible_slot);
    }

    /// Returns the number of observed bids currently in the cache.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::FixedBytesExtended;

    #[test]
    fn basic_observe() {
        let mut cache = ObservedExecutionBids::default();
        let builder_index = 42;
        let slot = Slot::new(100);
        let bid_root = Hash256::from_low_u64_be(1);

        // First observation: should return None (new bid).
        let result = cache.observe_bid(builder_index, slot, bid_root);
        assert_eq!(result, Ok(None));

        // Second observation with same root: duplicate.
        let result = cache.observe_bid(builder_index, slot, bid_root);
        assert_eq!(result, Ok(Some(bid_root)));

        // Third observation with a different root: equivocation, the
        // first root is returned.
        let different_root = Hash256::from_low_u64_be(2);
        let result = cache.observe_bid(builder_index, slot, different_root);
        assert_eq!(result, Ok(Some(bid_root)));
    }

    #[test]
    fn different_builders_same_slot() {
        let mut cache = ObservedExecutionBids::default();
        let slot = Slot::new(100);
        let bid_root_1 = Hash256::from_low_u64_be(1);
        let bid_root_2 = Hash256::from_low_u64_be(2);

        // Two different builders bidding is not equivocation.
        assert_eq!(cache.observe_bid(1, slot, bid_root_1), Ok(None));
        assert_eq!(cache.observe_bid(2, slot, bid_root_2), Ok(None));
        assert_eq!(cache.observe_bid(1, slot, bid_root_1), Ok(Some(bid_root_1)));
    }

    #[test]
    fn prune_advances_watermark() {
        let mut cache = ObservedExecutionBids::default();
        let builder_index = 42;

        cache
            .observe_bid(builder_index, Slot::new(10), Hash256::from_low_u64_be(1))
            .unwrap();
        cache
            .observe_bid(builder_index, Slot::new(11), Hash256::from_low_u64_be(2))
            .unwrap();

        // Retains the current and previous slot only.
        cache.prune(Slot::new(12));
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.observe_bid(builder_index, Slot::new(10), Hash256::from_low_u64_be(1)),
            Err(Error::SlotTooLow {
                slot: Slot::new(10),
                lowest_permissible_slot: Slot::new(11),
            })
        );

        // Slot 11 survived the prune.
        assert_eq!(
            cache.observe_bid(builder_index, Slot::new(11), Hash256::from_low_u64_be(2)),
            Ok(Some(Hash256::from_low_u64_be(2)))
        );
    }

    #[test]
    fn equivocation_keeps_first_bid() {
        let mut cache = ObservedExecutionBids::default();
        let builder_index = 7;
        let slot = Slot::new(50);
        let first_bid = Hash256::from_low_u64_be(100);
        let second_bid = Hash256::from_low_u64_be(200);

        assert_eq!(cache.observe_bid(builder_index, slot, first_bid), Ok(None));
        assert_eq!(
            cache.observe_bid(builder_index, slot, second_bid),
            Ok(Some(first_bid))
        );
        // The cache still reports the FIRST bid.
        assert_eq!(
            cache.observe_bid(builder_index, slot, first_bid),
            Ok(Some(first_bid))
        );
    }
}
