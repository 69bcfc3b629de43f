//! Finalized-history archival and horizon-bounded pruning.
//!
//! On each finality advance the newly finalized canonical segment moves
//! from the hot store into the slot-keyed archive, finalized states are
//! snapshotted on the configured cadence, and archive rows behind the
//! serving horizon are batch-deleted.

use crate::chain_config::{ArchiveStrategy, ChainConfig};
use crate::metrics;
use std::sync::Arc;
use store::{Error as StoreError, HotColdDB, KeyValueStore};
use tracing::debug;
use types::{BeaconState, ChainSpec, Epoch, EthSpec, Hash256, Slot};

pub struct Archiver<S: KeyValueStore> {
    store: Arc<HotColdDB<S>>,
    config: ChainConfig,
}

impl<S: KeyValueStore> Archiver<S> {
    pub fn new(store: Arc<HotColdDB<S>>, config: ChainConfig) -> Self {
        Self { store, config }
    }

    /// Whether the state at `finalized_epoch` should be snapshotted into
    /// the archive.
    pub fn should_archive_state(&self, finalized_epoch: Epoch) -> bool {
        match self.config.archive_strategy {
            ArchiveStrategy::Frequency => {
                finalized_epoch.as_u64() % self.config.archive_state_epoch_frequency == 0
            }
            // Differential archiving is reserved; snapshot on the same
            // cadence until it lands.
            ArchiveStrategy::Differential => {
                finalized_epoch.as_u64() % self.config.archive_state_epoch_frequency == 0
            }
        }
    }

    /// Migrate the newly finalized canonical blocks into the archive and
    /// snapshot the finalized state when the cadence asks for one.
    pub fn process_finalized_checkpoint(
        &self,
        finalized_roots: &[Hash256],
        finalized_state: Option<&BeaconState>,
        finalized_epoch: Epoch,
    ) -> Result<(), StoreError> {
        for block_root in finalized_roots {
            match self.store.migrate_block_to_archive(block_root) {
                Ok(()) => metrics::inc_counter(&metrics::ARCHIVED_BLOCKS),
                // A root can be absent if it was already migrated or was
                // imported before this node started following the chain.
                Err(StoreError::BlockNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if let Some(state) = finalized_state
            && self.should_archive_state(finalized_epoch)
        {
            self.store.put_archive_state(state)?;
            metrics::inc_counter(&metrics::ARCHIVED_STATES);
            debug!(%finalized_epoch, slot = %state.slot, "Archived finalized state");
        }

        Ok(())
    }

    /// Batch-delete every archive row behind the serving horizon:
    /// `start_slot(min(finalized_epoch, max(current_epoch −
    /// MIN_EPOCHS_FOR_BLOCK_REQUESTS, 0)))`.
    pub fn prune_history<E: EthSpec>(
        &self,
        finalized_epoch: Epoch,
        current_epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<usize, StoreError> {
        let cutoff_slot = block_cutoff_slot::<E>(finalized_epoch, current_epoch, spec);
        self.store.prune_archive_below(cutoff_slot)
    }
}

/// The slot below which no block or state rows are retained.
pub fn block_cutoff_slot<E: EthSpec>(
    finalized_epoch: Epoch,
    current_epoch: Epoch,
    spec: &ChainSpec,
) -> Slot {
    let horizon_epoch = Epoch::new(
        current_epoch
            .as_u64()
            .saturating_sub(spec.min_epochs_for_block_requests),
    );
    std::cmp::min(finalized_epoch, horizon_epoch).start_slot(E::slots_per_epoch())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bls::SignatureBytes;
    use store::MemoryStore;
    use types::{
        BeaconBlock, BeaconBlockBody, Checkpoint, FixedBytesExtended, MinimalEthSpec,
        SignedBeaconBlock,
    };

    type E = MinimalEthSpec;

    fn block_at_slot(slot: u64) -> SignedBeaconBlock {
        SignedBeaconBlock {
            message: BeaconBlock {
                slot: Slot::new(slot),
                proposer_index: slot,
                parent_root: Hash256::from_low_u64_be(slot),
                state_root: Hash256::from_low_u64_be(slot + 1),
                body: BeaconBlockBody::default(),
            },
            signature: SignatureBytes::empty(),
        }
    }

    fn archiver() -> (Archiver<MemoryStore>, Arc<HotColdDB<MemoryStore>>) {
        let store = Arc::new(HotColdDB::new(MemoryStore::open()));
        let mut config = ChainConfig::default();
        config.archive_state_epoch_frequency = 4;
        (Archiver::new(store.clone(), config), store)
    }

    #[test]
    fn migrates_finalized_blocks() {
        let (archiver, store) = archiver();
        let block = block_at_slot(5);
        let root = block.canonical_root();
        store.put_block(&root, &block).unwrap();

        archiver
            .process_finalized_checkpoint(&[root], None, Epoch::new(1))
            .unwrap();

        assert!(store.get_block(&root).unwrap().is_none());
        assert!(store.get_archive_block(Slot::new(5)).unwrap().is_some());

        // Re-processing the same root is harmless.
        archiver
            .process_finalized_checkpoint(&[root], None, Epoch::new(1))
            .unwrap();
    }

    #[test]
    fn archives_states_on_frequency_boundaries() {
        let (archiver, store) = archiver();
        let state = BeaconState {
            slot: Slot::new(64),
            current_justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),
            balances: vec![],
        };

        assert!(archiver.should_archive_state(Epoch::new(8)));
        assert!(!archiver.should_archive_state(Epoch::new(9)));

        archiver
            .process_finalized_checkpoint(&[], Some(&state), Epoch::new(8))
            .unwrap();
        assert!(store.get_archive_state(Slot::new(64)).unwrap().is_some());

        archiver
            .process_finalized_checkpoint(&[], Some(&state), Epoch::new(9))
            .unwrap();
    }

    #[test]
    fn cutoff_is_bounded_by_finality_and_horizon() {
        let spec = ChainSpec::minimal();
        let slots_per_epoch = E::slots_per_epoch();

        // Finality is the binding constraint when it lags the horizon.
        let cutoff = block_cutoff_slot::<E>(
            Epoch::new(3),
            Epoch::new(spec.min_epochs_for_block_requests + 28),
            &spec,
        );
        assert_eq!(cutoff, Epoch::new(3).start_slot(slots_per_epoch));

        // A young chain prunes nothing: the horizon saturates at zero.
        let cutoff = block_cutoff_slot::<E>(Epoch::new(3), Epoch::new(10), &spec);
        assert_eq!(cutoff, Slot::new(0));

        // The request horizon binds once history is deep enough.
        let deep_epoch = Epoch::new(spec.min_epochs_for_block_requests + 100);
        let cutoff = block_cutoff_slot::<E>(Epoch::new(1_000_000), deep_epoch, &spec);
        assert_eq!(cutoff, Epoch::new(100).start_slot(slots_per_epoch));

        // Saturation at genesis.
        let cutoff = block_cutoff_slot::<E>(Epoch::new(0), Epoch::new(1), &spec);
        assert_eq!(cutoff, Slot::new(0));
    }

    #[test]
    fn prune_history_respects_the_cutoff() {
        let (archiver, store) = archiver();
        let spec = ChainSpec::minimal();
        let slots_per_epoch = E::slots_per_epoch();

        for slot in 0..(4 * slots_per_epoch) {
            store.put_archive_block(&block_at_slot(slot)).unwrap();
        }

        // Finalized epoch 2 binds (the horizon is far ahead).
        let deleted = archiver
            .prune_history::<E>(
                Epoch::new(2),
                Epoch::new(spec.min_epochs_for_block_requests + 50),
                &spec,
            )
            .unwrap();
        assert_eq!(deleted as u64, 2 * slots_per_epoch);
        assert_eq!(
            store.oldest_archive_block_slot().unwrap(),
            Some(Epoch::new(2).start_slot(slots_per_epoch))
        );
    }
}
