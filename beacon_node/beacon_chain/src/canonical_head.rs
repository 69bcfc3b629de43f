//! Tracks the canonical head of the chain.
//!
//! The fork-choice DAG is only ever mutated behind this module's write
//! lock; other tasks read the copied `CachedHead` snapshot instead of
//! touching the proto array.

use crate::beacon_fork_choice_store::BeaconForkChoiceStore;
use crate::metrics;
use fork_choice::{Error as ForkChoiceError, ForkChoice};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use proto_array::ProtoArrayForkChoice;
use std::collections::HashMap;
use types::{ChainSpec, Checkpoint, EthSpec, ExecutionBlockHash, Hash256, Slot};

pub type BeaconForkChoice<E> = ForkChoice<BeaconForkChoiceStore<E>, E>;
pub type BeaconForkChoiceError<E> =
    ForkChoiceError<<BeaconForkChoiceStore<E> as fork_choice::ForkChoiceStore<E>>::Error>;

/// Why the head is being recomputed. Logged with every head change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum UpdateHeadReason {
    SlotTick,
    BlockImport,
    AttestationImport,
    PayloadValidation,
}

/// A lightweight, copied snapshot of the head, safe to hand to any task.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedHead {
    pub head_block_root: Hash256,
    pub head_slot: Slot,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub head_execution_block_hash: Option<ExecutionBlockHash>,
}

/// The result of a head update, including re-org information when the new
/// head does not descend from the old one.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadUpdate {
    pub old_head_root: Hash256,
    pub new_head: CachedHead,
    pub reorg_distance: Option<Slot>,
}

pub struct CanonicalHead<E: EthSpec> {
    fork_choice: RwLock<BeaconForkChoice<E>>,
    cached_head: RwLock<CachedHead>,
}

impl<E: EthSpec> CanonicalHead<E> {
    pub fn new(fork_choice: BeaconForkChoice<E>) -> Self {
        let view = fork_choice.cached_fork_choice_view();
        let head_block = fork_choice.get_block(&view.head_block_root);
        let cached_head = CachedHead {
            head_block_root: view.head_block_root,
            head_slot: head_block.as_ref().map(|b| b.slot).unwrap_or_default(),
            justified_checkpoint: view.justified_checkpoint,
            finalized_checkpoint: view.finalized_checkpoint,
            head_execution_block_hash: head_block
                .and_then(|b| b.execution_status.block_hash()),
        };

        Self {
            fork_choice: RwLock::new(fork_choice),
            cached_head: RwLock::new(cached_head),
        }
    }

    pub fn fork_choice_read_lock(&self) -> RwLockReadGuard<'_, BeaconForkChoice<E>> {
        self.fork_choice.read()
    }

    pub fn fork_choice_write_lock(&self) -> RwLockWriteGuard<'_, BeaconForkChoice<E>> {
        self.fork_choice.write()
    }

    /// The current head snapshot, without touching fork choice.
    pub fn cached_head(&self) -> CachedHead {
        self.cached_head.read().clone()
    }

    /// Recompute the head and refresh the cached snapshot.
    ///
    /// On fork-choice failure the previous head remains in place, the
    /// error counter is incremented and the error is returned; the next
    /// tick simply retries.
    pub fn update_head(
        &self,
        current_slot: Slot,
        spec: &ChainSpec,
        reason: UpdateHeadReason,
    ) -> Result<HeadUpdate, BeaconForkChoiceError<E>> {
        let mut fork_choice = self.fork_choice.write();
        let old_head = self.cached_head.read().clone();

        let new_head_root = match fork_choice.get_head(current_slot, spec) {
            Ok(root) => root,
            Err(e) => {
                metrics::inc_counter(&metrics::FORK_CHOICE_ERRORS);
                tracing::warn!(
                    error = ?e,
                    %reason,
                    head = ?old_head.head_block_root,
                    "Head update failed; retaining previous head"
                );
                return Err(e);
            }
        };

        let new_head_block = fork_choice.get_block(&new_head_root);
        let new_head = CachedHead {
            head_block_root: new_head_root,
            head_slot: new_head_block
                .as_ref()
                .map(|b| b.slot)
                .unwrap_or(old_head.head_slot),
            justified_checkpoint: fork_choice.justified_checkpoint(),
            finalized_checkpoint: fork_choice.finalized_checkpoint(),
            head_execution_block_hash: new_head_block
                .and_then(|b| b.execution_status.block_hash()),
        };

        let mut reorg_distance = None;
        if new_head_root != old_head.head_block_root
            && !fork_choice.is_descendant(old_head.head_block_root, new_head_root)
        {
            // The new head abandoned the old head's chain: a re-org. The
            // depth is the drop from the old head back to the fork point.
            if let Some((ancestor_root, ancestor_slot)) = find_common_ancestor(
                fork_choice.proto_array(),
                old_head.head_block_root,
                new_head_root,
            ) {
                let distance = old_head.head_slot.saturating_sub(ancestor_slot);
                metrics::inc_counter(&metrics::BEACON_REORGS_TOTAL);
                metrics::observe(&metrics::BEACON_REORG_DISTANCE, distance.as_u64() as f64);
                tracing::info!(
                    old_head = ?old_head.head_block_root,
                    new_head = ?new_head_root,
                    common_ancestor = ?ancestor_root,
                    distance = %distance,
                    %reason,
                    "Beacon chain re-org"
                );
                reorg_distance = Some(distance);
            }
        }

        metrics::set_gauge(&metrics::HEAD_SLOT, new_head.head_slot.as_u64() as i64);
        metrics::set_gauge(
            &metrics::FINALIZED_EPOCH,
            new_head.finalized_checkpoint.epoch.as_u64() as i64,
        );

        *self.cached_head.write() = new_head.clone();

        Ok(HeadUpdate {
            old_head_root: old_head.head_block_root,
            new_head,
            reorg_distance,
        })
    }
}

/// Walk both chains back through the proto array and return the deepest
/// block present in each.
fn find_common_ancestor(
    proto_array: &ProtoArrayForkChoice,
    old_head: Hash256,
    new_head: Hash256,
) -> Option<(Hash256, Slot)> {
    let old_chain: HashMap<Hash256, Slot> = proto_array.iter_block_roots(&old_head).collect();

    proto_array
        .iter_block_roots(&new_head)
        .find(|(root, _slot)| old_chain.contains_key(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon_fork_choice_store::BeaconForkChoiceStore;
    use bls::SignatureBytes;
    use fork_choice::PayloadVerificationStatus;
    use std::time::Duration;
    use types::{
        AttestationData, BeaconBlock, BeaconBlockBody, BeaconState, Checkpoint, Epoch,
        FixedBytesExtended, IndexedAttestation, MainnetEthSpec, SignedBeaconBlock,
    };

    type E = MainnetEthSpec;

    const BALANCE: u64 = 32_000_000_000;

    struct Harness {
        canonical_head: CanonicalHead<E>,
        spec: ChainSpec,
        anchor: Checkpoint,
        anchor_root: Hash256,
    }

    fn make_block(slot: u64, parent_root: Hash256, graffiti: u64) -> SignedBeaconBlock {
        SignedBeaconBlock {
            message: BeaconBlock {
                slot: Slot::new(slot),
                proposer_index: graffiti,
                parent_root,
                state_root: Hash256::from_low_u64_be(graffiti + 1_000_000),
                body: BeaconBlockBody::default(),
            },
            signature: SignatureBytes::empty(),
        }
    }

    fn state_at(slot: u64, anchor: Checkpoint) -> BeaconState {
        BeaconState {
            slot: Slot::new(slot),
            current_justified_checkpoint: anchor,
            finalized_checkpoint: anchor,
            balances: vec![BALANCE; 8],
        }
    }

    impl Harness {
        fn new() -> Self {
            let spec = ChainSpec::mainnet();
            let anchor_block = make_block(0, Hash256::zero(), 0);
            let anchor_root = anchor_block.canonical_root();
            let anchor = Checkpoint {
                epoch: Epoch::new(0),
                root: anchor_root,
            };
            let anchor_state = BeaconState {
                slot: Slot::new(0),
                current_justified_checkpoint: anchor,
                finalized_checkpoint: anchor,
                balances: vec![BALANCE; 8],
            };
            let store = BeaconForkChoiceStore::<E>::from_anchor_state(anchor_root, &anchor_state);
            let fork_choice = ForkChoice::from_anchor(
                store,
                anchor_root,
                &anchor_block,
                &anchor_state,
                Some(Slot::new(0)),
                &spec,
            )
            .unwrap();

            Self {
                canonical_head: CanonicalHead::new(fork_choice),
                spec,
                anchor,
                anchor_root,
            }
        }

        fn import_block(&self, block: &SignedBeaconBlock, current_slot: u64) -> Hash256 {
            let block_root = block.canonical_root();
            self.canonical_head
                .fork_choice_write_lock()
                .on_block(
                    Slot::new(current_slot),
                    block,
                    block_root,
                    Duration::from_secs(10),
                    &state_at(block.slot().as_u64(), self.anchor),
                    PayloadVerificationStatus::Irrelevant,
                    &self.spec,
                )
                .unwrap();
            block_root
        }

        fn vote(
            &self,
            validators: &[u64],
            block_root: Hash256,
            slot: u64,
            target_root: Hash256,
            current_slot: u64,
        ) {
            let attestation = IndexedAttestation {
                attesting_indices: validators.to_vec(),
                data: AttestationData {
                    slot: Slot::new(slot),
                    index: 0,
                    beacon_block_root: block_root,
                    source: self.anchor,
                    target: Checkpoint {
                        epoch: Slot::new(slot).epoch(E::slots_per_epoch()),
                        root: target_root,
                    },
                },
                signature: SignatureBytes::empty(),
            };
            self.canonical_head
                .fork_choice_write_lock()
                .on_attestation(
                    Slot::new(current_slot),
                    &attestation,
                    fork_choice::AttestationFromBlock::False,
                )
                .unwrap();
        }
    }

    #[test]
    fn head_advances_without_reorg_on_chain_extension() {
        let harness = Harness::new();
        let root_1 = harness.import_block(&make_block(1, harness.anchor_root, 1), 1);

        let update = harness
            .canonical_head
            .update_head(Slot::new(1), &harness.spec, UpdateHeadReason::BlockImport)
            .unwrap();

        assert_eq!(update.new_head.head_block_root, root_1);
        assert_eq!(update.reorg_distance, None);
        assert_eq!(harness.canonical_head.cached_head().head_block_root, root_1);
    }

    #[test]
    fn reorg_distance_measured_to_common_ancestor() {
        let harness = Harness::new();

        // Build the shared chain through the slot-48 ancestor, noting the
        // epoch-boundary block attestations must target.
        let mut parent = harness.anchor_root;
        let mut epoch_boundary_root = harness.anchor_root;
        for slot in 1..=48_u64 {
            parent = harness.import_block(&make_block(slot, parent, slot), slot);
            if slot == 32 {
                epoch_boundary_root = parent;
            }
        }
        let ancestor_root = parent;

        // Old chain: blocks at slots 49 and 50 ending at `x`.
        let block_49 = make_block(49, ancestor_root, 49);
        let root_49 = harness.import_block(&block_49, 49);
        let block_x = make_block(50, root_49, 50);
        let root_x = harness.import_block(&block_x, 50);

        // Two validators vote for the old head.
        harness.vote(&[0, 1], root_x, 50, epoch_boundary_root, 50);
        let update = harness
            .canonical_head
            .update_head(Slot::new(51), &harness.spec, UpdateHeadReason::SlotTick)
            .unwrap();
        assert_eq!(update.new_head.head_block_root, root_x);
        assert_eq!(update.new_head.head_slot, Slot::new(50));

        // Competing chain from the slot-48 ancestor: a block at slot 51.
        let block_y = make_block(51, ancestor_root, 51);
        let root_y = harness.import_block(&block_y, 51);

        // The other six validators vote for the competing chain,
        // outweighing the old head.
        harness.vote(&[2, 3, 4, 5, 6, 7], root_y, 51, epoch_boundary_root, 51);

        let update = harness
            .canonical_head
            .update_head(Slot::new(52), &harness.spec, UpdateHeadReason::SlotTick)
            .unwrap();

        assert_eq!(update.new_head.head_block_root, root_y);
        // Old head at slot 50, common ancestor at slot 48.
        assert_eq!(update.reorg_distance, Some(Slot::new(2)));
    }

    #[test]
    fn repeated_update_without_mutation_is_stable() {
        let harness = Harness::new();
        let root_1 = harness.import_block(&make_block(1, harness.anchor_root, 1), 1);

        let first = harness
            .canonical_head
            .update_head(Slot::new(1), &harness.spec, UpdateHeadReason::BlockImport)
            .unwrap();
        let second = harness
            .canonical_head
            .update_head(Slot::new(1), &harness.spec, UpdateHeadReason::SlotTick)
            .unwrap();

        assert_eq!(first.new_head.head_block_root, root_1);
        assert_eq!(first.new_head, second.new_head);
        assert_eq!(second.reorg_distance, None);
    }
}
