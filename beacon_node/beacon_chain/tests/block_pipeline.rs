//! End-to-end pipeline tests: gossip parts feed the block input registry,
//! completed inputs drive state transition, fork choice and persistence,
//! and finality prunes every bounded structure.

use beacon_chain::beacon_chain::{BeaconChain, ChainCollaborators};
use beacon_chain::block_verification::validate_block_for_gossip;
use beacon_chain::blob_verification::validate_blob_sidecar_for_gossip;
use beacon_chain::chain_config::ChainConfig;
use beacon_chain::custody_context::CustodyContext;
use beacon_chain::observed_data_sidecars::Observe;
use beacon_chain::state_transition::{
    StateTransition, StateTransitionError, StateTransitionOpts,
};
use beacon_chain::test_utils::{
    ChainHarness, EphemeralChainTypes, TEST_BALANCE, TEST_VALIDATOR_COUNT, make_block_raw,
};
use beacon_chain::{BlockSource, SourceMeta, execution_payload::AlwaysValidEngine};
use bls::AlwaysValidBls;
use kzg::TrustedKzg;
use parking_lot::Mutex;
use slot_clock::{ManualSlotClock, SlotClock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use store::{HotColdDB, MemoryStore};
use tokio_util::sync::CancellationToken;
use types::{
    BeaconState, ChainSpec, Checkpoint, Epoch, EthSpec, Hash256, KzgCommitment, MinimalEthSpec,
    SignedBeaconBlock, Slot,
};

type E = MinimalEthSpec;

fn source(harness: &ChainHarness) -> SourceMeta {
    harness.gossip_source("integration-peer")
}

#[tokio::test]
async fn block_with_blobs_flows_from_gossip_to_head() {
    let harness = ChainHarness::new();
    harness.set_slot(1);

    let block = harness.make_block(
        1,
        harness.anchor_root,
        vec![KzgCommitment::empty(), KzgCommitment::empty()],
    );
    let block_root = block.canonical_root();

    // Gossip admission for each part.
    let verified_block =
        validate_block_for_gossip(&harness.chain, block.clone(), None).unwrap();
    let blob_0 = validate_blob_sidecar_for_gossip::<_, Observe>(
        &harness.chain,
        harness.make_blob(&block, 0),
        None,
    )
    .unwrap();

    // A consumer starts waiting before the input is complete.
    let input = harness
        .chain
        .block_input_registry
        .add_block(verified_block.block, source(&harness), false)
        .unwrap();
    harness
        .chain
        .block_input_registry
        .add_blob(blob_0.into_inner(), source(&harness))
        .unwrap();
    assert!(!input.has_block_and_all_data());

    let chain = harness.chain.clone();
    let pending = {
        let input = input.clone();
        let cancel = CancellationToken::new();
        tokio::spawn(async move {
            chain
                .process_block_when_complete(input, Duration::from_secs(5), &cancel)
                .await
        })
    };

    // The last blob arrives and the pipeline runs to completion.
    let blob_1 = validate_blob_sidecar_for_gossip::<_, Observe>(
        &harness.chain,
        harness.make_blob(&block, 1),
        None,
    )
    .unwrap();
    harness
        .chain
        .block_input_registry
        .add_blob(blob_1.into_inner(), source(&harness))
        .unwrap();

    let head = pending.await.unwrap().unwrap();
    assert_eq!(head.head_block_root, block_root);
    assert_eq!(head.head_slot, Slot::new(1));

    // The block and its blobs were persisted to the hot store.
    assert!(harness.chain.store.get_block(&block_root).unwrap().is_some());
    assert_eq!(
        harness
            .chain
            .store
            .get_blobs(&block_root)
            .unwrap()
            .map(|blobs| blobs.len()),
        Some(2)
    );

    // Re-processing the same input is a clean no-op.
    let head_again = harness.chain.process_block_input(input).await.unwrap();
    assert_eq!(head_again.head_block_root, block_root);
}

/// A state-transition double that justifies the previous epoch and
/// finalizes the one before it, using real epoch-boundary block roots.
struct FinalityTransition {
    boundary_roots: Mutex<HashMap<u64, Hash256>>,
}

impl FinalityTransition {
    fn new(genesis_root: Hash256) -> Self {
        let mut boundary_roots = HashMap::new();
        boundary_roots.insert(0, genesis_root);
        Self {
            boundary_roots: Mutex::new(boundary_roots),
        }
    }
}

impl StateTransition for FinalityTransition {
    fn apply(
        &self,
        state: &BeaconState,
        block: &SignedBeaconBlock,
        _opts: StateTransitionOpts,
    ) -> Result<BeaconState, StateTransitionError> {
        let slots_per_epoch = E::slots_per_epoch();
        let mut post_state = state.clone();
        post_state.slot = block.slot();

        let epoch = block.slot().epoch(slots_per_epoch).as_u64();
        let mut boundaries = self.boundary_roots.lock();
        if block.slot() == Slot::new(epoch * slots_per_epoch) {
            boundaries.insert(epoch, block.canonical_root());
        }

        if epoch >= 1
            && let Some(root) = boundaries.get(&(epoch - 1))
        {
            post_state.current_justified_checkpoint = Checkpoint {
                epoch: Epoch::new(epoch - 1),
                root: *root,
            };
        }
        if epoch >= 2
            && let Some(root) = boundaries.get(&(epoch - 2))
        {
            post_state.finalized_checkpoint = Checkpoint {
                epoch: Epoch::new(epoch - 2),
                root: *root,
            };
        }

        Ok(post_state)
    }
}

fn finality_chain() -> (Arc<BeaconChain<EphemeralChainTypes>>, Hash256) {
    let spec = Arc::new(ChainSpec::minimal());
    let slot_clock = ManualSlotClock::new(
        Slot::new(0),
        Duration::from_secs(0),
        spec.seconds_per_slot(),
    );
    let anchor_block = Arc::new(make_block_raw(0, Hash256::ZERO, vec![]));
    let anchor_root = anchor_block.canonical_root();
    let anchor_checkpoint = Checkpoint {
        epoch: Epoch::new(0),
        root: anchor_root,
    };
    let anchor_state = BeaconState {
        slot: Slot::new(0),
        current_justified_checkpoint: anchor_checkpoint,
        finalized_checkpoint: anchor_checkpoint,
        balances: vec![TEST_BALANCE; TEST_VALIDATOR_COUNT],
    };
    let custody = Arc::new(CustodyContext::new([3; 32], spec.custody_requirement, &spec));

    let chain = BeaconChain::new(
        spec,
        ChainConfig::default(),
        slot_clock,
        Arc::new(HotColdDB::new(MemoryStore::open())),
        custody,
        anchor_block,
        anchor_state,
        ChainCollaborators {
            kzg: Arc::new(TrustedKzg),
            bls: Arc::new(AlwaysValidBls),
            state_transition: Arc::new(FinalityTransition::new(anchor_root)),
            execution_engine: Arc::new(AlwaysValidEngine),
        },
    )
    .unwrap();

    (Arc::new(chain), anchor_root)
}

#[tokio::test]
async fn finality_advances_and_prunes_the_pipeline() {
    let (chain, anchor_root) = finality_chain();
    let slots_per_epoch = E::slots_per_epoch();

    let mut parent_root = anchor_root;
    let mut roots_by_slot = HashMap::new();

    // Import three epochs of blocks. Epoch 2's boundary block carries a
    // state finalizing epoch 0; epoch 3's finalizes epoch 1.
    for slot in 1..=(3 * slots_per_epoch) {
        chain.slot_clock.set_slot(slot);
        let block = Arc::new(make_block_raw(slot, parent_root, vec![]));
        parent_root = block.canonical_root();
        roots_by_slot.insert(slot, parent_root);

        let input = chain
            .block_input_registry
            .add_block(
                block,
                SourceMeta {
                    source: BlockSource::RangeSync,
                    peer_id: None,
                    seen_timestamp: Duration::from_secs(slot),
                },
                false,
            )
            .unwrap();
        chain.process_block_input(input).await.unwrap();
    }

    // Finality reached epoch 1 and is monotone.
    let finalized = chain.canonical_head.fork_choice_read_lock().finalized_checkpoint();
    assert_eq!(finalized.epoch, Epoch::new(1));
    assert_eq!(finalized.root, roots_by_slot[&slots_per_epoch]);

    // The head is the tip of the imported chain.
    assert_eq!(
        chain.head().head_block_root,
        roots_by_slot[&(3 * slots_per_epoch)]
    );

    // Inputs at or below the finalized slot were evicted.
    let finalized_slot = slots_per_epoch;
    for slot in 1..=finalized_slot {
        assert!(
            !chain.block_input_registry.contains(&roots_by_slot[&slot]),
            "input at finalized slot {slot} should be pruned"
        );
    }
    assert!(
        chain
            .block_input_registry
            .contains(&roots_by_slot[&(finalized_slot + 1)])
    );

    // Finalized blocks moved from the hot store into the slot-keyed
    // archive.
    for slot in 1..=finalized_slot {
        let root = roots_by_slot[&slot];
        assert!(chain.store.get_block(&root).unwrap().is_none());
        assert_eq!(
            chain
                .store
                .get_archive_block(Slot::new(slot))
                .unwrap()
                .map(|b| b.canonical_root()),
            Some(root)
        );
    }
    assert!(
        chain
            .store
            .get_block(&roots_by_slot[&(finalized_slot + 1)])
            .unwrap()
            .is_some()
    );

    // The block-producer cache watermark advanced with finality.
    assert!(
        chain
            .observed_block_producers
            .read()
            .proposer_has_been_observed(Slot::new(finalized_slot), 0)
            .is_err()
    );

    // Slot-driven maintenance advances the short-horizon watermarks too.
    chain.per_slot_maintenance();
    assert!(
        chain
            .observed_execution_bids
            .write()
            .observe_bid(0, Slot::new(1), Hash256::ZERO)
            .is_err()
    );
    assert_eq!(
        chain.head().head_block_root,
        roots_by_slot[&(3 * slots_per_epoch)]
    );
}

#[tokio::test]
async fn missing_parent_state_fails_import() {
    let harness = ChainHarness::new();
    harness.set_slot(2);

    // A block whose parent was never imported.
    let orphan_parent = harness.make_block(1, Hash256::repeat_byte(0x55), vec![]);
    let block = harness.make_block(2, orphan_parent.canonical_root(), vec![]);
    let input = harness
        .chain
        .block_input_registry
        .add_block(block, source(&harness), false)
        .unwrap();

    let result = harness.chain.process_block_input(input).await;
    assert!(matches!(
        result,
        Err(beacon_chain::BeaconChainError::MissingParentState(_))
    ));
}
