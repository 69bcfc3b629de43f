//! Utilities for driving a chain in tests: an ephemeral chain backed by
//! the in-memory store, the manual clock and accept-all crypto doubles,
//! plus builders for blocks and sidecars.

use crate::beacon_chain::{BeaconChain, BeaconChainTypes, ChainCollaborators};
use crate::block_input::{BlockSource, SourceMeta};
use crate::chain_config::ChainConfig;
use crate::custody_context::CustodyContext;
use crate::state_transition::SlotAdvancingStateTransition;
use crate::{PeerId, execution_payload::AlwaysValidEngine};
use bls::{AlwaysValidBls, SignatureBytes};
use kzg::TrustedKzg;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slot_clock::{ManualSlotClock, SlotClock};
use std::sync::Arc;
use std::time::Duration;
use store::{HotColdDB, MemoryStore};
use types::{
    BeaconBlock, BeaconBlockBody, BeaconState, Blob, BlobSidecar, ChainSpec, Checkpoint,
    DataColumnSidecar, ExecutionBlockHash, Hash256, KzgCommitment, KzgProof, MinimalEthSpec,
    SignedBeaconBlock, Slot,
};

pub const TEST_BALANCE: u64 = 32_000_000_000;
pub const TEST_VALIDATOR_COUNT: usize = 16;

pub struct EphemeralChainTypes;

impl BeaconChainTypes for EphemeralChainTypes {
    type EthSpec = MinimalEthSpec;
    type SlotClock = ManualSlotClock;
    type Store = MemoryStore;
}

pub type TestBeaconChain = BeaconChain<EphemeralChainTypes>;

pub struct ChainHarness {
    pub chain: Arc<TestBeaconChain>,
    pub anchor_block: Arc<SignedBeaconBlock>,
    pub anchor_root: Hash256,
    pub spec: Arc<ChainSpec>,
    /// Seeded so fixture payloads and roots are reproducible per test.
    pub rng: Mutex<StdRng>,
}

impl ChainHarness {
    pub fn new() -> Self {
        Self::with_spec(ChainSpec::minimal())
    }

    pub fn with_spec(spec: ChainSpec) -> Self {
        let spec = Arc::new(spec);
        let slot_clock = ManualSlotClock::new(
            Slot::new(0),
            Duration::from_secs(0),
            spec.seconds_per_slot(),
        );

        let anchor_block = Arc::new(make_block_raw(0, Hash256::ZERO, vec![]));
        let anchor_root = anchor_block.canonical_root();
        let anchor_checkpoint = Checkpoint {
            epoch: types::Epoch::new(0),
            root: anchor_root,
        };
        let anchor_state = BeaconState {
            slot: Slot::new(0),
            current_justified_checkpoint: anchor_checkpoint,
            finalized_checkpoint: anchor_checkpoint,
            balances: vec![TEST_BALANCE; TEST_VALIDATOR_COUNT],
        };

        let store = Arc::new(HotColdDB::new(MemoryStore::open()));
        let custody_context = Arc::new(CustodyContext::new(
            [7; 32],
            spec.custody_requirement,
            &spec,
        ));

        let chain = BeaconChain::new(
            spec.clone(),
            ChainConfig::default(),
            slot_clock,
            store,
            custody_context,
            anchor_block.clone(),
            anchor_state,
            ChainCollaborators {
                kzg: Arc::new(TrustedKzg),
                bls: Arc::new(AlwaysValidBls),
                state_transition: Arc::new(SlotAdvancingStateTransition),
                execution_engine: Arc::new(AlwaysValidEngine),
            },
        )
        .expect("harness chain should build");

        Self {
            chain: Arc::new(chain),
            anchor_block,
            anchor_root,
            spec,
            rng: Mutex::new(StdRng::seed_from_u64(0x6c0de)),
        }
    }

    /// An arbitrary root that is distinct from everything else the
    /// harness hands out.
    pub fn random_root(&self) -> Hash256 {
        Hash256::from_slice(&self.rng.lock().random::<[u8; 32]>())
    }

    fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut rng = self.rng.lock();
        (0..len).map(|_| rng.random()).collect()
    }

    pub fn set_slot(&self, slot: u64) {
        self.chain.slot_clock.set_slot(slot);
    }

    pub fn current_slot(&self) -> Slot {
        self.chain.current_slot()
    }

    /// A block extending `parent_root` with the given blob commitments.
    pub fn make_block(
        &self,
        slot: u64,
        parent_root: Hash256,
        commitments: Vec<KzgCommitment>,
    ) -> Arc<SignedBeaconBlock> {
        Arc::new(make_block_raw(slot, parent_root, commitments))
    }

    pub fn make_blob(&self, block: &SignedBeaconBlock, index: u64) -> Arc<BlobSidecar> {
        Arc::new(BlobSidecar {
            index,
            blob: Blob::new(self.random_bytes(64)),
            kzg_commitment: block.message().body.blob_kzg_commitments[index as usize],
            kzg_proof: KzgProof::empty(),
            signed_block_header: block.signed_block_header(),
        })
    }

    pub fn make_column(&self, block: &SignedBeaconBlock, index: u64) -> Arc<DataColumnSidecar> {
        let num_blobs = block.num_expected_blobs();
        Arc::new(DataColumnSidecar {
            index,
            column: (0..num_blobs)
                .map(|_| kzg::Cell::new(self.random_bytes(32)))
                .collect(),
            kzg_commitments: block.message().body.blob_kzg_commitments.clone(),
            kzg_proofs: vec![KzgProof::empty(); num_blobs],
            signed_block_header: block.signed_block_header(),
        })
    }

    pub fn gossip_source(&self, peer: &str) -> SourceMeta {
        SourceMeta {
            source: BlockSource::Gossip,
            peer_id: Some(PeerId(peer.to_string())),
            seen_timestamp: self
                .chain
                .slot_clock
                .now_duration()
                .unwrap_or_default(),
        }
    }
}

impl Default for ChainHarness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn make_block_raw(
    slot: u64,
    parent_root: Hash256,
    commitments: Vec<KzgCommitment>,
) -> SignedBeaconBlock {
    SignedBeaconBlock {
        message: BeaconBlock {
            slot: Slot::new(slot),
            proposer_index: slot % (TEST_VALIDATOR_COUNT as u64),
            parent_root,
            state_root: Hash256::repeat_byte(slot as u8),
            body: BeaconBlockBody {
                attestations: vec![],
                blob_kzg_commitments: commitments,
                execution_block_hash: ExecutionBlockHash::zero(),
            },
        },
        signature: SignatureBytes::empty(),
    }
}
