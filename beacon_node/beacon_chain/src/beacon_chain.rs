//! The chain orchestrator: drives completed block inputs through state
//! transition, the execution engine, fork choice and persistence, and
//! performs the finality- and slot-driven maintenance that keeps every
//! cache bounded.

use crate::archiver::Archiver;
use crate::beacon_fork_choice_store::BeaconForkChoiceStore;
use crate::block_input::registry::BlockInputRegistry;
use crate::block_input::{BlockInput, SourceMeta};
use crate::canonical_head::{CachedHead, CanonicalHead, UpdateHeadReason};
use crate::chain_config::ChainConfig;
use crate::custody_context::CustodyContext;
use crate::errors::BeaconChainError;
use crate::execution_payload::{ExecutionEngine, PayloadStatus};
use crate::metrics;
use crate::observed_attesters::{
    ObservedAggregators, ObservedAttesters, ObservedPayloadAttesters, ObservedSyncAggregators,
    ObservedSyncContributors, SYNC_MESSAGE_RETAINED_SLOTS,
};
use crate::observed_block_producers::ObservedBlockProducers;
use crate::observed_data_sidecars::{ObservedBlobSidecars, ObservedColumnSidecars};
use crate::observed_execution_bids::ObservedExecutionBids;
use crate::observed_payload_envelopes::ObservedPayloadEnvelopes;
use crate::state_transition::{StateTransition, StateTransitionOpts};
use bls::BlsBatchVerifier;
use fork_choice::{AttestationFromBlock, ForkChoice, PayloadVerificationStatus};
use kzg::KzgVerifier;
use parking_lot::RwLock;
use slot_clock::SlotClock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use store::{HotColdDB, KeyValueStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use types::{
    AttesterSlashing, BeaconState, ChainSpec, Checkpoint, EthSpec, ExecutionBlockHash, Hash256,
    IndexedAttestation, SignedBeaconBlock, Slot,
};

/// The bundled compile-time types for a chain instance.
pub trait BeaconChainTypes: Send + Sync + 'static {
    type EthSpec: EthSpec;
    type SlotClock: SlotClock + 'static;
    type Store: KeyValueStore;
}

/// The heavy collaborators consumed through trait seams.
pub struct ChainCollaborators {
    pub kzg: Arc<dyn KzgVerifier>,
    pub bls: Arc<dyn BlsBatchVerifier>,
    pub state_transition: Arc<dyn StateTransition>,
    pub execution_engine: Arc<dyn ExecutionEngine>,
}

pub struct BeaconChain<T: BeaconChainTypes> {
    pub spec: Arc<ChainSpec>,
    pub config: ChainConfig,
    pub slot_clock: T::SlotClock,
    pub store: Arc<HotColdDB<T::Store>>,
    pub canonical_head: CanonicalHead<T::EthSpec>,
    pub block_input_registry: BlockInputRegistry<T::EthSpec, T::SlotClock>,
    pub custody_context: Arc<CustodyContext>,
    pub archiver: Archiver<T::Store>,

    /*
     * Seen caches, each owned by the topic's validation path.
     */
    pub observed_attesters: RwLock<ObservedAttesters>,
    pub observed_aggregators: RwLock<ObservedAggregators>,
    pub observed_payload_attesters: RwLock<ObservedPayloadAttesters>,
    pub observed_block_producers: RwLock<ObservedBlockProducers>,
    pub observed_blob_sidecars: RwLock<ObservedBlobSidecars>,
    pub observed_column_sidecars: RwLock<ObservedColumnSidecars>,
    pub observed_sync_contributors: RwLock<ObservedSyncContributors>,
    pub observed_sync_aggregators: RwLock<ObservedSyncAggregators>,
    pub observed_execution_bids: RwLock<ObservedExecutionBids>,
    pub observed_payload_envelopes: RwLock<ObservedPayloadEnvelopes>,

    /*
     * Collaborator seams.
     */
    pub kzg: Arc<dyn KzgVerifier>,
    pub bls: Arc<dyn BlsBatchVerifier>,
    pub state_transition: Arc<dyn StateTransition>,
    pub execution_engine: Arc<dyn ExecutionEngine>,

    /// Post-states by block root, feeding fork choice's checkpoint and
    /// balance reads for child blocks.
    state_cache: RwLock<HashMap<Hash256, BeaconState>>,
    /// The finalized checkpoint the last maintenance pass acted upon.
    pruned_finalized_checkpoint: RwLock<Checkpoint>,
}

impl<T: BeaconChainTypes> BeaconChain<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spec: Arc<ChainSpec>,
        config: ChainConfig,
        slot_clock: T::SlotClock,
        store: Arc<HotColdDB<T::Store>>,
        custody_context: Arc<CustodyContext>,
        anchor_block: Arc<SignedBeaconBlock>,
        anchor_state: BeaconState,
        collaborators: ChainCollaborators,
    ) -> Result<Self, BeaconChainError> {
        let anchor_root = anchor_block.canonical_root();

        let fc_store =
            BeaconForkChoiceStore::<T::EthSpec>::from_anchor_state(anchor_root, &anchor_state);
        let current_slot = slot_clock
            .now_or_genesis()
            .unwrap_or_else(|| slot_clock.genesis_slot());
        let fork_choice = ForkChoice::from_anchor(
            fc_store,
            anchor_root,
            &anchor_block,
            &anchor_state,
            Some(current_slot.max(anchor_state.slot)),
            &spec,
        )
        .map_err(|e| BeaconChainError::ForkChoiceError(format!("{e:?}")))?;

        store.put_block(&anchor_root, &anchor_block)?;

        let block_input_registry = BlockInputRegistry::new(
            slot_clock.clone(),
            custody_context.clone(),
            spec.clone(),
        );

        let archiver = Archiver::new(store.clone(), config.clone());

        let anchor_checkpoint = Checkpoint {
            epoch: anchor_state.slot.epoch(T::EthSpec::slots_per_epoch()),
            root: anchor_root,
        };

        let mut state_cache = HashMap::new();
        state_cache.insert(anchor_root, anchor_state);

        Ok(Self {
            spec,
            config,
            slot_clock,
            store,
            canonical_head: CanonicalHead::new(fork_choice),
            block_input_registry,
            custody_context,
            archiver,
            observed_attesters: RwLock::new(ObservedAttesters::default()),
            observed_aggregators: RwLock::new(ObservedAggregators::default()),
            observed_payload_attesters: RwLock::new(ObservedPayloadAttesters::default()),
            observed_block_producers: RwLock::new(ObservedBlockProducers::default()),
            observed_blob_sidecars: RwLock::new(ObservedBlobSidecars::default()),
            observed_column_sidecars: RwLock::new(ObservedColumnSidecars::default()),
            observed_sync_contributors: RwLock::new(ObservedSyncContributors::new(
                SYNC_MESSAGE_RETAINED_SLOTS,
            )),
            observed_sync_aggregators: RwLock::new(ObservedSyncAggregators::new(
                SYNC_MESSAGE_RETAINED_SLOTS,
            )),
            observed_execution_bids: RwLock::new(ObservedExecutionBids::default()),
            observed_payload_envelopes: RwLock::new(ObservedPayloadEnvelopes::default()),
            kzg: collaborators.kzg,
            bls: collaborators.bls,
            state_transition: collaborators.state_transition,
            execution_engine: collaborators.execution_engine,
            state_cache: RwLock::new(state_cache),
            pruned_finalized_checkpoint: RwLock::new(anchor_checkpoint),
        })
    }

    /// The wall-clock slot, or the genesis slot before genesis.
    pub fn current_slot(&self) -> Slot {
        self.slot_clock
            .now_or_genesis()
            .unwrap_or_else(|| self.slot_clock.genesis_slot())
    }

    pub fn head(&self) -> CachedHead {
        self.canonical_head.cached_head()
    }

    /// Returns the cached post-state for a block root, if held.
    pub fn state_for_block_root(&self, block_root: &Hash256) -> Option<BeaconState> {
        self.state_cache.read().get(block_root).cloned()
    }

    /// Wait for the input to gather its block and DA data, then import it.
    pub async fn process_block_when_complete(
        &self,
        input: Arc<BlockInput>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CachedHead, BeaconChainError> {
        input.wait_for_block_and_all_data(timeout, cancel).await?;
        self.process_block_input(input).await
    }

    /// Import a completed block input: state transition → execution engine
    /// → fork choice → persistence → head update → finality maintenance.
    pub async fn process_block_input(
        &self,
        input: Arc<BlockInput>,
    ) -> Result<CachedHead, BeaconChainError> {
        let _timer = metrics::start_timer(&metrics::BLOCK_PROCESSING_TIMES);

        input.check_complete()?;

        let block = input.get_block()?;
        let block_root = input.block_root();
        let current_slot = self.current_slot();

        // Re-imports are a no-op.
        if self
            .canonical_head
            .fork_choice_read_lock()
            .contains_block(&block_root)
        {
            return Ok(self.head());
        }

        let parent_state = self
            .state_for_block_root(&block.parent_root())
            .ok_or(BeaconChainError::MissingParentState(block.parent_root()))?;

        // State transition is a pure external function; an error here
        // means the block is invalid.
        let post_state = self.state_transition.apply(
            &parent_state,
            &block,
            StateTransitionOpts::default(),
        )?;

        // Submit the payload to the execution engine.
        let execution_block_hash = block.message().body.execution_block_hash;
        let payload_verification_status = if execution_block_hash == ExecutionBlockHash::zero() {
            PayloadVerificationStatus::Irrelevant
        } else {
            match self.execution_engine.new_payload(execution_block_hash)? {
                PayloadStatus::Valid => PayloadVerificationStatus::Verified,
                PayloadStatus::Syncing => PayloadVerificationStatus::Optimistic,
                PayloadStatus::Invalid { latest_valid_hash } => {
                    return Err(BeaconChainError::ExecutionPayloadInvalid {
                        block_root,
                        latest_valid_hash,
                    });
                }
            }
        };

        let block_delay = self
            .slot_clock
            .now_duration()
            .zip(self.slot_clock.start_of(block.slot()))
            .map(|(now, start)| now.saturating_sub(start))
            .unwrap_or_default();

        // Fork choice sees the block, then the attestations its body
        // carries, before any head re-computation.
        {
            let mut fork_choice = self.canonical_head.fork_choice_write_lock();
            fork_choice
                .on_block(
                    current_slot,
                    &block,
                    block_root,
                    block_delay,
                    &post_state,
                    payload_verification_status,
                    &self.spec,
                )
                .map_err(|e| BeaconChainError::ForkChoiceError(format!("{e:?}")))?;

            for attestation in &block.message().body.attestations {
                if let Err(e) = fork_choice.on_attestation(
                    current_slot,
                    attestation,
                    AttestationFromBlock::True,
                ) {
                    debug!(error = ?e, ?block_root, "Ignoring invalid attestation in block body");
                }
            }
        }

        // Persist the block and its sidecars, retrying transient store
        // failures with bounded backoff.
        self.persist_block_components(&input, &block, block_root)
            .await?;
        self.state_cache.write().insert(block_root, post_state);

        // Recompute the head. A fork-choice failure here is non-fatal:
        // the previous head stands and the next tick retries.
        let head = match self.canonical_head.update_head(
            current_slot,
            &self.spec,
            UpdateHeadReason::BlockImport,
        ) {
            Ok(update) => update.new_head,
            Err(_) => self.head(),
        };

        self.notify_forkchoice_updated(&head);
        self.check_finality();

        Ok(head)
    }

    async fn persist_block_components(
        &self,
        input: &BlockInput,
        block: &Arc<SignedBeaconBlock>,
        block_root: Hash256,
    ) -> Result<(), BeaconChainError> {
        let mut attempt = 0_u32;
        loop {
            let result = self.store.put_block(&block_root, block).and_then(|()| {
                let blobs = input.blobs();
                if !blobs.is_empty() {
                    self.store.put_blobs(&block_root, &blobs)?;
                }
                let columns = input.columns();
                if !columns.is_empty() {
                    self.store.put_data_columns(&block_root, &columns)?;
                }
                Ok(())
            });

            match result {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.config.import_max_retries => {
                    attempt += 1;
                    metrics::inc_counter(&metrics::BLOCK_PROCESSING_TRANSIENT_RETRIES);
                    warn!(
                        error = ?e,
                        attempt,
                        ?block_root,
                        "Transient store failure; retrying"
                    );
                    let backoff = Duration::from_millis(
                        self.config.import_retry_backoff_millis << attempt.min(8),
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn notify_forkchoice_updated(&self, head: &CachedHead) {
        let (head_hash, safe_hash, finalized_hash) = {
            let fork_choice = self.canonical_head.fork_choice_read_lock();
            let params = fork_choice.get_forkchoice_update_parameters();
            (
                params.head_hash,
                fork_choice.get_safe_execution_block_hash(),
                params.finalized_hash.unwrap_or_else(ExecutionBlockHash::zero),
            )
        };

        let Some(head_hash) = head_hash else {
            // Pre-merge head: nothing to tell the engine.
            return;
        };

        if let Err(e) = self
            .execution_engine
            .forkchoice_updated(head_hash, safe_hash, finalized_hash)
        {
            debug!(
                error = ?e,
                head = ?head.head_block_root,
                "forkchoiceUpdated failed"
            );
        }
    }

    /// Apply a gossip-verified attestation to fork choice.
    pub fn apply_attestation_to_fork_choice(
        &self,
        attestation: &IndexedAttestation,
    ) -> Result<(), BeaconChainError> {
        self.canonical_head
            .fork_choice_write_lock()
            .on_attestation(self.current_slot(), attestation, AttestationFromBlock::False)
            .map_err(|e| BeaconChainError::ForkChoiceError(format!("{e:?}")))
    }

    /// Apply a verified attester slashing: its validators stop counting in
    /// fork choice.
    pub fn apply_attester_slashing_to_fork_choice(&self, slashing: &AttesterSlashing) {
        self.canonical_head
            .fork_choice_write_lock()
            .on_attester_slashing(slashing);
    }

    /// Slot-driven maintenance: advance the watermarks of every slot- and
    /// epoch-scoped cache and recompute the head for the new slot.
    pub fn per_slot_maintenance(&self) {
        let current_slot = self.current_slot();
        let current_epoch = current_slot.epoch(T::EthSpec::slots_per_epoch());

        self.observed_attesters.write().prune(current_epoch);
        self.observed_aggregators.write().prune(current_epoch);
        self.observed_payload_attesters.write().prune(current_epoch);
        self.observed_sync_contributors.write().prune(current_slot);
        self.observed_sync_aggregators.write().prune(current_slot);
        self.observed_execution_bids.write().prune(current_slot);

        if let Err(e) =
            self.canonical_head
                .update_head(current_slot, &self.spec, UpdateHeadReason::SlotTick)
        {
            debug!(error = ?e, "Slot-tick head update failed");
        }

        self.check_finality();
    }

    /// If finality advanced since the last pass: archive the newly
    /// finalized segment, prune every finality-scoped structure and delete
    /// history behind the serving horizon.
    pub fn check_finality(&self) {
        let finalized_checkpoint = {
            let fork_choice = self.canonical_head.fork_choice_read_lock();
            fork_choice.finalized_checkpoint()
        };

        let previous = *self.pruned_finalized_checkpoint.read();
        if finalized_checkpoint.epoch <= previous.epoch {
            return;
        }

        let slots_per_epoch = T::EthSpec::slots_per_epoch();
        let finalized_slot = finalized_checkpoint.epoch.start_slot(slots_per_epoch);
        let previous_finalized_slot = previous.epoch.start_slot(slots_per_epoch);
        let current_epoch = self.current_slot().epoch(slots_per_epoch);

        debug!(
            epoch = %finalized_checkpoint.epoch,
            root = ?finalized_checkpoint.root,
            "New finalized checkpoint"
        );

        // The newly finalized canonical segment, deepest first.
        let mut finalized_roots: Vec<Hash256> = {
            let fork_choice = self.canonical_head.fork_choice_read_lock();
            fork_choice
                .proto_array()
                .iter_block_roots(&finalized_checkpoint.root)
                .take_while(|(_, slot)| *slot > previous_finalized_slot)
                .map(|(root, _)| root)
                .collect()
        };
        finalized_roots.reverse();

        let finalized_state = self.state_for_block_root(&finalized_checkpoint.root);
        if let Err(e) = self.archiver.process_finalized_checkpoint(
            &finalized_roots,
            finalized_state.as_ref(),
            finalized_checkpoint.epoch,
        ) {
            warn!(error = ?e, "Failed to archive finalized history");
        }

        if let Err(e) =
            self.archiver
                .prune_history::<T::EthSpec>(finalized_checkpoint.epoch, current_epoch, &self.spec)
        {
            warn!(error = ?e, "Failed to prune archive history");
        }

        // Finality-scoped pruning.
        self.block_input_registry.prune_finalized(finalized_slot);
        self.observed_block_producers.write().prune(finalized_slot);
        self.observed_blob_sidecars.write().prune(finalized_slot);
        self.observed_column_sidecars.write().prune(finalized_slot);
        self.observed_payload_envelopes.write().prune(finalized_slot);

        if let Err(e) = self.canonical_head.fork_choice_write_lock().prune() {
            warn!(error = ?e, "Failed to prune fork choice");
        }

        // Keep only states that can still parent a non-finalized block.
        // The finalized block's own state must survive: its children are
        // not finalized yet.
        let finalized_root = finalized_checkpoint.root;
        self.state_cache
            .write()
            .retain(|root, state| *root == finalized_root || state.slot >= finalized_slot);

        *self.pruned_finalized_checkpoint.write() = finalized_checkpoint;
    }

    /// Route a verified block into the registry, as `SourceMeta` records
    /// where it came from.
    pub fn import_block_part(
        &self,
        block: Arc<SignedBeaconBlock>,
        source: SourceMeta,
    ) -> Result<Arc<BlockInput>, BeaconChainError> {
        Ok(self
            .block_input_registry
            .add_block(block, source, false)?)
    }
}
