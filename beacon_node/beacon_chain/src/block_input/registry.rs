//! Process-wide map of block roots to their aggregation state.
//!
//! The registry is the only creator of `BlockInput`s: the first part to
//! mention a root (block or sidecar) creates the input, and all later
//! parts are dispatched to the same instance. The registry's lock also
//! provides the total order over adds for a given root.

use super::{BlockInput, BlockInputError, BlockInputMeta, SourceMeta};
use crate::CustodyContext;
use crate::metrics;
use parking_lot::Mutex;
use slot_clock::SlotClock;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;
use types::{
    BlobSidecar, ChainSpec, DataColumnSidecar, Epoch, EthSpec, Hash256, SignedBeaconBlock, Slot,
};

pub struct BlockInputRegistry<E: EthSpec, S: SlotClock> {
    inputs: Mutex<HashMap<Hash256, Arc<BlockInput>>>,
    slot_clock: S,
    custody_context: Arc<CustodyContext>,
    spec: Arc<ChainSpec>,
    _phantom: PhantomData<E>,
}

impl<E: EthSpec, S: SlotClock> BlockInputRegistry<E, S> {
    pub fn new(slot_clock: S, custody_context: Arc<CustodyContext>, spec: Arc<ChainSpec>) -> Self {
        Self {
            inputs: Mutex::new(HashMap::new()),
            slot_clock,
            custody_context,
            spec,
            _phantom: PhantomData,
        }
    }

    /// The epoch at which we require a data availability check in block
    /// processing. `None` if the Deneb fork is disabled.
    pub fn data_availability_boundary(&self) -> Option<Epoch> {
        let fork_epoch = self.spec.deneb_fork_epoch?;
        let current_epoch = self.slot_clock.now()?.epoch(E::slots_per_epoch());
        Some(std::cmp::max(
            fork_epoch,
            current_epoch
                .saturating_sub(self.spec.min_epochs_for_data_sidecars_requests(current_epoch)),
        ))
    }

    /// Returns true if the given epoch lies within the DA boundary and
    /// false otherwise.
    pub fn da_check_required_for_epoch(&self, block_epoch: Epoch) -> bool {
        self.data_availability_boundary()
            .is_some_and(|da_epoch| block_epoch >= da_epoch)
    }

    /// A block is DA-out-of-range when its fork carries sidecars but its
    /// epoch has fallen behind the retention horizon.
    fn da_out_of_range(&self, slot: Slot) -> bool {
        let block_epoch = slot.epoch(E::slots_per_epoch());
        self.spec.fork_name_at_epoch(block_epoch).deneb_enabled()
            && !self.da_check_required_for_epoch(block_epoch)
    }

    fn meta_from_parts(&self, slot: Slot, block_root: Hash256, parent_root: Hash256) -> BlockInputMeta {
        let fork_name = self.spec.fork_name_at_epoch(slot.epoch(E::slots_per_epoch()));
        let expected_columns = if fork_name.fulu_enabled() {
            self.custody_context.sampling_columns().to_vec()
        } else {
            vec![]
        };

        BlockInputMeta {
            fork_name,
            slot,
            block_root,
            parent_root,
            da_out_of_range: self.da_out_of_range(slot),
            time_created: self.slot_clock.now_duration().unwrap_or_default(),
            expected_columns,
        }
    }

    /// Atomic first-writer-wins: the first caller for a root creates the
    /// input and every subsequent caller observes the same instance.
    /// Header metadata conflicting with the committed instance is a
    /// construction error.
    pub fn get_or_create(
        &self,
        slot: Slot,
        block_root: Hash256,
        parent_root: Hash256,
    ) -> Result<Arc<BlockInput>, BlockInputError> {
        let mut inputs = self.inputs.lock();

        if let Some(existing) = inputs.get(&block_root) {
            if existing.slot() != slot || existing.parent_root() != parent_root {
                return Err(BlockInputError::InvalidConstruction(format!(
                    "conflicting header meta for {:?}: slot {} vs {}, parent {:?} vs {:?}",
                    block_root,
                    existing.slot(),
                    slot,
                    existing.parent_root(),
                    parent_root,
                )));
            }
            return Ok(existing.clone());
        }

        let input = Arc::new(BlockInput::new(self.meta_from_parts(
            slot,
            block_root,
            parent_root,
        )));
        inputs.insert(block_root, input.clone());
        Ok(input)
    }

    /// Dispatch a block, creating the input on first mention.
    pub fn add_block(
        &self,
        block: Arc<SignedBeaconBlock>,
        source: SourceMeta,
        throw_on_duplicate_add: bool,
    ) -> Result<Arc<BlockInput>, BlockInputError> {
        let input = self.get_or_create(block.slot(), block.canonical_root(), block.parent_root())?;
        input.add_block(block, source, throw_on_duplicate_add)?;
        Ok(input)
    }

    /// Dispatch a blob sidecar, deriving header metadata from its signed
    /// block header.
    pub fn add_blob(
        &self,
        blob: Arc<BlobSidecar>,
        source: SourceMeta,
    ) -> Result<Arc<BlockInput>, BlockInputError> {
        let input =
            self.get_or_create(blob.slot(), blob.block_root(), blob.block_parent_root())?;
        input.add_blob(blob, source)?;
        Ok(input)
    }

    /// Dispatch a column sidecar, deriving header metadata from its signed
    /// block header.
    pub fn add_column(
        &self,
        column: Arc<DataColumnSidecar>,
        source: SourceMeta,
    ) -> Result<Arc<BlockInput>, BlockInputError> {
        let input =
            self.get_or_create(column.slot(), column.block_root(), column.block_parent_root())?;
        input.add_column(column, source)?;
        Ok(input)
    }

    pub fn get(&self, block_root: &Hash256) -> Option<Arc<BlockInput>> {
        self.inputs.lock().get(block_root).cloned()
    }

    pub fn contains(&self, block_root: &Hash256) -> bool {
        self.inputs.lock().contains_key(block_root)
    }

    pub fn len(&self) -> usize {
        self.inputs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.lock().is_empty()
    }

    /// Evict every input at or below the finalized slot, failing their
    /// outstanding waiters.
    pub fn prune_finalized(&self, finalized_slot: Slot) {
        let mut pruned = 0_u64;
        self.inputs.lock().retain(|block_root, input| {
            if input.slot() <= finalized_slot {
                debug!(
                    ?block_root,
                    slot = %input.slot(),
                    %finalized_slot,
                    "Evicting finalized block input"
                );
                input.cancel_waiters();
                pruned += 1;
                false
            } else {
                true
            }
        });
        metrics::inc_counter_by(&metrics::BLOCK_INPUT_PRUNED, pruned);
    }
}
