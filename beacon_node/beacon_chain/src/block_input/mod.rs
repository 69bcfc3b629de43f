//! Per-root aggregation of a block and its data-availability sidecars.
//!
//! A `BlockInput` is created on the first mention of a block root from any
//! ingress path (gossip, range sync, by-root lookup, engine recovery or
//! the API) and accumulates parts until the block and all of its expected
//! DA data are present. Consumers await completion through the three
//! waitable signals; producers feed parts in through the registry, which
//! serializes all mutation per root.

pub mod completion;
pub mod registry;

use crate::PeerId;
use crate::metrics;
use completion::{CompletionSignal, WaitError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use types::{
    BlobSidecar, ColumnIndex, DataColumnSidecar, ForkName, Hash256, SignedBeaconBlock, Slot,
};

/// Where a block or sidecar entered the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum BlockSource {
    Gossip,
    RangeSync,
    ByRootLookup,
    EngineRecovery,
    Api,
}

/// Provenance attached to every part fed into a block input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMeta {
    pub source: BlockSource,
    pub peer_id: Option<PeerId>,
    /// Time the part was first seen, as a duration since the UNIX epoch.
    pub seen_timestamp: Duration,
}

/// The DA shape of an input, fixed at creation from the block's fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockInputType {
    /// Pre-Deneb: no DA sidecars exist.
    PreData,
    /// Deneb through Electra: blob sidecars, one per commitment.
    Blobs,
    /// Fulu onwards: column sidecars, one per custodied column.
    Columns,
}

/// Routing classes for block-input failures: construction errors are
/// caller bugs, consistency errors feed peer scoring, incomplete just
/// means the data has not arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Construction,
    Consistency,
    Incomplete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockInputError {
    /// Caller bug: duplicate add or conflicting construction metadata.
    InvalidConstruction(String),
    /// The requested data has not fully arrived.
    IncompleteData {
        expected: usize,
        received: usize,
    },
    MissingBlock,
    MissingTimeComplete,
    /// A part claimed a different block root than this input's.
    MismatchedBlockRoot {
        expected: Hash256,
        received: Hash256,
        peer_id: Option<PeerId>,
        source: BlockSource,
    },
    /// A sidecar's commitment does not match the block body's commitment
    /// at that index.
    MismatchedKzgCommitment {
        sidecar_index: u64,
        commitment_index: usize,
    },
}

impl BlockInputError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BlockInputError::InvalidConstruction(_) => ErrorCategory::Construction,
            BlockInputError::IncompleteData { .. }
            | BlockInputError::MissingBlock
            | BlockInputError::MissingTimeComplete => ErrorCategory::Incomplete,
            BlockInputError::MismatchedBlockRoot { .. }
            | BlockInputError::MismatchedKzgCommitment { .. } => ErrorCategory::Consistency,
        }
    }
}

/// Creation metadata for a block input, derivable from any part (the
/// block itself, or a sidecar's signed block header).
#[derive(Debug, Clone, PartialEq)]
pub struct BlockInputMeta {
    pub fork_name: ForkName,
    pub slot: Slot,
    pub block_root: Hash256,
    pub parent_root: Hash256,
    /// The block is older than the DA retention horizon; data completeness
    /// is no longer required.
    pub da_out_of_range: bool,
    pub time_created: Duration,
    /// The column indices this node custodies, fixing the completion set
    /// for `Columns` inputs. Ignored for other input types.
    pub expected_columns: Vec<ColumnIndex>,
}

enum BlockInputBody {
    PreData,
    Blobs {
        /// Number of blobs the block commits to; unknown until the block
        /// arrives.
        expected: Option<usize>,
        blobs: BTreeMap<u64, (Arc<BlobSidecar>, SourceMeta)>,
    },
    Columns {
        expected: Vec<ColumnIndex>,
        columns: BTreeMap<ColumnIndex, (Arc<DataColumnSidecar>, SourceMeta)>,
    },
}

struct BlockInputState {
    block: Option<(Arc<SignedBeaconBlock>, SourceMeta)>,
    body: BlockInputBody,
    time_complete: Option<Duration>,
}

/// Log-friendly snapshot of an input's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockInputLogMeta {
    pub slot: Slot,
    pub block_root: Hash256,
    pub time_created_sec: u64,
    pub has_block: bool,
    pub expected_data: Option<usize>,
    pub received_data: usize,
}

pub struct BlockInput {
    fork_name: ForkName,
    slot: Slot,
    block_root: Hash256,
    parent_root: Hash256,
    da_out_of_range: bool,
    time_created: Duration,
    state: RwLock<BlockInputState>,
    block_signal: CompletionSignal<Arc<SignedBeaconBlock>>,
    all_data_signal: CompletionSignal<()>,
    block_and_all_data_signal: CompletionSignal<Arc<SignedBeaconBlock>>,
}

impl BlockInput {
    pub fn new(meta: BlockInputMeta) -> Self {
        let body = if meta.fork_name.fulu_enabled() {
            BlockInputBody::Columns {
                expected: meta.expected_columns,
                columns: BTreeMap::new(),
            }
        } else if meta.fork_name.deneb_enabled() {
            BlockInputBody::Blobs {
                expected: None,
                blobs: BTreeMap::new(),
            }
        } else {
            BlockInputBody::PreData
        };

        let input = Self {
            fork_name: meta.fork_name,
            slot: meta.slot,
            block_root: meta.block_root,
            parent_root: meta.parent_root,
            da_out_of_range: meta.da_out_of_range,
            time_created: meta.time_created,
            state: RwLock::new(BlockInputState {
                block: None,
                body,
                time_complete: None,
            }),
            block_signal: CompletionSignal::new(),
            all_data_signal: CompletionSignal::new(),
            block_and_all_data_signal: CompletionSignal::new(),
        };

        metrics::inc_counter_vec(
            &metrics::BLOCK_INPUT_CREATED,
            &[input.input_type_label()],
        );

        // Pre-data and DA-expired inputs have no data requirement at all.
        {
            let mut state = input.state.write();
            input.update_completion(&mut state, meta.time_created);
        }

        input
    }

    pub fn fork_name(&self) -> ForkName {
        self.fork_name
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn block_root(&self) -> Hash256 {
        self.block_root
    }

    pub fn parent_root(&self) -> Hash256 {
        self.parent_root
    }

    pub fn da_out_of_range(&self) -> bool {
        self.da_out_of_range
    }

    pub fn time_created(&self) -> Duration {
        self.time_created
    }

    pub fn input_type(&self) -> BlockInputType {
        match &self.state.read().body {
            BlockInputBody::PreData => BlockInputType::PreData,
            BlockInputBody::Blobs { .. } => BlockInputType::Blobs,
            BlockInputBody::Columns { .. } => BlockInputType::Columns,
        }
    }

    fn input_type_label(&self) -> &'static str {
        match &*self.state.read() {
            BlockInputState {
                body: BlockInputBody::PreData,
                ..
            } => "pre_data",
            BlockInputState {
                body: BlockInputBody::Blobs { .. },
                ..
            } => "blobs",
            BlockInputState {
                body: BlockInputBody::Columns { .. },
                ..
            } => "columns",
        }
    }

    /// Attach the block, revalidating any sidecars stored before it
    /// arrived against the block body's commitments.
    pub fn add_block(
        &self,
        block: Arc<SignedBeaconBlock>,
        source: SourceMeta,
        throw_on_duplicate_add: bool,
    ) -> Result<(), BlockInputError> {
        let mut state = self.state.write();

        let block_root = block.canonical_root();
        if block_root != self.block_root {
            // Either this block or the parts that created the input lie
            // about the root; attribute the earliest gossip-facing part.
            let (peer_id, part_source) = first_part_attribution(&state, &source);
            return Err(BlockInputError::MismatchedBlockRoot {
                expected: self.block_root,
                received: block_root,
                peer_id,
                source: part_source,
            });
        }

        if state.block.is_some() {
            if throw_on_duplicate_add {
                return Err(BlockInputError::InvalidConstruction(format!(
                    "duplicate block add for {:?}",
                    self.block_root
                )));
            }
            return Ok(());
        }

        // Sidecars accepted before the block were only speculatively
        // consistent; check them against the body now.
        let commitments = &block.message().body.blob_kzg_commitments;
        match &mut state.body {
            BlockInputBody::PreData => {}
            BlockInputBody::Blobs { expected, blobs } => {
                for (index, (blob, _source)) in blobs.iter() {
                    let commitment = commitments
                        .get(*index as usize)
                        .ok_or(BlockInputError::MismatchedKzgCommitment {
                            sidecar_index: *index,
                            commitment_index: *index as usize,
                        })?;
                    if blob.kzg_commitment != *commitment {
                        return Err(BlockInputError::MismatchedKzgCommitment {
                            sidecar_index: *index,
                            commitment_index: *index as usize,
                        });
                    }
                }
                *expected = Some(commitments.len());
            }
            BlockInputBody::Columns { columns, .. } => {
                for (index, (column, _source)) in columns.iter() {
                    if let Some(commitment_index) = mismatched_column_commitment(column, commitments)
                    {
                        return Err(BlockInputError::MismatchedKzgCommitment {
                            sidecar_index: *index,
                            commitment_index,
                        });
                    }
                }
            }
        }

        let seen_timestamp = source.seen_timestamp;
        state.block = Some((block.clone(), source));
        self.block_signal.resolve(block);
        self.update_completion(&mut state, seen_timestamp);

        Ok(())
    }

    /// Store a blob sidecar. Duplicates at an already-filled index are
    /// ignored; the first sidecar wins.
    pub fn add_blob(
        &self,
        blob: Arc<BlobSidecar>,
        source: SourceMeta,
    ) -> Result<(), BlockInputError> {
        let blob_root = blob.block_root();
        if blob_root != self.block_root {
            return Err(BlockInputError::MismatchedBlockRoot {
                expected: self.block_root,
                received: blob_root,
                peer_id: source.peer_id,
                source: source.source,
            });
        }

        let mut state = self.state.write();

        // Once the block is known the commitment can be checked
        // immediately instead of speculatively stored.
        if let Some((block, _)) = &state.block {
            let commitments = &block.message().body.blob_kzg_commitments;
            let matches = commitments
                .get(blob.index as usize)
                .is_some_and(|commitment| blob.kzg_commitment == *commitment);
            if !matches {
                return Err(BlockInputError::MismatchedKzgCommitment {
                    sidecar_index: blob.index,
                    commitment_index: blob.index as usize,
                });
            }
        }

        let BlockInputBody::Blobs { blobs, .. } = &mut state.body else {
            return Err(BlockInputError::InvalidConstruction(format!(
                "blob sidecar for {} input at {:?}",
                self.fork_name, self.block_root
            )));
        };

        if blobs.contains_key(&blob.index) {
            debug!(
                block_root = ?self.block_root,
                index = blob.index,
                source = %source.source,
                "Ignoring duplicate blob sidecar"
            );
            return Ok(());
        }

        let seen_timestamp = source.seen_timestamp;
        blobs.insert(blob.index, (blob, source));
        self.update_completion(&mut state, seen_timestamp);

        Ok(())
    }

    /// Store a column sidecar. Duplicates at an already-filled index are
    /// ignored; the first sidecar wins.
    pub fn add_column(
        &self,
        column: Arc<DataColumnSidecar>,
        source: SourceMeta,
    ) -> Result<(), BlockInputError> {
        let column_root = column.block_root();
        if column_root != self.block_root {
            return Err(BlockInputError::MismatchedBlockRoot {
                expected: self.block_root,
                received: column_root,
                peer_id: source.peer_id,
                source: source.source,
            });
        }

        let mut state = self.state.write();

        if let Some((block, _)) = &state.block {
            let commitments = &block.message().body.blob_kzg_commitments;
            if let Some(commitment_index) = mismatched_column_commitment(&column, commitments) {
                return Err(BlockInputError::MismatchedKzgCommitment {
                    sidecar_index: column.index,
                    commitment_index,
                });
            }
        }

        let BlockInputBody::Columns { columns, .. } = &mut state.body else {
            return Err(BlockInputError::InvalidConstruction(format!(
                "column sidecar for {} input at {:?}",
                self.fork_name, self.block_root
            )));
        };

        if columns.contains_key(&column.index) {
            debug!(
                block_root = ?self.block_root,
                index = column.index,
                source = %source.source,
                "Ignoring duplicate column sidecar"
            );
            return Ok(());
        }

        let seen_timestamp = source.seen_timestamp;
        columns.insert(column.index, (column, source));
        self.update_completion(&mut state, seen_timestamp);

        Ok(())
    }

    pub fn has_block(&self) -> bool {
        self.state.read().block.is_some()
    }

    pub fn has_all_data(&self) -> bool {
        self.has_all_data_locked(&self.state.read())
    }

    pub fn has_block_and_all_data(&self) -> bool {
        let state = self.state.read();
        state.block.is_some() && self.has_all_data_locked(&state)
    }

    /// Verify the input is ready for import, naming what is missing.
    pub fn check_complete(&self) -> Result<(), BlockInputError> {
        let state = self.state.read();
        if state.block.is_none() {
            return Err(BlockInputError::MissingBlock);
        }
        if !self.has_all_data_locked(&state) {
            let (expected, received) = match &state.body {
                BlockInputBody::PreData => (0, 0),
                BlockInputBody::Blobs { expected, blobs } => {
                    (expected.unwrap_or_default(), blobs.len())
                }
                BlockInputBody::Columns { expected, columns } => {
                    (expected.len(), columns.len())
                }
            };
            return Err(BlockInputError::IncompleteData { expected, received });
        }
        Ok(())
    }

    pub fn get_block(&self) -> Result<Arc<SignedBeaconBlock>, BlockInputError> {
        self.state
            .read()
            .block
            .as_ref()
            .map(|(block, _)| block.clone())
            .ok_or(BlockInputError::MissingBlock)
    }

    pub fn get_time_complete(&self) -> Result<Duration, BlockInputError> {
        self.state
            .read()
            .time_complete
            .ok_or(BlockInputError::MissingTimeComplete)
    }

    /// The blob sidecars gathered so far, ascending by index.
    pub fn blobs(&self) -> Vec<Arc<BlobSidecar>> {
        match &self.state.read().body {
            BlockInputBody::Blobs { blobs, .. } => {
                blobs.values().map(|(blob, _)| blob.clone()).collect()
            }
            _ => vec![],
        }
    }

    /// The column sidecars gathered so far, ascending by index.
    pub fn columns(&self) -> Vec<Arc<DataColumnSidecar>> {
        match &self.state.read().body {
            BlockInputBody::Columns { columns, .. } => columns
                .values()
                .map(|(column, _)| column.clone())
                .collect(),
            _ => vec![],
        }
    }

    /// Indices of the sidecars gathered so far.
    pub fn received_indices(&self) -> Vec<u64> {
        match &self.state.read().body {
            BlockInputBody::PreData => vec![],
            BlockInputBody::Blobs { blobs, .. } => blobs.keys().copied().collect(),
            BlockInputBody::Columns { columns, .. } => columns.keys().copied().collect(),
        }
    }

    pub async fn wait_for_block(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Arc<SignedBeaconBlock>, WaitError> {
        self.block_signal.wait(timeout, cancel).await
    }

    pub async fn wait_for_all_data(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), WaitError> {
        self.all_data_signal.wait(timeout, cancel).await
    }

    pub async fn wait_for_block_and_all_data(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Arc<SignedBeaconBlock>, WaitError> {
        self.block_and_all_data_signal.wait(timeout, cancel).await
    }

    /// Fail all outstanding waiters. Called by the registry on eviction.
    pub(crate) fn cancel_waiters(&self) {
        self.block_signal.cancel();
        self.all_data_signal.cancel();
        self.block_and_all_data_signal.cancel();
    }

    pub fn get_log_meta(&self) -> BlockInputLogMeta {
        let state = self.state.read();
        let (expected_data, received_data) = match &state.body {
            BlockInputBody::PreData => (Some(0), 0),
            BlockInputBody::Blobs { expected, blobs } => (*expected, blobs.len()),
            BlockInputBody::Columns { expected, columns } => {
                (Some(expected.len()), columns.len())
            }
        };
        BlockInputLogMeta {
            slot: self.slot,
            block_root: self.block_root,
            time_created_sec: self.time_created.as_secs(),
            has_block: state.block.is_some(),
            expected_data,
            received_data,
        }
    }

    fn has_all_data_locked(&self, state: &BlockInputState) -> bool {
        if self.da_out_of_range {
            return true;
        }
        match &state.body {
            BlockInputBody::PreData => true,
            BlockInputBody::Blobs { expected, blobs } => {
                expected.is_some_and(|expected| blobs.len() == expected)
            }
            BlockInputBody::Columns { expected, columns } => {
                expected.iter().all(|index| columns.contains_key(index))
            }
        }
    }

    /// Resolve whichever completion signals the current state satisfies.
    /// Transitions are monotone: signals only ever move forwards.
    fn update_completion(&self, state: &mut BlockInputState, timestamp: Duration) {
        if !self.has_all_data_locked(state) {
            return;
        }

        self.all_data_signal.resolve(());

        if let Some((block, _)) = &state.block {
            if state.time_complete.is_none() {
                state.time_complete = Some(timestamp);
                metrics::inc_counter(&metrics::BLOCK_INPUT_COMPLETED_TOTAL);
                metrics::observe(
                    &metrics::BLOCK_INPUT_COMPLETION_TIME,
                    timestamp.saturating_sub(self.time_created).as_secs_f64(),
                );
            }
            self.block_and_all_data_signal.resolve(block.clone());
        }
    }
}

/// Attribute a root mismatch to the earliest stored part, falling back to
/// the incoming part's own provenance.
fn first_part_attribution(
    state: &BlockInputState,
    fallback: &SourceMeta,
) -> (Option<PeerId>, BlockSource) {
    let first = match &state.body {
        BlockInputBody::PreData => None,
        BlockInputBody::Blobs { blobs, .. } => {
            blobs.values().next().map(|(_, source)| source.clone())
        }
        BlockInputBody::Columns { columns, .. } => {
            columns.values().next().map(|(_, source)| source.clone())
        }
    };
    let source = first.unwrap_or_else(|| fallback.clone());
    (source.peer_id, source.source)
}

/// Returns the index of the first commitment in `column` that differs
/// from the block body's commitment list, if any.
fn mismatched_column_commitment(
    column: &DataColumnSidecar,
    body_commitments: &[types::KzgCommitment],
) -> Option<usize> {
    if column.kzg_commitments.len() != body_commitments.len() {
        return Some(column.kzg_commitments.len().min(body_commitments.len()));
    }
    column
        .kzg_commitments
        .iter()
        .zip(body_commitments.iter())
        .position(|(a, b)| a != b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bls::SignatureBytes;
    use types::{
        BeaconBlock, BeaconBlockBody, Blob, ExecutionBlockHash, KzgCommitment, KzgProof,
    };

    const SLOTS_PER_EPOCH: u64 = 32;

    fn commitment(byte: u8) -> KzgCommitment {
        KzgCommitment([byte; 48])
    }

    fn block_with_commitments(slot: u64, commitments: Vec<KzgCommitment>) -> Arc<SignedBeaconBlock> {
        Arc::new(SignedBeaconBlock {
            message: BeaconBlock {
                slot: Slot::new(slot),
                proposer_index: 1,
                parent_root: Hash256::repeat_byte(0x77),
                state_root: Hash256::repeat_byte(0x88),
                body: BeaconBlockBody {
                    attestations: vec![],
                    blob_kzg_commitments: commitments,
                    execution_block_hash: ExecutionBlockHash::zero(),
                },
            },
            signature: SignatureBytes::empty(),
        })
    }

    fn blob_for(block: &SignedBeaconBlock, index: u64) -> Arc<BlobSidecar> {
        Arc::new(BlobSidecar {
            index,
            blob: Blob::new(vec![0; 32]),
            kzg_commitment: block.message().body.blob_kzg_commitments[index as usize],
            kzg_proof: KzgProof::empty(),
            signed_block_header: block.signed_block_header(),
        })
    }

    fn gossip_source(peer: &str, seen_sec: u64) -> SourceMeta {
        SourceMeta {
            source: BlockSource::Gossip,
            peer_id: Some(PeerId(peer.to_string())),
            seen_timestamp: Duration::from_secs(seen_sec),
        }
    }

    fn meta_for(block: &SignedBeaconBlock, fork_name: ForkName) -> BlockInputMeta {
        BlockInputMeta {
            fork_name,
            slot: block.slot(),
            block_root: block.canonical_root(),
            parent_root: block.parent_root(),
            da_out_of_range: false,
            time_created: Duration::from_secs(1),
            expected_columns: vec![],
        }
    }

    #[test]
    fn blobs_complete_from_gossip() {
        // Expected blobs = 3; sequence: blob 0, blob 1, block, blob 2.
        let block =
            block_with_commitments(10, vec![commitment(0), commitment(1), commitment(2)]);
        let input = BlockInput::new(meta_for(&block, ForkName::Deneb));

        input
            .add_blob(blob_for(&block, 0), gossip_source("a", 2))
            .unwrap();
        input
            .add_blob(blob_for(&block, 1), gossip_source("b", 3))
            .unwrap();
        assert!(!input.has_block());
        assert!(!input.has_all_data());

        input
            .add_block(block.clone(), gossip_source("c", 4), false)
            .unwrap();
        assert!(input.has_block());
        assert!(!input.has_block_and_all_data());

        input
            .add_blob(blob_for(&block, 2), gossip_source("d", 5))
            .unwrap();
        assert!(input.has_all_data());
        assert!(input.has_block_and_all_data());
        // Completion is stamped with the completing part's arrival time.
        assert_eq!(input.get_time_complete().unwrap(), Duration::from_secs(5));
        assert_eq!(input.received_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn root_mismatch_attributes_the_first_stored_part() {
        let block_a = block_with_commitments(10, vec![commitment(0)]);
        let block_b = block_with_commitments(11, vec![commitment(0)]);
        let input = BlockInput::new(meta_for(&block_a, ForkName::Deneb));

        // A blob keyed at block A's root is stored first.
        input
            .add_blob(blob_for(&block_a, 0), gossip_source("blob-peer", 2))
            .unwrap();

        // A block with a different root lands on the same input.
        let err = input
            .add_block(block_b.clone(), gossip_source("block-peer", 3), false)
            .unwrap_err();
        assert_eq!(
            err,
            BlockInputError::MismatchedBlockRoot {
                expected: block_a.canonical_root(),
                received: block_b.canonical_root(),
                peer_id: Some(PeerId("blob-peer".to_string())),
                source: BlockSource::Gossip,
            }
        );
    }

    #[test]
    fn commitment_mismatch_detected_on_block_arrival() {
        // Block commitments `[c0, c1]`; a blob at index 1 carries c0.
        let block = block_with_commitments(10, vec![commitment(0), commitment(1)]);
        let input = BlockInput::new(meta_for(&block, ForkName::Deneb));

        let mut bad_blob = (*blob_for(&block, 1)).clone();
        bad_blob.kzg_commitment = commitment(0);
        input
            .add_blob(Arc::new(bad_blob), gossip_source("a", 2))
            .unwrap();

        let err = input
            .add_block(block, gossip_source("b", 3), false)
            .unwrap_err();
        assert_eq!(
            err,
            BlockInputError::MismatchedKzgCommitment {
                sidecar_index: 1,
                commitment_index: 1,
            }
        );
    }

    #[test]
    fn commitment_mismatch_detected_after_block() {
        let block = block_with_commitments(10, vec![commitment(0), commitment(1)]);
        let input = BlockInput::new(meta_for(&block, ForkName::Deneb));
        input
            .add_block(block.clone(), gossip_source("a", 2), false)
            .unwrap();

        let mut bad_blob = (*blob_for(&block, 0)).clone();
        bad_blob.kzg_commitment = commitment(9);
        let err = input
            .add_blob(Arc::new(bad_blob), gossip_source("b", 3))
            .unwrap_err();
        assert!(matches!(
            err,
            BlockInputError::MismatchedKzgCommitment {
                sidecar_index: 0,
                ..
            }
        ));
    }

    #[test]
    fn da_out_of_range_needs_no_data() {
        let block = block_with_commitments(10, vec![commitment(0), commitment(1)]);
        let mut meta = meta_for(&block, ForkName::Deneb);
        meta.da_out_of_range = true;
        let input = BlockInput::new(meta);

        // All data is trivially present, before and after the block.
        assert!(input.has_all_data());
        assert!(!input.has_block_and_all_data());

        input
            .add_block(block, gossip_source("a", 2), false)
            .unwrap();
        assert!(input.has_block_and_all_data());
        assert!(input.get_time_complete().is_ok());
    }

    #[test]
    fn pre_data_completes_on_block_alone() {
        let block = block_with_commitments(10, vec![]);
        let input = BlockInput::new(meta_for(&block, ForkName::Capella));
        assert_eq!(input.input_type(), BlockInputType::PreData);
        assert!(input.has_all_data());

        input
            .add_block(block, gossip_source("a", 2), false)
            .unwrap();
        assert!(input.has_block_and_all_data());
    }

    #[test]
    fn duplicate_block_add_is_rejected_when_asked() {
        let block = block_with_commitments(10, vec![]);
        let input = BlockInput::new(meta_for(&block, ForkName::Capella));

        input
            .add_block(block.clone(), gossip_source("a", 2), true)
            .unwrap();
        // Silent duplicate is fine.
        input
            .add_block(block.clone(), gossip_source("b", 3), false)
            .unwrap();
        // Strict duplicate is a construction error.
        let err = input
            .add_block(block, gossip_source("c", 4), true)
            .unwrap_err();
        assert!(matches!(err, BlockInputError::InvalidConstruction(_)));
    }

    #[test]
    fn duplicate_blob_index_is_ignored() {
        let block = block_with_commitments(10, vec![commitment(0)]);
        let input = BlockInput::new(meta_for(&block, ForkName::Deneb));

        input
            .add_blob(blob_for(&block, 0), gossip_source("a", 2))
            .unwrap();
        // Same index from another peer: first sidecar wins.
        input
            .add_blob(blob_for(&block, 0), gossip_source("b", 3))
            .unwrap();
        assert_eq!(input.blobs().len(), 1);
    }

    #[test]
    fn completion_is_monotone() {
        let block = block_with_commitments(10, vec![commitment(0)]);
        let input = BlockInput::new(meta_for(&block, ForkName::Deneb));

        input
            .add_blob(blob_for(&block, 0), gossip_source("a", 2))
            .unwrap();
        input
            .add_block(block.clone(), gossip_source("b", 3), false)
            .unwrap();

        for _ in 0..3 {
            assert!(input.has_block());
            assert!(input.has_all_data());
            assert!(input.has_block_and_all_data());
        }
        // A redundant duplicate cannot regress completion.
        input
            .add_blob(blob_for(&block, 0), gossip_source("c", 9))
            .unwrap();
        assert!(input.has_block_and_all_data());
        assert_eq!(input.get_time_complete().unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn missing_accessors_fail_before_completion() {
        let block = block_with_commitments(10, vec![commitment(0)]);
        let input = BlockInput::new(meta_for(&block, ForkName::Deneb));

        assert_eq!(input.get_block().unwrap_err(), BlockInputError::MissingBlock);
        assert_eq!(
            input.get_time_complete().unwrap_err(),
            BlockInputError::MissingTimeComplete
        );
    }

    #[test]
    fn incomplete_inputs_report_what_is_missing() {
        let block = block_with_commitments(10, vec![commitment(0), commitment(1)]);
        let input = BlockInput::new(meta_for(&block, ForkName::Deneb));

        assert_eq!(
            input.check_complete().unwrap_err(),
            BlockInputError::MissingBlock
        );

        input
            .add_block(block.clone(), gossip_source("a", 2), false)
            .unwrap();
        let err = input.check_complete().unwrap_err();
        assert_eq!(
            err,
            BlockInputError::IncompleteData {
                expected: 2,
                received: 0,
            }
        );
        assert_eq!(err.category(), ErrorCategory::Incomplete);

        input
            .add_blob(blob_for(&block, 0), gossip_source("b", 3))
            .unwrap();
        input
            .add_blob(blob_for(&block, 1), gossip_source("c", 4))
            .unwrap();
        assert!(input.check_complete().is_ok());
    }

    #[test]
    fn log_meta_reports_progress() {
        let block = block_with_commitments(10, vec![commitment(0), commitment(1)]);
        let input = BlockInput::new(meta_for(&block, ForkName::Deneb));
        input
            .add_blob(blob_for(&block, 0), gossip_source("a", 2))
            .unwrap();

        let log_meta = input.get_log_meta();
        assert_eq!(log_meta.slot, Slot::new(10));
        assert_eq!(log_meta.received_data, 1);
        // Expected count is unknown until the block arrives.
        assert_eq!(log_meta.expected_data, None);
        assert!(!log_meta.has_block);
    }

    #[tokio::test]
    async fn waiters_resolve_on_completion() {
        let block = block_with_commitments(10, vec![commitment(0)]);
        let input = Arc::new(BlockInput::new(meta_for(&block, ForkName::Deneb)));
        let cancel = CancellationToken::new();

        let waiter = {
            let input = input.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                input
                    .wait_for_block_and_all_data(Duration::from_secs(5), &cancel)
                    .await
            })
        };

        input
            .add_block(block.clone(), gossip_source("a", 2), false)
            .unwrap();
        input
            .add_blob(blob_for(&block, 0), gossip_source("b", 3))
            .unwrap();

        let resolved = waiter.await.unwrap().unwrap();
        assert_eq!(resolved.canonical_root(), block.canonical_root());
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_time_out() {
        let block = block_with_commitments(10, vec![commitment(0)]);
        let input = BlockInput::new(meta_for(&block, ForkName::Deneb));
        let cancel = CancellationToken::new();

        let result = input
            .wait_for_all_data(Duration::from_millis(100), &cancel)
            .await;
        assert_eq!(result, Err(WaitError::Timeout));
    }

    #[tokio::test]
    async fn eviction_cancels_waiters() {
        let block = block_with_commitments(10, vec![commitment(0)]);
        let input = Arc::new(BlockInput::new(meta_for(&block, ForkName::Deneb)));
        let cancel = CancellationToken::new();

        let waiter = {
            let input = input.clone();
            let cancel = cancel.clone();
            tokio::spawn(
                async move { input.wait_for_block(Duration::from_secs(5), &cancel).await },
            )
        };

        // Let the waiter subscribe before cancelling.
        tokio::task::yield_now().await;
        input.cancel_waiters();

        assert_eq!(waiter.await.unwrap(), Err(WaitError::Cancelled));
    }

    #[test]
    fn columns_complete_when_custody_set_present() {
        let block = block_with_commitments(
            SLOTS_PER_EPOCH * 2,
            vec![commitment(0), commitment(1)],
        );
        let mut meta = meta_for(&block, ForkName::Fulu);
        meta.expected_columns = vec![1, 5, 9];
        let input = BlockInput::new(meta);
        assert_eq!(input.input_type(), BlockInputType::Columns);

        let column_for = |index: u64| {
            Arc::new(DataColumnSidecar {
                index,
                column: vec![],
                kzg_commitments: block.message().body.blob_kzg_commitments.clone(),
                kzg_proofs: vec![],
                signed_block_header: block.signed_block_header(),
            })
        };

        input
            .add_block(block.clone(), gossip_source("a", 2), false)
            .unwrap();
        input.add_column(column_for(1), gossip_source("b", 3)).unwrap();
        input.add_column(column_for(5), gossip_source("c", 4)).unwrap();
        assert!(!input.has_all_data());

        // A column outside the custody set does not satisfy completion.
        input.add_column(column_for(7), gossip_source("d", 5)).unwrap();
        assert!(!input.has_all_data());

        input.add_column(column_for(9), gossip_source("e", 6)).unwrap();
        assert!(input.has_block_and_all_data());
    }

    #[test]
    fn column_commitment_list_checked_against_block() {
        let block = block_with_commitments(10, vec![commitment(0), commitment(1)]);
        let mut meta = meta_for(&block, ForkName::Fulu);
        meta.expected_columns = vec![0];
        let input = BlockInput::new(meta);
        input
            .add_block(block.clone(), gossip_source("a", 2), false)
            .unwrap();

        let bad_column = Arc::new(DataColumnSidecar {
            index: 0,
            column: vec![],
            kzg_commitments: vec![commitment(0), commitment(9)],
            kzg_proofs: vec![],
            signed_block_header: block.signed_block_header(),
        });
        let err = input
            .add_column(bad_column, gossip_source("b", 3))
            .unwrap_err();
        assert_eq!(
            err,
            BlockInputError::MismatchedKzgCommitment {
                sidecar_index: 0,
                commitment_index: 1,
            }
        );
    }

    #[test]
    fn blob_for_columns_input_is_a_construction_error() {
        let block = block_with_commitments(10, vec![commitment(0)]);
        let mut meta = meta_for(&block, ForkName::Fulu);
        meta.expected_columns = vec![0];
        let input = BlockInput::new(meta);

        let err = input
            .add_blob(blob_for(&block, 0), gossip_source("a", 2))
            .unwrap_err();
        assert!(matches!(err, BlockInputError::InvalidConstruction(_)));
    }
}
