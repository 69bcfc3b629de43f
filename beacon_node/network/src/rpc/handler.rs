//! Req/resp handlers serving blocks and sidecars from the hot and
//! archive stores.
//!
//! Every response chunk carries the fork digest for the fork active at
//! the chunk's slot, so the peer can select the right decoder. Chunks are
//! produced one item at a time so a large range response yields between
//! items instead of starving the task.

use crate::fork_context::{ForkContext, ForkDigest};
use std::sync::Arc;
use store::{Error as StoreError, HotColdDB, KeyValueStore};
use tracing::debug;
use types::{
    BlobIdentifier, BlobSidecar, DataColumnIdentifier, DataColumnSidecar, EthSpec, Hash256,
    SignedBeaconBlock, Slot,
};

/// One item of a req/resp response, tagged with the fork boundary its
/// slot falls under.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseChunk<T> {
    pub fork_digest: ForkDigest,
    pub item: T,
}

/// Maximum number of blocks served per by-range request.
pub const MAX_REQUEST_BLOCKS: u64 = 1024;

/// Serve `blocks_by_range` from the slot-keyed archive. Hot blocks are
/// reachable by root; range serving is an archive concern.
pub fn handle_blocks_by_range<E: EthSpec, S: KeyValueStore>(
    store: &HotColdDB<S>,
    fork_context: &ForkContext,
    start_slot: Slot,
    count: u64,
) -> Result<Vec<ResponseChunk<Arc<SignedBeaconBlock>>>, StoreError> {
    let count = count.min(MAX_REQUEST_BLOCKS);
    let blocks = store.get_archive_blocks_by_range(start_slot, count)?;

    debug!(
        %start_slot,
        count,
        served = blocks.len(),
        "Serving blocks by range"
    );

    Ok(blocks
        .into_iter()
        .map(|block| ResponseChunk {
            fork_digest: fork_context.fork_digest_at_slot::<E>(block.slot()),
            item: Arc::new(block),
        })
        .collect())
}

/// Serve `blocks_by_root` from the hot store. Roots that are unknown (or
/// already migrated into the slot-keyed archive) yield no chunk, per the
/// protocol.
pub fn handle_blocks_by_root<E: EthSpec, S: KeyValueStore>(
    store: &HotColdDB<S>,
    fork_context: &ForkContext,
    block_roots: &[Hash256],
) -> Result<Vec<ResponseChunk<Arc<SignedBeaconBlock>>>, StoreError> {
    let mut chunks = Vec::with_capacity(block_roots.len());
    for block_root in block_roots {
        if let Some(block) = store.get_block(block_root)? {
            chunks.push(ResponseChunk {
                fork_digest: fork_context.fork_digest_at_slot::<E>(block.slot()),
                item: Arc::new(block),
            });
        }
    }
    Ok(chunks)
}

/// Serve `blob_sidecars_by_root`: unknown roots and indices yield no
/// chunk.
pub fn handle_blob_sidecars_by_root<E: EthSpec, S: KeyValueStore>(
    store: &HotColdDB<S>,
    fork_context: &ForkContext,
    blob_ids: &[BlobIdentifier],
) -> Result<Vec<ResponseChunk<Arc<BlobSidecar>>>, StoreError> {
    let mut chunks = Vec::new();
    for blob_id in blob_ids {
        let Some(blobs) = store.get_blobs(&blob_id.block_root)? else {
            continue;
        };
        for blob in blobs {
            if blob.index == blob_id.index {
                chunks.push(ResponseChunk {
                    fork_digest: fork_context.fork_digest_at_slot::<E>(blob.slot()),
                    item: blob,
                });
            }
        }
    }
    Ok(chunks)
}

/// Serve `data_column_sidecars_by_root`.
pub fn handle_data_column_sidecars_by_root<E: EthSpec, S: KeyValueStore>(
    store: &HotColdDB<S>,
    fork_context: &ForkContext,
    column_ids: &[DataColumnIdentifier],
) -> Result<Vec<ResponseChunk<Arc<DataColumnSidecar>>>, StoreError> {
    let mut chunks = Vec::new();
    for column_id in column_ids {
        let Some(columns) = store.get_data_columns(&column_id.block_root)? else {
            continue;
        };
        for column in columns {
            if column.index == column_id.index {
                chunks.push(ResponseChunk {
                    fork_digest: fork_context.fork_digest_at_slot::<E>(column.slot()),
                    item: column,
                });
            }
        }
    }
    Ok(chunks)
}
