pub use metrics::*;
use std::sync::LazyLock;

/*
 * Canonical head / fork choice.
 */
pub static BEACON_REORGS_TOTAL: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "beacon_reorgs_total",
        "Count of occasions the canonical head changed to a non-descendant block",
    )
});
pub static BEACON_REORG_DISTANCE: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "beacon_reorg_distance",
        "Slots between the old head and the common ancestor on a re-org",
    )
});
pub static FORK_CHOICE_ERRORS: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "beacon_fork_choice_errors_total",
        "Count of head updates that failed and kept the previous head",
    )
});
pub static HEAD_SLOT: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge("beacon_head_slot", "Slot of the canonical head block")
});
pub static FINALIZED_EPOCH: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge("beacon_finalized_epoch", "Current finalized epoch")
});

/*
 * Block input assembly.
 */
pub static BLOCK_INPUT_CREATED: LazyLock<Result<IntCounterVec>> = LazyLock::new(|| {
    try_create_int_counter_vec(
        "beacon_block_input_created_total",
        "Count of block inputs created, by input type",
        &["type"],
    )
});
pub static BLOCK_INPUT_COMPLETED_TOTAL: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "beacon_block_input_completed_total",
        "Count of block inputs that gathered the block and all data",
    )
});
pub static BLOCK_INPUT_COMPLETION_TIME: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "beacon_block_input_completion_seconds",
        "Seconds between a block input's creation and its completion",
    )
});
pub static BLOCK_INPUT_PRUNED: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "beacon_block_input_pruned_total",
        "Count of block inputs evicted by finalization",
    )
});

/*
 * Gossip verification.
 */
pub static GOSSIP_BLOCKS_VERIFIED: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "beacon_gossip_blocks_verified_total",
        "Count of gossip blocks that passed admission",
    )
});
pub static GOSSIP_BLOB_SIDECARS_VERIFIED: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "beacon_gossip_blob_sidecars_verified_total",
        "Count of gossip blob sidecars that passed admission",
    )
});
pub static GOSSIP_DATA_COLUMNS_VERIFIED: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "beacon_gossip_data_column_sidecars_verified_total",
        "Count of gossip data column sidecars that passed admission",
    )
});
pub static GOSSIP_REJECTS: LazyLock<Result<IntCounterVec>> = LazyLock::new(|| {
    try_create_int_counter_vec(
        "beacon_gossip_rejects_total",
        "Count of gossip messages rejected, by topic",
        &["topic"],
    )
});

/*
 * Block processing pipeline.
 */
pub static BLOCK_PROCESSING_TIMES: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "beacon_block_processing_seconds",
        "Full runtime of importing a complete block input",
    )
});
pub static BLOCK_PROCESSING_TRANSIENT_RETRIES: LazyLock<Result<IntCounter>> =
    LazyLock::new(|| {
        try_create_int_counter(
            "beacon_block_processing_transient_retries_total",
            "Count of transient persistence failures that were retried",
        )
    });

/*
 * Archiver.
 */
pub static ARCHIVED_BLOCKS: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "beacon_archived_blocks_total",
        "Count of finalized blocks migrated to the archive",
    )
});
pub static ARCHIVED_STATES: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "beacon_archived_states_total",
        "Count of finalized states written to the archive",
    )
});
