pub use metrics::*;
use std::sync::LazyLock;

pub static STORE_BEACON_BLOCK_WRITES: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "store_beacon_block_writes_total",
        "Count of beacon blocks written to the hot store",
    )
});
pub static STORE_ARCHIVE_BLOCK_WRITES: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "store_archive_block_writes_total",
        "Count of beacon blocks migrated to the archive",
    )
});
pub static STORE_PRUNED_ROWS: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "store_pruned_rows_total",
        "Count of rows deleted by horizon pruning",
    )
});
