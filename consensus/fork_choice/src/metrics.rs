pub use metrics::*;
use std::sync::LazyLock;

pub static FORK_CHOICE_ON_BLOCK_TIMES: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "fork_choice_on_block_seconds",
        "Time taken to accept a block into fork choice",
    )
});
pub static FORK_CHOICE_ON_ATTESTATION_TIMES: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "fork_choice_on_attestation_seconds",
        "Time taken to accept an attestation into fork choice",
    )
});
pub static FORK_CHOICE_DEQUEUED_ATTESTATIONS: LazyLock<Result<IntCounter>> =
    LazyLock::new(|| {
        try_create_int_counter(
            "fork_choice_dequeued_attestations_total",
            "Count of queued attestations applied after their slot elapsed",
        )
    });
pub static FORK_CHOICE_NODES: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "fork_choice_nodes",
        "The number of nodes in the fork choice proto array",
    )
});
