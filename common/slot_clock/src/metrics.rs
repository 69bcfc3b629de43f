use crate::SlotClock;
use metrics::*;
use std::sync::LazyLock;
use types::{EthSpec, Slot};

pub static PRESENT_SLOT: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge("slotclock_present_slot", "The present wall-clock slot")
});
pub static PRESENT_EPOCH: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge("slotclock_present_epoch", "The present wall-clock epoch")
});

/// Update the global slot/epoch gauges from `clock`.
pub fn scrape_for_metrics<E: EthSpec, U: SlotClock>(clock: &U) {
    let present_slot = clock.now().unwrap_or_else(|| Slot::new(0));
    set_gauge(&PRESENT_SLOT, present_slot.as_u64() as i64);
    set_gauge(
        &PRESENT_EPOCH,
        present_slot.epoch(E::slots_per_epoch()).as_u64() as i64,
    );
}
