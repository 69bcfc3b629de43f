//! A wrapper around the `prometheus` crate that provides a global,
//! lazily-initialized metrics registry with fallible creation helpers.
//!
//! Metric statics are declared as `LazyLock<Result<T>>` so a name
//! collision or invalid name degrades that one metric instead of
//! panicking; the accessor functions silently no-op on the `Err` arm.

pub use prometheus::{
    Error, Histogram, HistogramTimer, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, TextEncoder, gather,
};
use prometheus::{HistogramOpts, Opts};

pub type Result<T> = std::result::Result<T, Error>;

/// Attempts to create an `IntCounter`, returning `Err` if the registry
/// does not accept the counter (potentially due to naming conflict).
pub fn try_create_int_counter(name: &str, help: &str) -> Result<IntCounter> {
    let opts = Opts::new(name, help);
    let counter = IntCounter::with_opts(opts)?;
    prometheus::register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Attempts to create an `IntGauge`, returning `Err` if the registry
/// does not accept the gauge (potentially due to naming conflict).
pub fn try_create_int_gauge(name: &str, help: &str) -> Result<IntGauge> {
    let opts = Opts::new(name, help);
    let gauge = IntGauge::with_opts(opts)?;
    prometheus::register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Attempts to create a `Histogram`, returning `Err` if the registry
/// does not accept the histogram (potentially due to naming conflict).
pub fn try_create_histogram(name: &str, help: &str) -> Result<Histogram> {
    let opts = HistogramOpts::new(name, help);
    let histogram = Histogram::with_opts(opts)?;
    prometheus::register(Box::new(histogram.clone()))?;
    Ok(histogram)
}

/// Attempts to create a `HistogramVec` with the given label names.
pub fn try_create_histogram_vec(
    name: &str,
    help: &str,
    label_names: &[&str],
) -> Result<HistogramVec> {
    let opts = HistogramOpts::new(name, help);
    let histogram_vec = HistogramVec::new(opts, label_names)?;
    prometheus::register(Box::new(histogram_vec.clone()))?;
    Ok(histogram_vec)
}

/// Attempts to create an `IntCounterVec` with the given label names.
pub fn try_create_int_counter_vec(
    name: &str,
    help: &str,
    label_names: &[&str],
) -> Result<IntCounterVec> {
    let opts = Opts::new(name, help);
    let counter_vec = IntCounterVec::new(opts, label_names)?;
    prometheus::register(Box::new(counter_vec.clone()))?;
    Ok(counter_vec)
}

/// Attempts to create an `IntGaugeVec` with the given label names.
pub fn try_create_int_gauge_vec(
    name: &str,
    help: &str,
    label_names: &[&str],
) -> Result<IntGaugeVec> {
    let opts = Opts::new(name, help);
    let gauge_vec = IntGaugeVec::new(opts, label_names)?;
    prometheus::register(Box::new(gauge_vec.clone()))?;
    Ok(gauge_vec)
}

pub fn inc_counter(counter: &Result<IntCounter>) {
    if let Ok(counter) = counter {
        counter.inc();
    }
}

pub fn inc_counter_by(counter: &Result<IntCounter>, value: u64) {
    if let Ok(counter) = counter {
        counter.inc_by(value);
    }
}

pub fn inc_counter_vec(counter_vec: &Result<IntCounterVec>, label_values: &[&str]) {
    if let Ok(counter_vec) = counter_vec
        && let Ok(counter) = counter_vec.get_metric_with_label_values(label_values)
    {
        counter.inc();
    }
}

pub fn set_gauge(gauge: &Result<IntGauge>, value: i64) {
    if let Ok(gauge) = gauge {
        gauge.set(value);
    }
}

pub fn set_gauge_vec(gauge_vec: &Result<IntGaugeVec>, label_values: &[&str], value: i64) {
    if let Ok(gauge_vec) = gauge_vec
        && let Ok(gauge) = gauge_vec.get_metric_with_label_values(label_values)
    {
        gauge.set(value);
    }
}

pub fn observe(histogram: &Result<Histogram>, value: f64) {
    if let Ok(histogram) = histogram {
        histogram.observe(value);
    }
}

/// Starts a timer for the given `Histogram`. The timer stops and records
/// when it is dropped (or when `stop_timer` is called).
pub fn start_timer(histogram: &Result<Histogram>) -> Option<HistogramTimer> {
    histogram.as_ref().ok().map(|h| h.start_timer())
}

pub fn start_timer_vec(
    histogram_vec: &Result<HistogramVec>,
    label_values: &[&str],
) -> Option<HistogramTimer> {
    if let Ok(histogram_vec) = histogram_vec {
        histogram_vec
            .get_metric_with_label_values(label_values)
            .ok()
            .map(|h| h.start_timer())
    } else {
        None
    }
}

/// Stops a timer created with `start_timer`, recording the elapsed time.
pub fn stop_timer(timer: Option<HistogramTimer>) {
    if let Some(timer) = timer {
        timer.observe_duration();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_registers_and_increments() {
        let counter = try_create_int_counter("metrics_test_counter", "a test counter");
        inc_counter(&counter);
        inc_counter_by(&counter, 2);
        assert_eq!(counter.unwrap().get(), 3);
    }

    #[test]
    fn duplicate_registration_fails_quietly() {
        let first = try_create_int_gauge("metrics_test_gauge", "a test gauge");
        let second = try_create_int_gauge("metrics_test_gauge", "a test gauge");
        assert!(first.is_ok());
        assert!(second.is_err());
        // The `Err` arm must be a usable no-op.
        set_gauge(&second, 7);
    }

    #[test]
    fn timer_on_err_is_none() {
        let histogram: Result<Histogram> = Err(Error::Msg("nope".to_string()));
        assert!(start_timer(&histogram).is_none());
        stop_timer(None);
    }
}
