//! Prometheus metrics

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Data frames accepted into the ingress buffer
    TicksReceived,
    /// Buffered ticks evicted to admit newer ones
    TicksEvicted,
    /// Inbound frames that were not data frames or failed to parse
    IgnoredFrames,
    /// Row updates handed to the presentation sink
    UpdatesEmitted,
    /// Ticks dropped because their symbol had no baseline
    TicksWithoutBaseline,
    /// Automatic reconnect attempts
    ReconnectAttempts,
    /// Zero-baseline retry waves
    BaselineRetryWaves,
    /// Baseline fetch cycles aborted on error
    BaselineFetchFailures,
    /// Symbols whose open price came back zero
    ZeroBaselines,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Messages waiting in the ingress buffer
    BufferDepth,
    /// Symbols in the subscription set
    SubscribedSymbols,
    /// Connection state as an ordinal
    ConnectionState,
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::TicksReceived => "cryptotracker_ticks_received_total",
        CounterMetric::TicksEvicted => "cryptotracker_ticks_evicted_total",
        CounterMetric::IgnoredFrames => "cryptotracker_ignored_frames_total",
        CounterMetric::UpdatesEmitted => "cryptotracker_updates_emitted_total",
        CounterMetric::TicksWithoutBaseline => "cryptotracker_ticks_without_baseline_total",
        CounterMetric::ReconnectAttempts => "cryptotracker_reconnect_attempts_total",
        CounterMetric::BaselineRetryWaves => "cryptotracker_baseline_retry_waves_total",
        CounterMetric::BaselineFetchFailures => "cryptotracker_baseline_fetch_failures_total",
        CounterMetric::ZeroBaselines => "cryptotracker_zero_baselines_total",
    }
}

fn gauge_name(metric: GaugeMetric) -> &'static str {
    match metric {
        GaugeMetric::BufferDepth => "cryptotracker_buffer_depth",
        GaugeMetric::SubscribedSymbols => "cryptotracker_subscribed_symbols",
        GaugeMetric::ConnectionState => "cryptotracker_connection_state",
    }
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    increment_by(metric, 1);
}

/// Increment a counter
pub fn increment_by(metric: CounterMetric, value: u64) {
    metrics::counter!(counter_name(metric)).increment(value);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(gauge_name(metric)).set(value);
}
