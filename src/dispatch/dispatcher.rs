//! Throttled update dispatcher

use super::{PriceUpdate, UpdateSink};
use crate::baseline::BaselineStore;
use crate::feed::IngressBuffer;
use crate::market::{PriceState, TrackedPairs};
use crate::telemetry::{self, CounterMetric};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Delay between dequeues; caps the presentation update rate
    pub interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
        }
    }
}

/// Background loop turning buffered ticks into row updates
pub struct UpdateDispatcher {
    config: DispatcherConfig,
    buffer: Arc<IngressBuffer>,
    baselines: BaselineStore,
    rows: TrackedPairs,
    sink: Arc<dyn UpdateSink>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateDispatcher {
    pub fn new(
        config: DispatcherConfig,
        buffer: Arc<IngressBuffer>,
        baselines: BaselineStore,
        rows: TrackedPairs,
        sink: Arc<dyn UpdateSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            buffer,
            baselines,
            rows,
            sink,
            cancel,
            task: Mutex::new(None),
        }
    }

    /// Dequeue at most one tick and apply it to every row bound to its
    /// symbol.
    ///
    /// Returns the resulting updates; empty when the buffer was empty, the
    /// symbol has no baseline yet or no row tracks it any more.
    pub fn process_next(&self) -> Vec<PriceUpdate> {
        let Some(tick) = self.buffer.pop() else {
            return Vec::new();
        };

        let Some(state) = self
            .baselines
            .get(&tick.symbol)
            .and_then(|baseline| PriceState::derive(tick.last_price, baseline))
        else {
            telemetry::increment(CounterMetric::TicksWithoutBaseline);
            tracing::trace!(symbol = %tick.symbol, "No baseline, tick dropped");
            return Vec::new();
        };

        self.rows
            .apply(&tick.symbol, &state)
            .into_iter()
            .map(|row| PriceUpdate {
                row,
                symbol: tick.symbol.clone(),
                price: state.price,
                change: state.change,
                change_percent: state.change_percent,
            })
            .collect()
    }

    /// Spawn the loop unless it is already running or was cancelled.
    ///
    /// Returns whether a new loop was started.
    pub fn ensure_running(self: &Arc<Self>) -> bool {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        if self.cancel.is_cancelled() {
            return false;
        }

        let this = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            this.run().await;
        }));
        true
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel the loop and wait for it to exit
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Dispatcher task panicked");
            }
        }
    }

    async fn run(&self) {
        tracing::info!(
            interval_ms = self.config.interval.as_millis() as u64,
            "Update dispatcher started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let updates = self.process_next();
            if !updates.is_empty() {
                telemetry::increment_by(CounterMetric::UpdatesEmitted, updates.len() as u64);
                self.sink.publish(updates);
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        tracing::info!("Update dispatcher stopped");
    }
}
