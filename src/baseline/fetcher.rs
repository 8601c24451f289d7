//! Baseline fetcher with zero-value retry
//!
//! One request per wave for the deduplicated symbol set. Symbols whose open
//! price comes back zero are retried after a fixed delay, restricted to the
//! failed subset. At most one retry chain runs at a time; zero results from
//! later fetches join it. The counter counts waves, not symbols, so the cap
//! bounds total retry traffic.

use super::{BaselineSource, BaselineStore};
use crate::error::FeedError;
use crate::retry::RetryCounter;
use crate::telemetry::{self, CounterMetric};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Zero-baseline retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Fixed delay before each retry wave
    pub delay: Duration,
    /// Maximum number of retry waves before giving up
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(10),
            max_retries: 10,
        }
    }
}

/// Outcome of one fetch call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    /// Symbols that received a usable baseline
    pub updated: Vec<String>,
    /// Symbols whose open price came back zero
    pub zero: Vec<String>,
    /// Whether a retry wave was scheduled for `zero`
    pub retry_scheduled: bool,
}

/// Zero symbols awaiting the next retry wave
#[derive(Debug, Default)]
struct PendingRetry {
    symbols: Vec<String>,
    /// A retry chain is spawned and owns the counter
    active: bool,
}

impl PendingRetry {
    fn merge(&mut self, symbols: impl IntoIterator<Item = String>) {
        for symbol in symbols {
            if !self.symbols.contains(&symbol) {
                self.symbols.push(symbol);
            }
        }
    }
}

/// Fetches baselines into a shared store
#[derive(Clone)]
pub struct BaselineFetcher {
    source: Arc<dyn BaselineSource>,
    store: BaselineStore,
    policy: RetryPolicy,
    attempts: Arc<RetryCounter>,
    pending: Arc<Mutex<PendingRetry>>,
    cancel: CancellationToken,
}

impl BaselineFetcher {
    /// Create a fetcher. Pending retries stop once `cancel` fires.
    pub fn new(
        source: Arc<dyn BaselineSource>,
        store: BaselineStore,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        let attempts = Arc::new(RetryCounter::new(policy.max_retries));
        Self {
            source,
            store,
            policy,
            attempts,
            pending: Arc::new(Mutex::new(PendingRetry::default())),
            cancel,
        }
    }

    pub fn store(&self) -> &BaselineStore {
        &self.store
    }

    /// Retry waves used by the current (or last exhausted) retry chain
    pub fn retry_attempts(&self) -> u32 {
        self.attempts.get()
    }

    /// Whether a retry wave is waiting or running
    pub fn retry_pending(&self) -> bool {
        self.pending.lock().active
    }

    /// Fetch the baseline of a single symbol
    pub async fn fetch_one(&self, symbol: &str) -> Result<FetchReport, FeedError> {
        self.fetch([symbol]).await
    }

    /// Fetch baselines for `symbols`.
    ///
    /// Duplicates are collapsed before the request. On error nothing is
    /// written and no retry is scheduled; earlier baselines stay valid.
    /// Zero results join the pending retry wave when one exists.
    pub async fn fetch<I, S>(&self, symbols: I) -> Result<FetchReport, FeedError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique = dedup(symbols);
        if unique.is_empty() {
            return Ok(FetchReport::default());
        }

        let (updated, zero) = match self.run_wave(&unique).await {
            Ok(result) => result,
            Err(e) => {
                telemetry::increment(CounterMetric::BaselineFetchFailures);
                tracing::error!(error = %e, "Baseline fetch failed");
                return Err(e);
            }
        };

        let retry_scheduled = self.schedule_retry(&updated, zero.clone());

        tracing::info!(
            updated = updated.len(),
            zero = zero.len(),
            retry_scheduled,
            "Open prices updated"
        );

        Ok(FetchReport {
            updated,
            zero,
            retry_scheduled,
        })
    }

    /// Issue one request and store the usable results.
    ///
    /// Returns the (updated, zero) symbol lists.
    async fn run_wave(&self, symbols: &[String]) -> Result<(Vec<String>, Vec<String>), FeedError> {
        let prices = self.source.fetch_open_prices(symbols).await?;

        let mut updated = Vec::new();
        let mut zero = Vec::new();

        for entry in prices {
            if !symbols.contains(&entry.symbol) || updated.contains(&entry.symbol) {
                continue;
            }
            if self.store.set(entry.symbol.clone(), entry.open_price) {
                updated.push(entry.symbol);
            } else if !zero.contains(&entry.symbol) {
                telemetry::increment(CounterMetric::ZeroBaselines);
                tracing::warn!(
                    error = %FeedError::ZeroBaseline(entry.symbol.clone()),
                    "Open price is zero"
                );
                zero.push(entry.symbol);
            }
        }

        Ok((updated, zero))
    }

    /// Fold the outcome of a regular fetch into the retry state.
    ///
    /// Zero symbols join the running chain if there is one; otherwise a new
    /// chain is spawned if the counter allows it. The counter is only reset
    /// by a clean fetch while no chain owns it.
    fn schedule_retry(&self, updated: &[String], zero: Vec<String>) -> bool {
        let mut pending = self.pending.lock();
        pending.symbols.retain(|s| !updated.contains(s));

        if zero.is_empty() {
            if !pending.active {
                self.attempts.reset();
            }
            return false;
        }

        if pending.active {
            tracing::debug!(symbols = ?zero, "Joining pending retry wave");
            pending.merge(zero);
            return true;
        }

        let Some(attempt) = self.attempts.try_increment() else {
            tracing::warn!(
                error = %FeedError::RetryExhausted(self.attempts.max()),
                symbols = ?zero,
                "Giving up on zero baselines"
            );
            return false;
        };

        pending.merge(zero);
        pending.active = true;
        drop(pending);

        let this = self.clone();
        tokio::spawn(async move {
            this.retry_loop(attempt).await;
        });
        true
    }

    /// Run retry waves over the pending set until it resolves, a wave fails,
    /// the cap is reached or the fetcher is cancelled.
    async fn retry_loop(self, mut attempt: u32) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Baseline retry cancelled");
                    self.finish_chain();
                    return;
                }
                _ = tokio::time::sleep(self.policy.delay) => {}
            }

            let failed = self.pending.lock().symbols.clone();
            if failed.is_empty() {
                self.attempts.reset();
                self.finish_chain();
                return;
            }

            telemetry::increment(CounterMetric::BaselineRetryWaves);
            tracing::info!(attempt, symbols = ?failed, "Retrying zero baselines");

            let (updated, zero) = match self.run_wave(&failed).await {
                Ok(result) => result,
                Err(e) => {
                    telemetry::increment(CounterMetric::BaselineFetchFailures);
                    tracing::error!(error = %e, attempt, "Baseline retry failed");
                    self.finish_chain();
                    return;
                }
            };

            let mut pending = self.pending.lock();
            pending.symbols.retain(|s| !updated.contains(s));
            pending.merge(zero);

            if pending.symbols.is_empty() {
                pending.active = false;
                self.attempts.reset();
                tracing::info!(attempt, "Zero baselines resolved");
                return;
            }

            match self.attempts.try_increment() {
                Some(next) => attempt = next,
                None => {
                    tracing::warn!(
                        error = %FeedError::RetryExhausted(self.attempts.max()),
                        symbols = ?pending.symbols,
                        "Giving up on zero baselines"
                    );
                    pending.symbols.clear();
                    pending.active = false;
                    return;
                }
            }
        }
    }

    fn finish_chain(&self) {
        let mut pending = self.pending.lock();
        pending.symbols.clear();
        pending.active = false;
    }
}

/// Collapse duplicates, keeping first-seen order
fn dedup<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut unique: Vec<String> = Vec::new();
    for symbol in symbols {
        let symbol = symbol.as_ref();
        if !unique.iter().any(|s| s == symbol) {
            unique.push(symbol.to_string());
        }
    }
    unique
}
