//! Baseline module
//!
//! Reference ("open") prices that change figures are measured against,
//! the REST source they come from and the fetcher that retries zero values.

mod fetcher;
mod trading_day;

pub use fetcher::{BaselineFetcher, FetchReport, RetryPolicy};
pub use trading_day::{TradingDayClient, TradingDayConfig};

use crate::error::FeedError;
use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Open price returned for one symbol
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPrice {
    pub symbol: String,
    /// Zero when the endpoint had no usable value
    pub open_price: Decimal,
}

/// Source of open prices for a batch of symbols
#[async_trait]
pub trait BaselineSource: Send + Sync {
    /// Fetch open prices for `symbols` in a single request
    async fn fetch_open_prices(&self, symbols: &[String]) -> Result<Vec<OpenPrice>, FeedError>;
}

/// Concurrency-safe symbol -> baseline map.
///
/// Only non-zero baselines are ever stored, so a present entry is always
/// safe to divide by.
#[derive(Debug, Clone, Default)]
pub struct BaselineStore {
    inner: Arc<RwLock<HashMap<String, Decimal>>>,
}

impl BaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<Decimal> {
        self.inner.read().get(symbol).copied()
    }

    /// Record a baseline. Zero values are rejected and leave any previous
    /// baseline in place.
    pub fn set(&self, symbol: impl Into<String>, baseline: Decimal) -> bool {
        if baseline.is_zero() {
            return false;
        }
        self.inner.write().insert(symbol.into(), baseline);
        true
    }

    pub fn remove(&self, symbol: &str) -> Option<Decimal> {
        self.inner.write().remove(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.inner.read().contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
