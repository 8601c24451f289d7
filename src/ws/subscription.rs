//! Subscription registry and control frames
//!
//! The registry is the authoritative set of symbols the live connection
//! should be receiving. Each add/remove batch yields at most one control
//! frame naming only the symbols whose membership actually changed.

use crate::error::FeedError;
use crate::telemetry::{self, GaugeMetric};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stream suffix for the 24h mini-ticker channel
const MINI_TICKER_SUFFIX: &str = "@miniTicker";

/// Binance stream name for a symbol, e.g. BTCUSDT -> btcusdt@miniTicker
pub fn stream_name(symbol: &str) -> String {
    format!("{}{}", symbol.to_lowercase(), MINI_TICKER_SUFFIX)
}

/// Control frame method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlMethod {
    Subscribe,
    Unsubscribe,
}

/// Outbound `{method, params, id}` frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlFrame {
    pub method: ControlMethod,
    /// Stream names, one per symbol
    pub params: Vec<String>,
    pub id: u64,
}

impl ControlFrame {
    pub fn to_json(&self) -> Result<String, FeedError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Symbols subscribed on the live connection
#[derive(Debug)]
pub struct SubscriptionRegistry {
    symbols: RwLock<BTreeSet<String>>,
    next_id: AtomicU64,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            symbols: RwLock::new(BTreeSet::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add one symbol
    pub fn add(&self, symbol: &str) -> Option<ControlFrame> {
        self.add_many([symbol])
    }

    /// Add symbols; returns a SUBSCRIBE frame for the newly added ones, or
    /// `None` when every symbol was already present.
    pub fn add_many<I, S>(&self, symbols: I) -> Option<ControlFrame>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let added: Vec<String> = {
            let mut set = self.symbols.write();
            let added = symbols
                .into_iter()
                .map(|s| s.as_ref().to_uppercase())
                .filter(|s| set.insert(s.clone()))
                .collect();
            telemetry::set_gauge(GaugeMetric::SubscribedSymbols, set.len() as f64);
            added
        };
        self.frame(ControlMethod::Subscribe, &added)
    }

    /// Remove one symbol
    pub fn remove(&self, symbol: &str) -> Option<ControlFrame> {
        self.remove_many([symbol])
    }

    /// Remove symbols; returns an UNSUBSCRIBE frame for the ones that were
    /// present, or `None` when none were.
    pub fn remove_many<I, S>(&self, symbols: I) -> Option<ControlFrame>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let removed: Vec<String> = {
            let mut set = self.symbols.write();
            let removed = symbols
                .into_iter()
                .map(|s| s.as_ref().to_uppercase())
                .filter(|s| set.remove(s))
                .collect();
            telemetry::set_gauge(GaugeMetric::SubscribedSymbols, set.len() as f64);
            removed
        };
        self.frame(ControlMethod::Unsubscribe, &removed)
    }

    /// Current set, sorted
    pub fn snapshot(&self) -> Vec<String> {
        self.symbols.read().iter().cloned().collect()
    }

    /// One SUBSCRIBE frame naming the whole set, for replay after a reconnect
    pub fn resubscribe_frame(&self) -> Option<ControlFrame> {
        let snapshot = self.snapshot();
        self.frame(ControlMethod::Subscribe, &snapshot)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.read().contains(&symbol.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.read().is_empty()
    }

    fn frame(&self, method: ControlMethod, symbols: &[String]) -> Option<ControlFrame> {
        if symbols.is_empty() {
            return None;
        }
        Some(ControlFrame {
            method,
            params: symbols.iter().map(|s| stream_name(s)).collect(),
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        })
    }
}
