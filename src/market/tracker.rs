//! Tracked rows
//!
//! A row is one tracked instance of a pair. Several rows may share a symbol,
//! and a tick for that symbol updates all of them.

use super::{PriceState, SymbolPair};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifier of a tracked row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(pub u64);

/// A pair under tracking and its latest price state
#[derive(Debug, Clone)]
pub struct TrackedPair {
    pub id: RowId,
    pub pair: SymbolPair,
    pub state: PriceState,
}

impl TrackedPair {
    pub fn symbol(&self) -> &str {
        &self.pair.symbol
    }
}

/// Shared, ordered collection of tracked rows
#[derive(Debug, Clone, Default)]
pub struct TrackedPairs {
    rows: Arc<RwLock<Vec<TrackedPair>>>,
    next_id: Arc<AtomicU64>,
}

impl TrackedPairs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a pair; returns the new row's id
    pub fn add(&self, pair: SymbolPair) -> RowId {
        let id = RowId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.rows.write().push(TrackedPair {
            id,
            pair,
            state: PriceState::default(),
        });
        id
    }

    /// Stop tracking a row
    pub fn remove(&self, id: RowId) -> Option<TrackedPair> {
        let mut rows = self.rows.write();
        let index = rows.iter().position(|row| row.id == id)?;
        Some(rows.remove(index))
    }

    pub fn get(&self, id: RowId) -> Option<TrackedPair> {
        self.rows.read().iter().find(|row| row.id == id).cloned()
    }

    /// Whether any row references `symbol`
    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.rows.read().iter().any(|row| row.symbol() == symbol)
    }

    /// Unique symbols across all rows, in first-seen order
    pub fn symbols(&self) -> Vec<String> {
        let rows = self.rows.read();
        let mut symbols: Vec<String> = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            if !symbols.iter().any(|s| s == row.symbol()) {
                symbols.push(row.symbol().to_string());
            }
        }
        symbols
    }

    pub fn snapshot(&self) -> Vec<TrackedPair> {
        self.rows.read().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Apply `state` to every row bound to `symbol`.
    ///
    /// Returns the ids of the rows that were updated, in row order.
    pub fn apply(&self, symbol: &str, state: &PriceState) -> Vec<RowId> {
        let mut rows = self.rows.write();
        rows.iter_mut()
            .filter(|row| row.symbol() == symbol)
            .map(|row| {
                row.state = state.clone();
                row.id
            })
            .collect()
    }
}
