//! Market module
//!
//! Tradable symbol pairs, the per-row price state and the catalog that
//! lists every pair the exchange currently trades.

mod exchange_info;
mod tracker;

pub use exchange_info::{ExchangeInfoClient, ExchangeInfoConfig};
pub use tracker::{RowId, TrackedPair, TrackedPairs};

use crate::error::FeedError;
use async_trait::async_trait;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

/// A tradable exchange pair, e.g. BTCUSDT = BTC / USDT
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolPair {
    /// Exchange symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Base asset (e.g., "BTC")
    pub base_asset: String,
    /// Quote asset (e.g., "USDT")
    pub quote_asset: String,
}

impl SymbolPair {
    pub fn new(
        symbol: impl Into<String>,
        base_asset: impl Into<String>,
        quote_asset: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            base_asset: base_asset.into(),
            quote_asset: quote_asset.into(),
        }
    }

    /// A pair known only by its symbol, as when it comes from the command line
    pub fn from_symbol(symbol: impl Into<String>) -> Self {
        Self::new(symbol, "", "")
    }
}

/// Live price figures for one tracked row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceState {
    pub price: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    /// Reference ("open") price the change is measured against
    pub baseline: Option<Decimal>,
}

impl PriceState {
    /// Derive change figures for `price` against a non-zero `baseline`.
    ///
    /// Returns `None` when the baseline is zero.
    pub fn derive(price: Decimal, baseline: Decimal) -> Option<Self> {
        if baseline.is_zero() {
            return None;
        }
        let change = price - baseline;
        let change_percent = change / baseline * Decimal::ONE_HUNDRED;
        Some(Self {
            price,
            change,
            change_percent,
            baseline: Some(baseline),
        })
    }

    pub fn direction(&self) -> Direction {
        Direction::of(self.change)
    }

    /// Price rendered with magnitude-aware precision
    pub fn price_display(&self) -> String {
        format_number(self.price)
    }

    /// Change rendered with 2 decimals when the price is above 1
    pub fn change_display(&self) -> String {
        if self.price > Decimal::ONE {
            format!("{:.2}", self.change)
        } else {
            format_number(self.change)
        }
    }

    pub fn percent_display(&self) -> String {
        format!("{:.2}%", self.change_percent)
    }
}

/// Sign of a price change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn of(change: Decimal) -> Self {
        if change.is_sign_positive() && !change.is_zero() {
            Direction::Up
        } else if change.is_sign_negative() && !change.is_zero() {
            Direction::Down
        } else {
            Direction::Flat
        }
    }
}

/// Format with 2 decimals, or with enough decimals to show the leading
/// significant digits when the magnitude is below 1.
pub fn format_number(value: Decimal) -> String {
    let abs = value.abs();
    let decimals = if !abs.is_zero() && abs < Decimal::ONE {
        let inverse = (Decimal::ONE / abs).round();
        inverse.to_string().len() + 1
    } else {
        2
    };
    format!("{:.*}", decimals, value)
}

/// Source of the full list of tradable pairs
#[async_trait]
pub trait SymbolCatalog: Send + Sync {
    /// Fetch every currently tradable pair
    async fn fetch_pairs(&self) -> Result<Vec<SymbolPair>, FeedError>;
}
