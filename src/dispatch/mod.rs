//! Update dispatch module
//!
//! Drains the ingress buffer at a fixed cadence, derives change figures
//! against the baseline and hands batched row updates to the presentation
//! layer.

mod dispatcher;

pub use dispatcher::{DispatcherConfig, UpdateDispatcher};

use crate::market::{Direction, RowId};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;

/// New figures for one tracked row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceUpdate {
    pub row: RowId,
    pub symbol: String,
    pub price: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
}

impl PriceUpdate {
    pub fn direction(&self) -> Direction {
        Direction::of(self.change)
    }
}

/// Receiver of batched updates; one call per dispatcher tick
pub trait UpdateSink: Send + Sync {
    fn publish(&self, updates: Vec<PriceUpdate>);
}

impl UpdateSink for mpsc::UnboundedSender<Vec<PriceUpdate>> {
    fn publish(&self, updates: Vec<PriceUpdate>) {
        if self.send(updates).is_err() {
            tracing::debug!("Update receiver dropped");
        }
    }
}
