//! Push-feed message types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One inbound tick, queued between the socket and the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressMessage {
    /// Trading symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Last traded price
    pub last_price: Decimal,
    /// Local timestamp when the frame was received
    pub received_at: DateTime<Utc>,
}

impl IngressMessage {
    pub fn new(symbol: impl Into<String>, last_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            last_price,
            received_at: Utc::now(),
        }
    }
}
