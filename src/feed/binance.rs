//! Binance combined-stream frame decoding

use super::IngressMessage;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

/// Combined-stream envelope: `{"stream": "...", "data": {...}}`.
/// The symbol is read from the payload, so the stream name is skipped.
#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    data: Option<MiniTicker>,
}

/// 24h mini-ticker payload
#[derive(Debug, Deserialize)]
struct MiniTicker {
    /// Symbol
    #[serde(rename = "s")]
    symbol: String,
    /// Close (last) price
    #[serde(rename = "c")]
    close: String,
}

/// Decode one text frame into a tick.
///
/// Returns `None` for malformed JSON, envelopes without a `data` field
/// (subscription acknowledgements and the like) and unparseable prices.
pub fn parse_frame(text: &str) -> Option<IngressMessage> {
    let envelope: StreamEnvelope = serde_json::from_str(text).ok()?;
    let ticker = envelope.data?;
    let last_price = Decimal::from_str(&ticker.close).ok()?;

    Some(IngressMessage::new(ticker.symbol, last_price))
}
