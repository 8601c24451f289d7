//! Trading-day ticker client
//!
//! Fetches open prices for a batch of symbols in one request. The symbol
//! list is sent as a JSON array in the `symbols` query parameter.

use super::{BaselineSource, OpenPrice};
use crate::error::FeedError;
use crate::market::ExchangeInfoConfig;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

const TRADING_DAY_PATH: &str = "/api/v3/ticker/tradingDay";

/// Configuration for the trading-day client
#[derive(Debug, Clone)]
pub struct TradingDayConfig {
    /// Base URL for the REST API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for TradingDayConfig {
    fn default() -> Self {
        let rest = ExchangeInfoConfig::default();
        Self {
            base_url: rest.base_url,
            timeout: rest.timeout,
        }
    }
}

/// Client for the trading-day ticker endpoint
pub struct TradingDayClient {
    config: TradingDayConfig,
    client: Client,
}

impl TradingDayClient {
    pub fn new() -> Result<Self, FeedError> {
        Self::with_config(TradingDayConfig::default())
    }

    pub fn with_config(config: TradingDayConfig) -> Result<Self, FeedError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Reuse an existing HTTP client
    pub fn with_client(config: TradingDayConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// Parse a response body. Entries without a symbol are skipped and an
    /// unparseable open price becomes zero.
    fn parse_response(body: &str) -> Result<Vec<OpenPrice>, FeedError> {
        let entries: Vec<TradingDayEntry> = serde_json::from_str(body)?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let symbol = entry.symbol?;
                Some(OpenPrice {
                    open_price: parse_open_price(entry.open_price.as_ref()),
                    symbol,
                })
            })
            .collect())
    }
}

fn parse_open_price(value: Option<&Value>) -> Decimal {
    let parsed = match value {
        Some(Value::String(s)) => Decimal::from_str(s).ok(),
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    };
    parsed.unwrap_or(Decimal::ZERO)
}

#[async_trait]
impl BaselineSource for TradingDayClient {
    async fn fetch_open_prices(&self, symbols: &[String]) -> Result<Vec<OpenPrice>, FeedError> {
        let url = format!("{}{}", self.config.base_url, TRADING_DAY_PATH);
        let symbol_list = serde_json::to_string(symbols)?;

        tracing::debug!(url = %url, symbols = %symbol_list, "Fetching open prices");

        let response = self
            .client
            .get(&url)
            .query(&[("symbols", symbol_list.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::HttpStatus { status, body });
        }

        let body = response.text().await?;
        Self::parse_response(&body)
    }
}

/// One entry of the trading-day response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TradingDayEntry {
    symbol: Option<String>,
    open_price: Option<Value>,
}
