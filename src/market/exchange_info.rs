//! Exchange-info client for symbol discovery
//!
//! Fetches the list of pairs currently in TRADING status from the Binance
//! REST directory endpoint. Records missing any of symbol, base asset or
//! quote asset are skipped.

use super::{SymbolCatalog, SymbolPair};
use crate::error::FeedError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Binance REST base URL
pub const BINANCE_REST_URL: &str = "https://api.binance.com";

const EXCHANGE_INFO_PATH: &str = "/api/v3/exchangeInfo";

/// Configuration for the exchange-info client
#[derive(Debug, Clone)]
pub struct ExchangeInfoConfig {
    /// Base URL for the REST API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for ExchangeInfoConfig {
    fn default() -> Self {
        Self {
            base_url: BINANCE_REST_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Client for the exchange directory endpoint
pub struct ExchangeInfoClient {
    config: ExchangeInfoConfig,
    client: Client,
}

impl ExchangeInfoClient {
    /// Create a client with default configuration
    pub fn new() -> Result<Self, FeedError> {
        Self::with_config(ExchangeInfoConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: ExchangeInfoConfig) -> Result<Self, FeedError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Reuse an existing HTTP client
    pub fn with_client(config: ExchangeInfoConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn convert(response: ExchangeInfoResponse) -> Vec<SymbolPair> {
        response
            .symbols
            .into_iter()
            .filter_map(|record| {
                Some(SymbolPair::new(
                    record.symbol?,
                    record.base_asset?,
                    record.quote_asset?,
                ))
            })
            .collect()
    }
}

#[async_trait]
impl SymbolCatalog for ExchangeInfoClient {
    async fn fetch_pairs(&self) -> Result<Vec<SymbolPair>, FeedError> {
        let url = format!("{}{}", self.config.base_url, EXCHANGE_INFO_PATH);

        tracing::debug!(url = %url, "Fetching exchange info");

        let response = self
            .client
            .get(&url)
            .query(&[("symbolStatus", "TRADING")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::HttpStatus { status, body });
        }

        let body = response.text().await?;
        let info: ExchangeInfoResponse = serde_json::from_str(&body)?;
        let pairs = Self::convert(info);

        tracing::info!(pair_count = pairs.len(), "Loaded tradable pairs");

        Ok(pairs)
    }
}

/// Raw exchange-info response
#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    #[serde(default)]
    symbols: Vec<SymbolRecord>,
}

/// One symbol record; the payload carries many more fields than these
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolRecord {
    symbol: Option<String>,
    base_asset: Option<String>,
    quote_asset: Option<String>,
}
