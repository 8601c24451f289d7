//! Configuration types for crypto-tracker

use crate::baseline::{RetryPolicy, TradingDayConfig};
use crate::dispatch::DispatcherConfig;
use crate::market::ExchangeInfoConfig;
use crate::telemetry::LogFormat;
use crate::ws::{WsConfig, BINANCE_STREAM_URL};
use serde::Deserialize;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoints: EndpointsConfig,
    pub baseline: BaselineConfig,
    pub stream: StreamConfig,
    pub dispatch: DispatchConfig,
    pub watch: WatchConfig,
    pub telemetry: TelemetryConfig,
}

/// Exchange endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub rest_url: String,
    pub stream_url: String,
    pub request_timeout_secs: u64,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            rest_url: "https://api.binance.com".to_string(),
            stream_url: BINANCE_STREAM_URL.to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl EndpointsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn exchange_info(&self) -> ExchangeInfoConfig {
        ExchangeInfoConfig {
            base_url: self.rest_url.clone(),
            timeout: self.request_timeout(),
        }
    }

    pub fn trading_day(&self) -> TradingDayConfig {
        TradingDayConfig {
            base_url: self.rest_url.clone(),
            timeout: self.request_timeout(),
        }
    }
}

/// Zero-baseline retry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub retry_delay_secs: u64,
    pub max_retries: u32,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            retry_delay_secs: 10,
            max_retries: 10,
        }
    }
}

impl BaselineConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_secs(self.retry_delay_secs),
            max_retries: self.max_retries,
        }
    }
}

/// Push-feed connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub reconnect_delay_secs: u64,
    pub max_reconnect_attempts: u32,
    pub ping_interval_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: 30,
            max_reconnect_attempts: 10,
            ping_interval_secs: 30,
        }
    }
}

impl StreamConfig {
    pub fn ws_config(&self, url: &str) -> WsConfig {
        WsConfig::new(url)
            .max_reconnects(self.max_reconnect_attempts)
            .reconnect_delay(Duration::from_secs(self.reconnect_delay_secs))
            .ping_interval(Duration::from_secs(self.ping_interval_secs))
    }
}

/// Dispatcher and ingress buffer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub interval_ms: u64,
    pub buffer_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            buffer_capacity: 100,
        }
    }
}

impl DispatchConfig {
    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            interval: Duration::from_millis(self.interval_ms),
        }
    }
}

/// Symbols tracked when none are given on the command line
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub symbols: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    /// Prometheus exporter port; no exporter when unset
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.dispatch.buffer_capacity == 0 {
            anyhow::bail!("dispatch.buffer_capacity must be greater than zero");
        }
        if self.dispatch.interval_ms == 0 {
            anyhow::bail!("dispatch.interval_ms must be greater than zero");
        }
        if self.endpoints.request_timeout_secs == 0 {
            anyhow::bail!("endpoints.request_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}
