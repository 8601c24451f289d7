//! crypto-tracker: live cryptocurrency price tracker
//!
//! This library provides the core components for:
//! - Pair discovery via the Binance exchange directory
//! - Daily open ("baseline") prices with zero-value retry
//! - A single multiplexed push-stream connection with fixed-delay reconnects
//! - A bounded drop-oldest ingress buffer
//! - A fixed-cadence dispatcher deriving change figures per tracked row
//! - Logging and Prometheus metrics

pub mod baseline;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod feed;
pub mod market;
pub mod pipeline;
pub mod retry;
pub mod telemetry;
pub mod ws;
