//! Push-feed connection
//!
//! Owns the single WebSocket to the exchange stream: connect/reconnect state
//! machine, the authoritative subscription set, and the receive path that
//! hands ticks to the ingress buffer.

mod client;
mod state;
mod subscription;
mod types;

pub use client::{OpenHook, StreamConnection};
pub use state::{CloseOutcome, ConnectionMachine};
pub use subscription::{stream_name, ControlFrame, ControlMethod, SubscriptionRegistry};
pub use types::{ConnectionState, WsConfig, BINANCE_STREAM_URL};
