//! Price feed module
//!
//! Decodes push-feed frames into ticks and buffers them between the socket
//! and the dispatcher.

mod binance;
mod buffer;
mod types;

pub use binance::parse_frame;
pub use buffer::{IngressBuffer, DEFAULT_CAPACITY};
pub use types::IngressMessage;
