//! Error taxonomy for the market-data pipeline

use thiserror::Error;

/// Errors raised by the catalog, baseline and stream components.
///
/// None of these are fatal to the process. Callers log and absorb them;
/// the worst outcome is stale or missing data for the affected symbols.
#[derive(Debug, Error)]
pub enum FeedError {
    /// HTTP request or socket I/O failed
    #[error("Transport failure: {0}")]
    Transport(String),
    /// Endpoint answered with a non-success status
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    /// Payload could not be decoded
    #[error("Parse failure: {0}")]
    Parse(String),
    /// Valid response carrying an unusable zero baseline
    #[error("Zero baseline for {0}")]
    ZeroBaseline(String),
    /// Push feed closed without being asked to
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
    /// Automatic retries stopped at the configured cap
    #[error("Retry limit of {0} reached")]
    RetryExhausted(u32),
}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FeedError::Parse(e.to_string())
        } else {
            FeedError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        FeedError::Parse(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        FeedError::Transport(e.to_string())
    }
}
