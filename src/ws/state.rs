//! Connection state machine
//!
//! Pure transitions, no I/O. The connection driver feeds it open/close
//! events and acts on the returned outcome.

use super::ConnectionState;
use crate::retry::RetryCounter;

/// What the driver should do after the socket closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Unexpected close: wait, then reconnect
    Reconnect { attempt: u32 },
    /// Unexpected close with the reconnect cap reached: stay disconnected
    Exhausted,
    /// Operator-initiated close: stop
    Manual,
}

#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    manual_close: bool,
    reconnects: RetryCounter,
}

impl ConnectionMachine {
    pub fn new(max_reconnects: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            manual_close: false,
            reconnects: RetryCounter::new(max_reconnects),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnect attempts since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnects.get()
    }

    /// Disconnected -> Connecting. Any other state refuses, which keeps a
    /// second socket from being opened alongside the live one.
    pub fn begin_connect(&mut self) -> bool {
        if self.state != ConnectionState::Disconnected || self.manual_close {
            return false;
        }
        self.state = ConnectionState::Connecting;
        true
    }

    /// An explicit connect request clears an exhausted reconnect budget
    pub fn retrigger(&mut self) {
        self.reconnects.reset();
    }

    /// Connecting -> Connected.
    ///
    /// Returns false when the socket must be closed right away, either
    /// because a manual close arrived while connecting or because no connect
    /// was in progress.
    pub fn on_open(&mut self) -> bool {
        if self.manual_close || self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Connected;
        self.reconnects.reset();
        true
    }

    /// The socket closed (or failed to open)
    pub fn on_close(&mut self) -> CloseOutcome {
        if self.manual_close {
            self.state = ConnectionState::ClosingManually;
            return CloseOutcome::Manual;
        }
        self.state = ConnectionState::Disconnected;
        match self.reconnects.try_increment() {
            Some(attempt) => CloseOutcome::Reconnect { attempt },
            None => CloseOutcome::Exhausted,
        }
    }

    /// Flag a manual close. Returns whether a socket was live or opening.
    pub fn request_close(&mut self) -> bool {
        let was_active = matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        );
        self.manual_close = true;
        self.state = ConnectionState::ClosingManually;
        was_active
    }
}
