use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Reconnect delay when nothing is configured.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Socket connection state, also the view indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// A scheduled reconnect, valid only for the attempt that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTicket {
    generation: u64,
    pub delay: Duration,
}

/// Pure connection state machine.
///
/// ```text
/// Disconnected --open--> Connecting --opened--> Connected
///      ^                     |                      |
///      +------ closed -------+-------- closed ------+
/// ```
///
/// Every `closed` yields a [`RetryTicket`] with the same fixed delay. A ticket
/// only reopens the connection if nothing else reopened it first.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: ConnectionState,
    generation: u64,
    reconnect_delay: Duration,
    reconnects: u64,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl Lifecycle {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            generation: 0,
            reconnect_delay,
            reconnects: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// Number of reconnect attempts started from retry tickets.
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    /// Start an attempt. Returns false (and changes nothing) unless disconnected.
    pub fn open(&mut self) -> bool {
        if self.state != ConnectionState::Disconnected {
            return false;
        }
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        true
    }

    /// The pending attempt succeeded.
    pub fn opened(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Connected;
        true
    }

    /// The attempt failed or the live connection closed.
    pub fn closed(&mut self) -> Option<RetryTicket> {
        if self.state == ConnectionState::Disconnected {
            return None;
        }
        self.state = ConnectionState::Disconnected;
        Some(RetryTicket {
            generation: self.generation,
            delay: self.reconnect_delay,
        })
    }

    /// A reconnect timer fired. No-op when the ticket is stale.
    pub fn retry_due(&mut self, ticket: RetryTicket) -> bool {
        if ticket.generation != self.generation || !self.open() {
            return false;
        }
        self.reconnects += 1;
        true
    }
}
