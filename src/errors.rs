//! Typed error hierarchy for the Forest client.
//!
//! Two top-level enums cover the two layers:
//! - `ChannelError`: anything that went wrong getting a command to the
//!   backend and a well-formed envelope back (plus the explicit domain
//!   failure conversion)
//! - `FleetError`: leaf reconciliation failures

use std::time::Duration;

use forest_common::EnvelopeError;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from the command channel.
///
/// Every variant except `Domain` is a transport failure: no envelope was
/// received, so no domain result exists. `Domain` only appears when a caller
/// explicitly folds a non-success `result` into the error path.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Request '{function}' failed: {source}")]
    Http {
        function: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Backend answered '{function}' with HTTP {status}")]
    Status { function: String, status: u16 },

    #[error("Malformed response to '{function}': {message}")]
    Decode { function: String, message: String },

    #[error("Request '{function}' timed out after {timeout:?}")]
    Timeout { function: String, timeout: Duration },

    #[error("Socket is not connected")]
    Disconnected,

    #[error("WebSocket error: {0}")]
    Socket(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] EnvelopeError),

    #[error("'{function}' failed with result '{result}'")]
    Domain {
        function: String,
        result: String,
        payload: Map<String, Value>,
    },
}

impl ChannelError {
    /// True for every failure that happened before an envelope was decoded.
    pub fn is_transport(&self) -> bool {
        !matches!(self, ChannelError::Domain { .. })
    }
}

/// Errors from fleet reconciliation.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Leaf '{name}' not found")]
    UnknownLeaf { name: String },

    #[error("Malformed '{field}' payload: {message}")]
    MalformedPayload { field: String, message: String },

    #[error("Fleet state lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Channel(#[from] ChannelError),
}
