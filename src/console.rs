//! View-model for the interactive druid console.
//!
//! The console owns three things the view binds to: the connection
//! indicator, the list of functions the backend advertised, and the event
//! log. Frames from the socket are applied here and nowhere else.

use forest_common::CommandRequest;
use serde_json::Value;

use crate::socket::{ConnectionState, InboundFrame};

/// What applying a frame changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEffect {
    CapabilitiesUpdated(usize),
    EventAppended(usize),
}

#[derive(Debug, Clone, Default)]
pub struct ConsoleView {
    connection: ConnectionState,
    capabilities: Vec<String>,
    events: Vec<Value>,
}

impl ConsoleView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn set_connection(&mut self, state: ConnectionState) {
        self.connection = state;
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn events(&self) -> &[Value] {
        &self.events
    }

    pub fn apply(&mut self, frame: InboundFrame) -> FrameEffect {
        match frame {
            InboundFrame::Functions(functions) => {
                self.capabilities = functions;
                FrameEffect::CapabilitiesUpdated(self.capabilities.len())
            }
            InboundFrame::Event(event) => {
                self.events.push(event);
                FrameEffect::EventAppended(self.events.len() - 1)
            }
        }
    }

    /// Start a new request: the log shows only the output of the latest one.
    pub fn begin_request(&mut self) {
        self.events.clear();
    }

    /// Advisory check before sending. Anything goes until the backend has
    /// advertised its functions.
    pub fn knows(&self, request: &CommandRequest) -> bool {
        self.capabilities.is_empty() || self.capabilities.iter().any(|f| *f == request.function)
    }
}
