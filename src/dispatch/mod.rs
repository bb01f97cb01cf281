//! Command dispatch: turn a named intent into a `CommandRequest` and resolve
//! its `CommandResponse`.
//!
//! The dispatcher does not care how bytes move. A [`CommandTransport`]
//! carries one envelope out and one envelope back; [`HttpTransport`] posts to
//! the single `/` endpoint. Results are split into two channels that never
//! overlap:
//!
//! - `Err(ChannelError)`: the transport failed, nothing was decoded
//! - `Ok(Outcome::Success | Outcome::Failure)`: an envelope arrived and its
//!   `result` field decides which

pub mod args;
pub mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use forest_common::{CommandRequest, CommandResponse};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::ChannelError;

pub use args::{parse_args, parse_command_line};
pub use http::HttpTransport;

/// Upper bound on a single request when the caller sets nothing else.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Moves one request envelope to the backend and one response envelope back.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn send(&self, request: &CommandRequest) -> Result<CommandResponse, ChannelError>;
}

/// A decoded envelope, split on its `result` field.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(CommandResponse),
    Failure(CommandResponse),
}

impl Outcome {
    pub fn from_response(response: CommandResponse) -> Self {
        if response.is_success() {
            Outcome::Success(response)
        } else {
            Outcome::Failure(response)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn response(&self) -> &CommandResponse {
        match self {
            Outcome::Success(response) | Outcome::Failure(response) => response,
        }
    }

    pub fn into_response(self) -> CommandResponse {
        match self {
            Outcome::Success(response) | Outcome::Failure(response) => response,
        }
    }

    /// Fold a domain failure into `ChannelError::Domain` for a single `?` path.
    pub fn into_success(self, function: &str) -> Result<CommandResponse, ChannelError> {
        match self {
            Outcome::Success(response) => Ok(response),
            Outcome::Failure(response) => Err(ChannelError::Domain {
                function: function.to_string(),
                result: response.result,
                payload: response.payload,
            }),
        }
    }
}

/// Transport-agnostic command dispatcher with a per-request timeout.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn CommandTransport>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn CommandTransport>) -> Self {
        Self {
            transport,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a request and classify the response.
    pub async fn send(&self, request: CommandRequest) -> Result<Outcome, ChannelError> {
        request.validate()?;
        debug!(function = %request.function, "dispatching command");

        let response = tokio::time::timeout(self.timeout, self.transport.send(&request))
            .await
            .map_err(|_| ChannelError::Timeout {
                function: request.function.clone(),
                timeout: self.timeout,
            })??;

        if !response.is_success() {
            debug!(function = %request.function, result = %response.result, "command rejected");
        }
        Ok(Outcome::from_response(response))
    }

    pub async fn call(
        &self,
        function: &str,
        args: Map<String, Value>,
    ) -> Result<Outcome, ChannelError> {
        self.send(CommandRequest::new(function).with_args(args)).await
    }

    /// Like [`Dispatcher::send`] but a domain failure becomes `ChannelError::Domain`.
    pub async fn send_ok(&self, request: CommandRequest) -> Result<CommandResponse, ChannelError> {
        let function = request.function.clone();
        self.send(request).await?.into_success(&function)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Scripted, ScriptedTransport};
    use super::*;
    use forest_common::EnvelopeError;
    use serde_json::json;

    #[tokio::test]
    async fn success_envelope_resolves_to_success() {
        let transport = ScriptedTransport::new(vec![Scripted::Respond(
            CommandResponse::success().with("leaves", json!([])),
        )]);
        let dispatcher = Dispatcher::new(transport.clone());

        let outcome = dispatcher.call("get_leaves", Map::new()).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.response().get("leaves"), Some(&json!([])));
        assert_eq!(transport.sent_functions(), vec!["get_leaves"]);
    }

    #[tokio::test]
    async fn other_result_resolves_to_failure_not_error() {
        let transport =
            ScriptedTransport::new(vec![Scripted::Respond(CommandResponse::failure("error"))]);
        let dispatcher = Dispatcher::new(transport);

        let outcome = dispatcher
            .send(CommandRequest::new("login_user").arg("username", "root"))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Failure(ref r) if r.result == "error"));
    }

    #[tokio::test]
    async fn transport_error_is_never_an_outcome() {
        let transport = ScriptedTransport::new(vec![Scripted::Fail(ChannelError::Status {
            function: "get_leaves".to_string(),
            status: 502,
        })]);
        let dispatcher = Dispatcher::new(transport);

        let err = dispatcher.call("get_leaves", Map::new()).await.unwrap_err();
        assert!(err.is_transport());
        assert!(matches!(err, ChannelError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn hung_request_times_out() {
        let transport = ScriptedTransport::new(vec![Scripted::Hang]);
        let dispatcher = Dispatcher::new(transport).with_timeout(Duration::from_millis(20));

        let err = dispatcher.call("get_leaves", Map::new()).await.unwrap_err();
        assert!(
            matches!(err, ChannelError::Timeout { ref function, .. } if function == "get_leaves")
        );
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_transport() {
        let transport = ScriptedTransport::new(vec![]);
        let dispatcher = Dispatcher::new(transport.clone());

        let err = dispatcher
            .send(CommandRequest::new("get_leaves").arg("function", "x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChannelError::InvalidRequest(EnvelopeError::ReservedArgument(_))
        ));
        assert!(transport.sent_functions().is_empty());
    }

    #[tokio::test]
    async fn send_ok_folds_failure_into_domain_error() {
        let transport = ScriptedTransport::new(vec![Scripted::Respond(
            CommandResponse::failure("denied").with("reason", "bad token"),
        )]);
        let dispatcher = Dispatcher::new(transport);

        let err = dispatcher
            .send_ok(CommandRequest::new("get_branches"))
            .await
            .unwrap_err();
        match err {
            ChannelError::Domain {
                function,
                result,
                payload,
            } => {
                assert_eq!(function, "get_branches");
                assert_eq!(result, "denied");
                assert_eq!(payload["reason"], "bad token");
            }
            other => panic!("Expected Domain, got {other:?}"),
        }
    }
}
