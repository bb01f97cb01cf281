//! Tokio driver for [`Lifecycle`]: owns the WebSocket, the reconnect timer,
//! the outbound queue and the replies still owed to socket commands.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use forest_common::{CommandRequest, CommandResponse, FUNCTIONS_RESULT};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::frame::InboundFrame;
use super::lifecycle::{ConnectionState, DEFAULT_RECONNECT_DELAY, Lifecycle};
use crate::dispatch::http::TOKEN_HEADER;
use crate::dispatch::{CommandTransport, DEFAULT_REQUEST_TIMEOUT};
use crate::errors::ChannelError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Ack = oneshot::Sender<Result<(), ChannelError>>;
type Reply = oneshot::Sender<Result<CommandResponse, ChannelError>>;

/// Function sent first on every new connection to enumerate capabilities.
pub const HANDSHAKE_FUNCTION: &str = "get_functions";

/// Connection parameters for a [`SocketSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    pub reconnect_delay: Duration,
    /// Upper bound on one connect attempt, WebSocket upgrade included.
    pub connect_timeout: Duration,
    pub token: Option<String>,
    pub handshake: CommandRequest,
}

impl SessionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_REQUEST_TIMEOUT,
            token: None,
            handshake: CommandRequest::new(HANDSHAKE_FUNCTION),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }
}

/// One queued text frame. `reply` is set when the sender waits for the
/// backend's answer, not just for the write.
struct Outbound {
    function: String,
    text: String,
    ack: Ack,
    reply: Option<Reply>,
}

/// Cloneable command handle onto a running [`SocketSession`].
///
/// As a [`CommandTransport`] each request resolves with the next inbound
/// frame whose `result` is a string other than `"functions"`. Replies are
/// matched first in, first out.
#[derive(Clone)]
pub struct SocketTransport {
    state_rx: watch::Receiver<ConnectionState>,
    outbound_tx: mpsc::Sender<Outbound>,
}

impl SocketTransport {
    async fn enqueue(
        &self,
        request: &CommandRequest,
        reply: Option<Reply>,
    ) -> Result<(), ChannelError> {
        let text = request.to_json()?;
        if *self.state_rx.borrow() != ConnectionState::Connected {
            return Err(ChannelError::Disconnected);
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        let outbound = Outbound {
            function: request.function.clone(),
            text,
            ack: ack_tx,
            reply,
        };
        self.outbound_tx
            .send(outbound)
            .await
            .map_err(|_| ChannelError::Disconnected)?;
        ack_rx.await.map_err(|_| ChannelError::Disconnected)?
    }

    /// Write one envelope without waiting for an answer.
    pub async fn send_command(&self, request: &CommandRequest) -> Result<(), ChannelError> {
        self.enqueue(request, None).await
    }
}

#[async_trait]
impl CommandTransport for SocketTransport {
    async fn send(&self, request: &CommandRequest) -> Result<CommandResponse, ChannelError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(request, Some(reply_tx)).await?;
        // Sender dropped: the connection closed before an answer came.
        reply_rx.await.map_err(|_| ChannelError::Disconnected)?
    }
}

/// A self-reconnecting socket connection.
///
/// The driver task lives exactly as long as this handle: `shutdown()` or
/// dropping the handle stops it, pending reconnect timer included.
pub struct SocketSession {
    transport: SocketTransport,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

enum ConnectionEnd {
    Closed,
    Shutdown,
}

impl SocketSession {
    /// Start connecting immediately. Inbound frames arrive on the returned receiver.
    pub fn spawn(config: SessionConfig) -> (Self, mpsc::UnboundedReceiver<InboundFrame>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let driver = Driver {
            lifecycle: Lifecycle::new(config.reconnect_delay),
            config,
            state_tx,
            frames_tx,
            outbound_rx,
            shutdown_rx,
            pending: VecDeque::new(),
        };
        let task = tokio::spawn(driver.run());

        let session = Self {
            transport: SocketTransport {
                state_rx,
                outbound_tx,
            },
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        };
        (session, frames_rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self.transport.state_rx.borrow()
    }

    /// Watch connection state changes (the view indicator).
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.transport.state_rx.clone()
    }

    /// Command transport over this connection, for a `Dispatcher`.
    pub fn transport(&self) -> SocketTransport {
        self.transport.clone()
    }

    /// Wait until the connection reaches `target`.
    pub async fn wait_for(&self, target: ConnectionState) -> Result<(), ChannelError> {
        let mut rx = self.transport.state_rx.clone();
        rx.wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| ChannelError::Disconnected)
    }

    /// Send one envelope as a text frame.
    ///
    /// Rejected with `ChannelError::Disconnected` unless the socket is
    /// connected and the handshake has gone out. Nothing is queued for later.
    pub async fn send_command(&self, request: &CommandRequest) -> Result<(), ChannelError> {
        self.transport.send_command(request).await
    }

    /// Close the socket and stop reconnecting.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SocketSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Driver {
    config: SessionConfig,
    lifecycle: Lifecycle,
    state_tx: watch::Sender<ConnectionState>,
    frames_tx: mpsc::UnboundedSender<InboundFrame>,
    outbound_rx: mpsc::Receiver<Outbound>,
    shutdown_rx: oneshot::Receiver<()>,
    pending: VecDeque<(String, Reply)>,
}

impl Driver {
    async fn run(mut self) {
        self.lifecycle.open();

        loop {
            self.publish();
            info!(url = %self.config.url, "connecting");

            let attempt = {
                let attempt = connect(&self.config);
                tokio::pin!(attempt);
                loop {
                    tokio::select! {
                        result = &mut attempt => break Some(result),
                        Some(outbound) = self.outbound_rx.recv() => reject(outbound),
                        _ = &mut self.shutdown_rx => break None,
                    }
                }
            };
            let Some(connected) = attempt else {
                return self.stop();
            };

            match connected {
                Ok(stream) => {
                    self.lifecycle.opened();
                    let end = self.run_connected(stream).await;
                    self.fail_pending();
                    if let ConnectionEnd::Shutdown = end {
                        return self.stop();
                    }
                    info!("connection closed");
                }
                Err(e) => warn!(url = %self.config.url, "connection failed: {}", e),
            }

            let Some(ticket) = self.lifecycle.closed() else {
                return;
            };
            self.publish();
            info!("reconnecting in {:?}", ticket.delay);

            let timer = tokio::time::sleep(ticket.delay);
            tokio::pin!(timer);
            loop {
                tokio::select! {
                    _ = &mut timer => break,
                    Some(outbound) = self.outbound_rx.recv() => reject(outbound),
                    _ = &mut self.shutdown_rx => return self.stop(),
                }
            }

            self.lifecycle.retry_due(ticket);
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.lifecycle.state());
    }

    fn stop(&mut self) {
        self.lifecycle.closed();
        self.publish();
        debug!("socket session stopped");
    }

    /// Drop every owed reply; waiting callers see `Disconnected`.
    fn fail_pending(&mut self) {
        if !self.pending.is_empty() {
            debug!(count = self.pending.len(), "dropping unanswered socket commands");
        }
        self.pending.clear();
    }

    async fn run_connected(&mut self, stream: WsStream) -> ConnectionEnd {
        let (mut sink, mut source) = stream.split();

        let handshake = match self.config.handshake.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!("invalid handshake request: {}", e);
                return ConnectionEnd::Closed;
            }
        };
        if let Err(e) = sink.send(Message::Text(handshake.into())).await {
            warn!("handshake send failed: {}", e);
            return ConnectionEnd::Closed;
        }
        // Only now may user commands go out.
        self.publish();

        loop {
            tokio::select! {
                msg = source.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.deliver(text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => self.deliver(text),
                        Err(_) => warn!("dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => return ConnectionEnd::Closed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("socket read failed: {}", e);
                        return ConnectionEnd::Closed;
                    }
                },
                Some(outbound) = self.outbound_rx.recv() => {
                    let result = sink
                        .send(Message::Text(outbound.text.into()))
                        .await
                        .map_err(|e| ChannelError::Socket(e.to_string()));
                    let failed = result.is_err();
                    if let (false, Some(reply)) = (failed, outbound.reply) {
                        self.pending.push_back((outbound.function, reply));
                    }
                    let _ = outbound.ack.send(result);
                    if failed {
                        return ConnectionEnd::Closed;
                    }
                }
                _ = &mut self.shutdown_rx => {
                    let _ = sink.send(Message::Close(None)).await;
                    return ConnectionEnd::Shutdown;
                }
            }
        }
    }

    fn deliver(&mut self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!("dropping non-JSON frame: {}", e);
                return;
            }
        };
        if is_reply(&value) {
            self.resolve(&value);
        }
        // Receiver gone means nobody is watching; keep the connection anyway.
        let _ = self.frames_tx.send(InboundFrame::classify(value));
    }

    /// Hand a reply frame to the oldest caller still waiting for one.
    fn resolve(&mut self, value: &Value) {
        while let Some((function, reply)) = self.pending.pop_front() {
            if reply.is_closed() {
                continue;
            }
            let response =
                CommandResponse::from_value(value.clone()).map_err(|e| ChannelError::Decode {
                    function: function.clone(),
                    message: e.to_string(),
                });
            debug!(%function, "socket reply matched");
            let _ = reply.send(response);
            return;
        }
    }
}

fn is_reply(value: &Value) -> bool {
    value
        .get("result")
        .and_then(Value::as_str)
        .is_some_and(|result| result != FUNCTIONS_RESULT)
}

fn reject(outbound: Outbound) {
    let _ = outbound.ack.send(Err(ChannelError::Disconnected));
}

async fn connect(config: &SessionConfig) -> Result<WsStream, ChannelError> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| ChannelError::Socket(e.to_string()))?;
    if let Some(token) = &config.token {
        let value = HeaderValue::from_str(token).map_err(|e| ChannelError::Socket(e.to_string()))?;
        request.headers_mut().insert(TOKEN_HEADER, value);
    }

    let (stream, _response) = tokio::time::timeout(
        config.connect_timeout,
        tokio_tungstenite::connect_async(request),
    )
    .await
    .map_err(|_| ChannelError::Timeout {
        function: format!("connect {}", config.url),
        timeout: config.connect_timeout,
    })?
    .map_err(|e| ChannelError::Socket(e.to_string()))?;
    Ok(stream)
}
