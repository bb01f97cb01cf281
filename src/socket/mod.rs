//! Live event stream: a self-reconnecting WebSocket to the druid API.
//!
//! ## Module Map
//!
//! | Module      | Responsibility                                          |
//! |-------------|---------------------------------------------------------|
//! | `lifecycle` | Pure `Disconnected/Connecting/Connected` state machine  |
//! | `session`   | Tokio driver: connect, handshake, fixed-delay reconnect |
//! |             | plus `SocketTransport`, the socket command transport    |
//! | `frame`     | Classify inbound frames: capabilities vs. events        |
//!
//! ## Connection Flow
//!
//! 1. `SocketSession::spawn()` opens the first connection with no delay.
//! 2. On open, the driver sends `{"function": "get_functions"}` and only then
//!    reports `Connected`, so no user command can precede the handshake.
//! 3. Every text frame is parsed as JSON and classified; non-JSON frames are
//!    dropped with a warning.
//! 4. On close or failed attempt the state drops to `Disconnected` and a
//!    reconnect fires after the same fixed delay every time.
//! 5. Commands sent while not connected fail with `ChannelError::Disconnected`.
//! 6. `SocketSession::transport()` plugs the socket into a `Dispatcher`: each
//!    request resolves with the next frame carrying a non-`functions`
//!    `result`. Replies still owed when the connection drops fail with
//!    `Disconnected`.
//! 7. A connect attempt that outlives `connect_timeout` counts as failed and
//!    schedules the usual retry.

pub mod frame;
pub mod lifecycle;
pub mod session;

pub use frame::InboundFrame;
pub use lifecycle::{ConnectionState, DEFAULT_RECONNECT_DELAY, Lifecycle, RetryTicket};
pub use session::{HANDSHAKE_FUNCTION, SessionConfig, SocketSession, SocketTransport};
