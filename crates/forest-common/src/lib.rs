//! Wire types shared by every Forest transport.
//!
//! The druid API speaks a single envelope convention on both HTTP and
//! WebSocket: a request is a flat JSON object whose `function` field selects
//! the remote operation, and a response is a flat JSON object whose `result`
//! field is `"success"` or some other string.
//!
//! | Module     | Contents                                              |
//! |------------|-------------------------------------------------------|
//! | `envelope` | `CommandRequest`, `CommandResponse`, `EnvelopeError`  |
//! | `model`    | `Leaf`, `Branch`, `Species`, `LogEvent`               |

pub mod envelope;
pub mod model;

pub use envelope::{CommandRequest, CommandResponse, EnvelopeError, FUNCTIONS_RESULT, SUCCESS};
pub use model::{Branch, Leaf, LogEvent, Species};
