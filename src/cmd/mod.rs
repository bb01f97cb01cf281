//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                                                  |
//! |-----------|-------------------------------------------------------------------|
//! | `fleet`   | `Leaves`, `Toggle`, `Migrate`, `Targets`, `Branches`, `Species`,  |
//! |           | `Defaults`, `Status`, `Create`                                    |
//! | `logs`    | `Logs`, `BranchLogs`, `Settings`                                  |
//! | `call`    | `Call`, `Login`                                                   |
//! | `console` | `Console`, `Watch`                                                |
//! | `config`  | `Config`                                                          |

pub mod call;
pub mod config;
pub mod console;
pub mod fleet;
pub mod logs;

use std::sync::Arc;

use forest::config::ForestConfig;
use forest::dispatch::{Dispatcher, HttpTransport};
use forest::rest::ResourceClient;
use forest::socket::SessionConfig;

pub use call::{cmd_call, cmd_login};
pub use config::cmd_config;
pub use console::{cmd_console, cmd_watch};
pub use fleet::{
    cmd_branches, cmd_create, cmd_defaults, cmd_leaves, cmd_migrate, cmd_species, cmd_status,
    cmd_targets, cmd_toggle,
};
pub use logs::{cmd_branch_logs, cmd_logs, cmd_settings};

/// Command channel over HTTP with the configured timeout.
pub fn dispatcher(config: &ForestConfig) -> Dispatcher {
    let transport = HttpTransport::new(&config.http_base_url(), config.token());
    Dispatcher::new(Arc::new(transport)).with_timeout(config.request_timeout())
}

pub fn resources(config: &ForestConfig) -> ResourceClient {
    ResourceClient::new(&config.http_base_url(), config.token())
}

pub fn session_config(config: &ForestConfig) -> SessionConfig {
    SessionConfig::new(config.websocket_url())
        .with_reconnect_delay(config.reconnect_delay())
        .with_connect_timeout(config.request_timeout())
        .with_token(config.token())
}
