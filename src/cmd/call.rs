//! Raw command calls: `forest call` and `forest login`.

use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use serde_json::{Map, Value};

use forest::config::ForestConfig;
use forest::dispatch::{Dispatcher, Outcome, parse_args};
use forest::socket::{ConnectionState, SocketSession};
use forest::ui::icons;

use super::{dispatcher, session_config};

/// Send `{function, ...args}` and print the envelope. A domain failure
/// exits non-zero after printing.
///
/// With `socket` the request goes over the live socket and resolves with
/// the first reply frame instead of an HTTP response.
pub async fn cmd_call(
    config: &ForestConfig,
    function: &str,
    args: &[String],
    socket: bool,
) -> Result<()> {
    let args = parse_args(args).context("Invalid arguments")?;
    let outcome = if socket {
        let (session, _frames) = SocketSession::spawn(session_config(config));
        tokio::time::timeout(
            config.request_timeout(),
            session.wait_for(ConnectionState::Connected),
        )
        .await
        .with_context(|| format!("Could not connect to {}", config.websocket_url()))??;
        let outcome = Dispatcher::new(Arc::new(session.transport()))
            .with_timeout(config.request_timeout())
            .call(function, args)
            .await;
        session.shutdown().await;
        outcome?
    } else {
        dispatcher(config).call(function, args).await?
    };

    let response = outcome.response();
    let mut body = response.payload.clone();
    body.insert("result".to_string(), Value::String(response.result.clone()));
    println!("{}", serde_json::to_string_pretty(&Value::Object(body))?);

    match outcome {
        Outcome::Success(_) => Ok(()),
        Outcome::Failure(response) => {
            anyhow::bail!("'{}' failed with result '{}'", function, response.result)
        }
    }
}

pub async fn cmd_login(config: &ForestConfig, username: &str, password: &str) -> Result<()> {
    // Credentials stay strings even when they look like JSON.
    let mut args = Map::new();
    args.insert("username".to_string(), Value::from(username));
    args.insert("password".to_string(), Value::from(password));
    let outcome = dispatcher(config).call("login_user", args).await?;
    match outcome {
        Outcome::Success(_) => {
            println!("{}{}", icons::CHECK, style("Logged in").green());
            Ok(())
        }
        Outcome::Failure(response) => {
            println!("{}{}", icons::CROSS, style("Login rejected").red().bold());
            anyhow::bail!("Login rejected with result '{}'", response.result)
        }
    }
}
