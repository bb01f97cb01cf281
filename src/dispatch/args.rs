//! Typed argument parsing for ad-hoc commands typed at the CLI or console.
//!
//! A line is either a raw JSON envelope (`{"function": "get_leaves"}`) or
//! `function key=value ...`. Each value is read as JSON when it parses as
//! JSON (`active=false`, `limit=20`, `branch=["a","b"]`) and as a plain
//! string otherwise (`name=main`).

use forest_common::{CommandRequest, EnvelopeError};
use serde_json::{Map, Value};

/// Parse `key=value` tokens into an argument map.
pub fn parse_args<S: AsRef<str>>(tokens: &[S]) -> Result<Map<String, Value>, EnvelopeError> {
    let mut args = Map::new();
    for token in tokens {
        let token = token.as_ref();
        let Some((key, raw)) = token.split_once('=') else {
            return Err(EnvelopeError::MalformedArgument(token.to_string()));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(EnvelopeError::MalformedArgument(token.to_string()));
        }
        if key == "function" {
            return Err(EnvelopeError::ReservedArgument(key.to_string()));
        }
        args.insert(key.to_string(), parse_value(raw));
    }
    Ok(args)
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Parse one console line into a request.
pub fn parse_command_line(line: &str) -> Result<CommandRequest, EnvelopeError> {
    let line = line.trim();
    if line.starts_with('{') {
        return CommandRequest::from_json(line);
    }

    let mut tokens = line.split_whitespace();
    let function = tokens.next().ok_or(EnvelopeError::EmptyFunction)?;
    let rest: Vec<&str> = tokens.collect();
    let request = CommandRequest::new(function).with_args(parse_args(&rest)?);
    request.validate()?;
    Ok(request)
}
