use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// The only `result` value that means the operation succeeded.
pub const SUCCESS: &str = "success";

/// `result` value of the capability enumeration frame pushed over the socket.
pub const FUNCTIONS_RESULT: &str = "functions";

/// Errors building or decoding an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Command function name must not be empty")]
    EmptyFunction,

    #[error("Argument name '{0}' is reserved")]
    ReservedArgument(String),

    #[error("Malformed argument '{0}': expected key=value")]
    MalformedArgument(String),

    #[error("Envelope must be a JSON object")]
    NotAnObject,

    #[error("Envelope has no string 'result' field")]
    MissingResult,

    #[error("Envelope has no string 'function' field")]
    MissingFunction,

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A named remote call: `{function, ...args}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub function: String,
    #[serde(flatten)]
    pub args: Map<String, Value>,
}

impl CommandRequest {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            args: Map::new(),
        }
    }

    /// Add a named argument. A later value for the same key replaces the earlier one.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn with_args(mut self, args: Map<String, Value>) -> Self {
        self.args.extend(args);
        self
    }

    /// Check the request can be framed: a non-empty selector and no argument
    /// shadowing it.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.function.trim().is_empty() {
            return Err(EnvelopeError::EmptyFunction);
        }
        if self.args.contains_key("function") {
            return Err(EnvelopeError::ReservedArgument("function".to_string()));
        }
        Ok(())
    }

    /// Parse a raw JSON frame such as `{"function": "get_leaves"}`.
    pub fn from_json(text: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut map) = value else {
            return Err(EnvelopeError::NotAnObject);
        };
        let function = match map.remove("function") {
            Some(Value::String(function)) => function,
            _ => return Err(EnvelopeError::MissingFunction),
        };
        let request = Self {
            function,
            args: map,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        self.validate()?;
        Ok(serde_json::to_string(self)?)
    }
}

/// The `{result, ...payload}` envelope returned for every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub result: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl CommandResponse {
    pub fn success() -> Self {
        Self {
            result: SUCCESS.to_string(),
            payload: Map::new(),
        }
    }

    pub fn failure(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            payload: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.result == SUCCESS
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Deserialize one payload field. `Ok(None)` when the field is absent or null.
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, serde_json::Error> {
        match self.payload.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some),
        }
    }

    /// Decode a response body. A body without a string `result` is not an
    /// envelope at all and is reported as such, never as a domain failure.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Object(mut map) = value else {
            return Err(EnvelopeError::NotAnObject);
        };
        let result = match map.remove("result") {
            Some(Value::String(result)) => result,
            _ => return Err(EnvelopeError::MissingResult),
        };
        Ok(Self {
            result,
            payload: map,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, EnvelopeError> {
        Self::from_value(serde_json::from_str(text)?)
    }
}
