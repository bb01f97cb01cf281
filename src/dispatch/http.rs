//! `POST /` transport, the HTTP flavour of the command channel.

use async_trait::async_trait;
use forest_common::{CommandRequest, CommandResponse};

use super::CommandTransport;
use crate::errors::ChannelError;

/// Header the druid API reads its shared secret from.
pub const TOKEN_HEADER: &str = "token";

/// Posts each envelope as the JSON body of `POST {base_url}/`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/", base_url.trim_end_matches('/')),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CommandTransport for HttpTransport {
    async fn send(&self, request: &CommandRequest) -> Result<CommandResponse, ChannelError> {
        let function = request.function.clone();

        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(token) = &self.token {
            builder = builder.header(TOKEN_HEADER, token);
        }

        let resp = builder.send().await.map_err(|source| ChannelError::Http {
            function: function.clone(),
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChannelError::Status {
                function,
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|source| ChannelError::Http {
            function: function.clone(),
            source,
        })?;

        CommandResponse::from_json(&body).map_err(|e| ChannelError::Decode {
            function,
            message: e.to_string(),
        })
    }
}
