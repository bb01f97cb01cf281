//! Resource-style API under `/api/*`, used alongside the command channel
//! for settings and paginated logs.

use forest_common::{Leaf, LogEvent, Species};
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::dispatch::http::TOKEN_HEADER;
use crate::errors::ChannelError;

#[derive(Debug, Clone)]
pub struct ResourceClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ResourceClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// `/api/{collection}[/{id}[/{query}]]`
    pub fn resource_url(&self, collection: &str, id: Option<&str>, query: Option<&str>) -> String {
        let mut url = format!("{}/api/{}", self.base_url, collection);
        if let Some(id) = id {
            url.push('/');
            url.push_str(id);
            if let Some(query) = query {
                url.push('/');
                url.push_str(query);
            }
        }
        url
    }

    pub async fn list_leaves(&self) -> Result<Vec<Leaf>, ChannelError> {
        let url = self.resource_url("leaves", None, None);
        self.request_json(Method::GET, &url, None::<&()>, &[]).await
    }

    pub async fn leaf_settings(&self, leaf_id: &str) -> Result<Value, ChannelError> {
        let url = self.resource_url("leaves", Some(leaf_id), Some("settings"));
        self.request_json(Method::GET, &url, None::<&()>, &[]).await
    }

    pub async fn save_leaf_settings(
        &self,
        leaf_id: &str,
        settings: &Value,
    ) -> Result<Value, ChannelError> {
        let url = self.resource_url("leaves", Some(leaf_id), Some("settings"));
        self.request_json(Method::POST, &url, Some(settings), &[]).await
    }

    /// `PATCH /api/leaves/:id {active}`; returns the updated leaf.
    pub async fn set_active(&self, leaf_id: &str, active: bool) -> Result<Leaf, ChannelError> {
        let url = self.resource_url("leaves", Some(leaf_id), None);
        self.request_json(Method::PATCH, &url, Some(&json!({"active": active})), &[])
            .await
    }

    /// Newest-first log page, optionally starting after the cursor `from`.
    pub async fn leaf_logs(
        &self,
        leaf_id: &str,
        from: Option<&str>,
    ) -> Result<Vec<LogEvent>, ChannelError> {
        let url = self.resource_url("leaves", Some(leaf_id), Some("logs"));
        let query: Vec<(&str, &str)> = from.map(|cursor| ("from", cursor)).into_iter().collect();
        self.request_json(Method::GET, &url, None::<&()>, &query).await
    }

    pub async fn list_species(&self) -> Result<Vec<Species>, ChannelError> {
        let url = self.resource_url("species", None, None);
        self.request_json(Method::GET, &url, None::<&()>, &[]).await
    }

    /// Any other resource, decoded as raw JSON.
    pub async fn get_json(
        &self,
        collection: &str,
        id: Option<&str>,
        query: Option<&str>,
    ) -> Result<Value, ChannelError> {
        let url = self.resource_url(collection, id, query);
        self.request_json(Method::GET, &url, None::<&()>, &[]).await
    }

    async fn request_json<B, T>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
        query: &[(&str, &str)],
    ) -> Result<T, ChannelError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let label = format!("{method} {url}");
        debug!(%label, "resource request");

        let mut builder = self.client.request(method, url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        if let Some(token) = &self.token {
            builder = builder.header(TOKEN_HEADER, token);
        }

        let resp = builder.send().await.map_err(|source| ChannelError::Http {
            function: label.clone(),
            source,
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ChannelError::Status {
                function: label,
                status: status.as_u16(),
            });
        }

        let text = resp.text().await.map_err(|source| ChannelError::Http {
            function: label.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| ChannelError::Decode {
            function: label,
            message: e.to_string(),
        })
    }
}
