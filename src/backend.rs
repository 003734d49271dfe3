// src/backend.rs
//! Shared HTTP plumbing for the session, translation and memory clients.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct BackendHttp {
    client: Client,
    config: Arc<ClientConfig>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

impl BackendHttp {
    pub fn new(config: Arc<ClientConfig>) -> ClientResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) async fn get<R>(&self, path: &str) -> ClientResult<R>
    where
        R: DeserializeOwned,
    {
        self.execute::<(), R>(Method::GET, path, None).await
    }

    pub(crate) async fn send<B, R>(&self, method: Method, path: &str, body: &B) -> ClientResult<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        self.execute(method, path, Some(body)).await
    }

    async fn execute<B, R>(&self, method: Method, path: &str, body: Option<&B>) -> ClientResult<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self.config.endpoint(path);
        debug!("➡️ {} {}", method, url);

        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            error!("{} {} failed: {}", method, url, e);
            ClientError::from(e)
        })?;

        let status = response.status();
        let text = response.text().await?;
        debug!("⬅️ {} {} ({} bytes)", status, url, text.len());

        if !status.is_success() {
            let message = error_message(&text).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            error!("Backend error from {} ({}): {}", url, status, message);
            return Err(ClientError::with_status(status.as_u16(), message));
        }

        serde_json::from_str(&text).map_err(|e| {
            error!("Unexpected response body from {}: {}", url, e);
            ClientError::from(e)
        })
    }
}

fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match (parsed.detail, parsed.error) {
        (Some(serde_json::Value::String(detail)), _) => Some(detail),
        (Some(detail), _) => Some(detail.to_string()),
        (None, Some(error)) => Some(error),
        (None, None) => None,
    }
}
