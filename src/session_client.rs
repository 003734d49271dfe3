// src/session_client.rs
use crate::backend::BackendHttp;
use crate::error::{ClientError, ClientResult};
use crate::models::{CreateSessionRequest, CreateSessionResponse};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Method;
use tracing::info;

#[derive(Debug, Clone)]
pub struct SessionClient {
    http: BackendHttp,
}

impl SessionClient {
    pub fn new(http: BackendHttp) -> Self {
        Self { http }
    }

    /// Asks the backend for a new host/guest session.
    pub async fn create_session(&self, request: &CreateSessionRequest) -> ClientResult<CreateSessionResponse> {
        if request.host_language.trim().is_empty() || request.target_language.trim().is_empty() {
            return Err(ClientError::validation("both languages are required"));
        }

        info!(
            "🆕 Creating session {} → {} ({:?})",
            request.host_language, request.target_language, request.mode
        );
        let response: CreateSessionResponse = self
            .http
            .send(Method::POST, "/sessions", request)
            .await?;

        if response.session_id.trim().is_empty() {
            return Err(ClientError::application("backend returned an empty session id"));
        }
        info!("✅ Session {} created", response.session_id);
        Ok(response)
    }
}

/// Decodes the invite QR into PNG bytes. Accepts a bare payload or a data URL.
pub fn decode_qr_png(qr_base64: &str) -> ClientResult<Vec<u8>> {
    let payload = qr_base64
        .split_once("base64,")
        .map(|(_, rest)| rest)
        .unwrap_or(qr_base64)
        .trim();
    STANDARD
        .decode(payload)
        .map_err(|e| ClientError::application(format!("invalid QR payload: {}", e)))
}
