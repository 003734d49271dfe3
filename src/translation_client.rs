// src/translation_client.rs
use crate::backend::BackendHttp;
use crate::error::{ClientError, ClientResult};
use crate::models::slate::TranslateBody;
use crate::models::{TranslateRequest, TranslateResponse};
use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, warn};

/// Anything that can turn a translate request into a response.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, request: TranslateRequest) -> ClientResult<TranslateResponse>;
}

#[derive(Debug, Clone)]
pub struct TranslationClient {
    http: BackendHttp,
}

impl TranslationClient {
    pub fn new(http: BackendHttp) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Translator for TranslationClient {
    async fn translate(&self, mut request: TranslateRequest) -> ClientResult<TranslateResponse> {
        if request.text.trim().is_empty() {
            return Err(ClientError::validation("nothing to translate"));
        }
        if request.user_id.is_none() {
            request = request.user_id(self.http.config().user_id.clone());
        }

        debug!(
            "🌐 Translating {} chars {} → {} (enrich: {}, presets: {})",
            request.text.chars().count(),
            request.source_lang,
            request.target_lang,
            request.enrich,
            request.presets.len()
        );

        let body: TranslateBody = self
            .http
            .send(Method::POST, "/slate/translate", &request)
            .await?;

        match body {
            TranslateBody::Failed { error } => {
                warn!("Translation rejected by backend: {}", error);
                Err(ClientError::application(error))
            }
            TranslateBody::Translated(response) => Ok(response),
        }
    }
}
