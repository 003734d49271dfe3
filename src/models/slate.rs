// src/models/slate.rs
use super::memory::Memory;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslateRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
    /// Ask the backend to rewrite the source text as well as translate it.
    pub enrich: bool,
    pub presets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl TranslateRequest {
    pub fn new(
        text: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            enrich: false,
            presets: Vec::new(),
            memories: None,
            user_id: None,
        }
    }

    pub fn enrich(mut self, enrich: bool) -> Self {
        self.enrich = enrich;
        self
    }

    pub fn presets(mut self, presets: Vec<String>) -> Self {
        self.presets = presets;
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct TranslateResponse {
    /// Rewritten source text, present when enrichment ran.
    #[serde(default)]
    pub host_language: Option<String>,
    #[serde(default)]
    pub guest_language: String,
    #[serde(default)]
    pub memory_backed: bool,
    #[serde(default)]
    pub memories: Vec<Memory>,
}

/// The backend reports slate failures in-band with a 200.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TranslateBody {
    Failed { error: String },
    Translated(TranslateResponse),
}
