// src/models/session.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of a session a participant is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Host => "host",
            Role::Guest => "guest",
        }
    }

    pub fn peer(&self) -> Role {
        match self {
            Role::Host => Role::Guest,
            Role::Guest => Role::Host,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Auto,
    Confirm,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    pub host_language: String,
    pub target_language: String,
    pub mode: SessionMode,
}

impl CreateSessionRequest {
    pub fn new(host_language: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            host_language: host_language.into(),
            target_language: target_language.into(),
            mode: SessionMode::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CreateSessionResponse {
    pub session_id: String,
    /// PNG of the invite QR code, base64 without a data-URL prefix.
    pub qr_base64: String,
    #[serde(default)]
    pub short_url: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
}
