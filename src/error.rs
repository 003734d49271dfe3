// src/error.rs
use thiserror::Error;

/// Failures surfaced by the backend clients and the controllers built on them.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Connection refused, reset, DNS failure and friends.
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The backend answered, but not with success.
    #[error("Backend error{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Application { status: Option<u16>, message: String },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Realtime channel is closed")]
    ChannelClosed,
}

impl ClientError {
    pub fn application(message: impl Into<String>) -> Self {
        ClientError::Application {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        ClientError::Application {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    /// Transport-level failures, as opposed to the backend rejecting a request.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Socket(_))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::application(format!("Failed to parse response: {}", e))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("Unsupported URL scheme in {0}; expected http(s) or ws(s)")]
    UnsupportedScheme(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
