// src/config.rs
//! Client configuration, loaded from the environment (and `.env`) once and then
//! handed to every client explicitly.

use crate::error::ConfigError;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/api/v1/ws";
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000/s";
pub const DEFAULT_USER_ID: &str = "123";
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1200);
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(6);

/// How the realtime channel behaves when the socket drops without being asked to.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            max_elapsed: Duration::from_secs(60),
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub(crate) fn backoff(&self) -> backoff::ExponentialBackoff {
        backoff::ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: 2.0,
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base for every HTTP endpoint, e.g. `http://localhost:8000/api/v1`.
    pub api_base_url: String,
    /// Base for the realtime socket, e.g. `ws://localhost:8000/api/v1/ws`.
    pub ws_base_url: String,
    /// Guest-facing page that the invite link points at.
    pub frontend_base_url: String,
    pub user_id: String,
    pub debounce: Duration,
    pub request_timeout: Option<Duration>,
    pub reconnect: ReconnectPolicy,
    pub notice_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_urls(DEFAULT_API_URL.to_string(), DEFAULT_WS_URL.to_string())
    }
}

impl ClientConfig {
    /// Builds a config for the given API base, deriving the socket base from it.
    pub fn new(api_base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let api_base_url = trim_slash(api_base_url.into());
        let ws_base_url = derive_ws_url(&api_base_url)?;
        Ok(Self::with_urls(api_base_url, ws_base_url))
    }

    fn with_urls(api_base_url: String, ws_base_url: String) -> Self {
        Self {
            api_base_url,
            ws_base_url,
            frontend_base_url: DEFAULT_FRONTEND_URL.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            debounce: DEFAULT_DEBOUNCE,
            request_timeout: None,
            reconnect: ReconnectPolicy::default(),
            notice_ttl: DEFAULT_NOTICE_TTL,
        }
    }

    /// Loads `.env` (if present) and reads the `CHATTOZ_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api = lookup("CHATTOZ_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let mut config = Self::new(api)?;

        if let Some(ws) = lookup("CHATTOZ_WS_URL") {
            config = config.with_ws_base_url(ws)?;
        }
        if let Some(frontend) = lookup("CHATTOZ_FRONTEND_URL") {
            config.frontend_base_url = trim_slash(frontend);
        }
        if let Some(user_id) = lookup("CHATTOZ_USER_ID") {
            if user_id.trim().is_empty() {
                return Err(invalid("CHATTOZ_USER_ID", &user_id, "must not be empty"));
            }
            config.user_id = user_id;
        }
        if let Some(ms) = lookup("CHATTOZ_DEBOUNCE_MS") {
            config.debounce = Duration::from_millis(parse_number("CHATTOZ_DEBOUNCE_MS", &ms)?);
        }
        if let Some(secs) = lookup("CHATTOZ_REQUEST_TIMEOUT_SECS") {
            let secs = parse_number("CHATTOZ_REQUEST_TIMEOUT_SECS", &secs)?;
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(flag) = lookup("CHATTOZ_RECONNECT") {
            config.reconnect.enabled = parse_flag("CHATTOZ_RECONNECT", &flag)?;
        }
        if let Some(secs) = lookup("CHATTOZ_RECONNECT_MAX_ELAPSED_SECS") {
            config.reconnect.max_elapsed =
                Duration::from_secs(parse_number("CHATTOZ_RECONNECT_MAX_ELAPSED_SECS", &secs)?);
        }
        if let Some(secs) = lookup("CHATTOZ_NOTICE_TTL_SECS") {
            config.notice_ttl = Duration::from_secs(parse_number("CHATTOZ_NOTICE_TTL_SECS", &secs)?);
        }

        Ok(config)
    }

    pub fn with_ws_base_url(mut self, url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = trim_slash(url.into());
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::UnsupportedScheme(url));
        }
        self.ws_base_url = url;
        Ok(self)
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_frontend_base_url(mut self, url: impl Into<String>) -> Self {
        self.frontend_base_url = trim_slash(url.into());
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }

    pub fn invite_url(&self, session_id: &str) -> String {
        format!("{}/{}", self.frontend_base_url, session_id)
    }
}

fn trim_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn derive_ws_url(api: &str) -> Result<String, ConfigError> {
    if let Some(rest) = api.strip_prefix("https://") {
        Ok(format!("wss://{}/ws", rest))
    } else if let Some(rest) = api.strip_prefix("http://") {
        Ok(format!("ws://{}/ws", rest))
    } else {
        Err(ConfigError::UnsupportedScheme(api.to_string()))
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| invalid(key, value, e.to_string()))
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected true or false")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_local_backend() {
        let config = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8000/api/v1");
        assert_eq!(config.ws_base_url, "ws://localhost:8000/api/v1/ws");
        assert_eq!(config.user_id, "123");
        assert_eq!(config.debounce, Duration::from_millis(1200));
        assert!(config.request_timeout.is_none());
        assert!(config.reconnect.enabled);
    }

    #[test]
    fn test_https_api_derives_wss_socket() {
        let config = ClientConfig::new("https://chat.example.com/api/v1/").unwrap();
        assert_eq!(config.api_base_url, "https://chat.example.com/api/v1");
        assert_eq!(config.ws_base_url, "wss://chat.example.com/api/v1/ws");
        assert_eq!(
            config.endpoint("/slate/translate"),
            "https://chat.example.com/api/v1/slate/translate"
        );
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("CHATTOZ_WS_URL", "ws://10.0.0.2:9000/socket/"),
            ("CHATTOZ_USER_ID", "alice"),
            ("CHATTOZ_DEBOUNCE_MS", "300"),
            ("CHATTOZ_REQUEST_TIMEOUT_SECS", "15"),
            ("CHATTOZ_RECONNECT", "off"),
        ]))
        .unwrap();
        assert_eq!(config.ws_base_url, "ws://10.0.0.2:9000/socket");
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.debounce, Duration::from_millis(300));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(15)));
        assert!(!config.reconnect.enabled);
    }

    #[test]
    fn test_bad_values_are_rejected() {
        let err = ClientConfig::from_lookup(lookup_from(&[("CHATTOZ_DEBOUNCE_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "CHATTOZ_DEBOUNCE_MS", .. }));

        let err = ClientConfig::from_lookup(lookup_from(&[("CHATTOZ_API_URL", "ftp://host")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme(_)));

        let err = ClientConfig::from_lookup(lookup_from(&[("CHATTOZ_WS_URL", "http://host/ws")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme(_)));
    }

    #[test]
    fn test_invite_url_uses_frontend_base() {
        let config = ClientConfig::default().with_frontend_base_url("https://chattoz.app/s/");
        assert_eq!(config.invite_url("abc-123"), "https://chattoz.app/s/abc-123");
    }
}
