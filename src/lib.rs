// lib.rs - Client library for the chat translation backend
pub mod backend;
pub mod config;
pub mod error;
pub mod memory_client;
pub mod models;
pub mod realtime_channel;
pub mod services;
pub mod session_client;
pub mod translation_client;

#[cfg(test)]
mod test_support;

// Re-export commonly used types for convenience
pub use backend::BackendHttp;
pub use config::{ClientConfig, ReconnectPolicy};
pub use error::{ClientError, ClientResult, ConfigError};
pub use memory_client::{MemoryApi, MemoryClient};
pub use realtime_channel::{ChannelAddress, ChannelSignal, RealtimeChannel};
pub use session_client::{decode_qr_png, SessionClient};
pub use translation_client::{TranslationClient, Translator};
