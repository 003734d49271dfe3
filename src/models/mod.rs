// src/models/mod.rs
pub mod chat;
pub mod memory;
pub mod session;
pub mod slate;

pub use chat::{ChannelEvent, ChatMessage, OutboundChat};
pub use memory::Memory;
pub use session::{CreateSessionRequest, CreateSessionResponse, Role, SessionMode};
pub use slate::{TranslateRequest, TranslateResponse};
