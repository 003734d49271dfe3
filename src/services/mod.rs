// src/services/mod.rs
pub mod chat_session;
pub mod memory_store;
pub mod notices;
pub mod slate;

pub use chat_session::{ChatSession, ChatView, Invite, SessionPhase};
pub use memory_store::MemoryStore;
pub use notices::{Notice, NoticeBoard, NoticeId, NoticeLevel};
pub use slate::{Slate, SlateView, TranslateOutcome};
