// src/models/chat.rs
use super::session::Role;
use serde::{Deserialize, Serialize};

/// One chat line as the backend broadcasts it to both participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: Role,
    pub original: String,
    pub translated: String,
    #[serde(rename = "autoModeEnabled", default, skip_serializing_if = "Option::is_none")]
    pub auto_mode_enabled: Option<bool>,
    #[serde(rename = "autoKey", default, skip_serializing_if = "Option::is_none")]
    pub auto_key: Option<String>,
}

impl ChatMessage {
    pub fn is_from(&self, role: Role) -> bool {
        self.from == role
    }
}

/// Frame sent by a participant for every chat line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundChat {
    pub message: String,
    #[serde(rename = "autoModeEnabled")]
    pub auto_mode_enabled: bool,
    #[serde(rename = "autoKey", skip_serializing_if = "Option::is_none")]
    pub auto_key: Option<String>,
}

/// Frame the guest sends once its socket opens. The host announces nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinAnnouncement {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl JoinAnnouncement {
    pub fn for_role(role: Role) -> Option<Self> {
        match role {
            Role::Guest => Some(Self {
                kind: "guest_joined",
            }),
            Role::Host => None,
        }
    }
}

/// Everything the realtime channel can deliver, decoded once at the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    GuestJoined,
    Suggestions(Vec<String>),
    Chat(ChatMessage),
}
