// src/models/memory.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    #[serde(default)]
    pub id: String,
    pub message: String,
}

impl Memory {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MemoryListResponse {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub memories: Vec<Memory>,
}

#[derive(Debug, Serialize)]
pub struct SaveMemoryRequest<'a> {
    pub user_id: &'a str,
    pub message: &'a str,
}

#[derive(Debug, Serialize)]
pub struct EditMemoryRequest<'a> {
    pub user_id: &'a str,
    pub memory_id: &'a str,
    pub new_message: &'a str,
}

#[derive(Debug, Serialize)]
pub struct DeleteMemoryRequest<'a> {
    pub user_id: &'a str,
    pub memory_id: &'a str,
}

/// Body shared by the mutating memory endpoints.
#[derive(Debug, Deserialize)]
pub struct MemoryStatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub memory_id: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl MemoryStatusResponse {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("success")
    }
}
