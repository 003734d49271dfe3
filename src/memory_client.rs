// src/memory_client.rs
use crate::backend::BackendHttp;
use crate::error::{ClientError, ClientResult};
use crate::models::memory::{
    DeleteMemoryRequest, EditMemoryRequest, MemoryListResponse, MemoryStatusResponse,
    SaveMemoryRequest,
};
use crate::models::Memory;
use async_trait::async_trait;
use reqwest::Method;
use tracing::{info, warn};

/// The four memory round trips, scoped to one user.
#[async_trait]
pub trait MemoryApi: Send + Sync {
    async fn list(&self) -> ClientResult<Vec<Memory>>;
    /// Returns the new memory's id when the backend reports one.
    async fn save(&self, message: &str) -> ClientResult<Option<String>>;
    async fn edit(&self, memory_id: &str, new_message: &str) -> ClientResult<()>;
    async fn delete(&self, memory_id: &str) -> ClientResult<()>;
}

#[derive(Debug, Clone)]
pub struct MemoryClient {
    http: BackendHttp,
}

impl MemoryClient {
    pub fn new(http: BackendHttp) -> Self {
        Self { http }
    }

    fn user_id(&self) -> &str {
        &self.http.config().user_id
    }
}

fn confirm(operation: &str, response: MemoryStatusResponse) -> ClientResult<MemoryStatusResponse> {
    if response.is_success() {
        return Ok(response);
    }
    let reason = response
        .detail
        .or(response.status)
        .unwrap_or_else(|| "no status".to_string());
    warn!("Memory {} not confirmed: {}", operation, reason);
    Err(ClientError::application(format!("{} failed: {}", operation, reason)))
}

#[async_trait]
impl MemoryApi for MemoryClient {
    async fn list(&self) -> ClientResult<Vec<Memory>> {
        let path = format!("/memory/{}", urlencoding::encode(self.user_id()));
        let response: MemoryListResponse = self.http.get(&path).await?;
        info!("🧠 Loaded {} memories for user {}", response.memories.len(), self.user_id());
        Ok(response.memories)
    }

    async fn save(&self, message: &str) -> ClientResult<Option<String>> {
        if message.trim().is_empty() {
            return Err(ClientError::validation("memory text is empty"));
        }
        let body = SaveMemoryRequest {
            user_id: self.user_id(),
            message,
        };
        let response = self.http.send(Method::POST, "/memory/save", &body).await?;
        let response = confirm("save", response)?;
        info!("💾 Memory saved (id: {:?})", response.memory_id);
        Ok(response.memory_id)
    }

    async fn edit(&self, memory_id: &str, new_message: &str) -> ClientResult<()> {
        if new_message.trim().is_empty() {
            return Err(ClientError::validation("memory text is empty"));
        }
        let body = EditMemoryRequest {
            user_id: self.user_id(),
            memory_id,
            new_message,
        };
        let response = self.http.send(Method::PUT, "/memory/edit", &body).await?;
        confirm("edit", response)?;
        info!("✏️ Memory {} updated", memory_id);
        Ok(())
    }

    async fn delete(&self, memory_id: &str) -> ClientResult<()> {
        let body = DeleteMemoryRequest {
            user_id: self.user_id(),
            memory_id,
        };
        let response = self.http.send(Method::DELETE, "/memory/delete", &body).await?;
        confirm("delete", response)?;
        info!("🗑️ Memory {} deleted", memory_id);
        Ok(())
    }
}
