// src/services/memory_store.rs
//! Local copy of a user's memories, reconciled with the backend after every
//! mutating call. Edits and deletes land locally only once the server confirms.

use crate::error::{ClientError, ClientResult};
use crate::memory_client::MemoryApi;
use crate::models::Memory;
use crate::services::notices::{NoticeBoard, NoticeLevel};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct StoreState {
    memories: Vec<Memory>,
    creating: bool,
    /// Outstanding edit/delete calls per memory id.
    pending: HashMap<String, usize>,
}

impl StoreState {
    fn begin(&mut self, id: &str) {
        *self.pending.entry(id.to_string()).or_insert(0) += 1;
    }

    fn finish(&mut self, id: &str) {
        if let Some(count) = self.pending.get_mut(id) {
            *count -= 1;
            if *count == 0 {
                self.pending.remove(id);
            }
        }
    }
}

pub struct MemoryStore {
    api: Arc<dyn MemoryApi>,
    notices: Arc<NoticeBoard>,
    state: RwLock<StoreState>,
}

pub(crate) fn apply_edit(memories: &mut [Memory], id: &str, new_message: &str) -> bool {
    match memories.iter_mut().find(|m| m.id == id) {
        Some(memory) => {
            memory.message = new_message.to_string();
            true
        }
        None => false,
    }
}

pub(crate) fn apply_delete(memories: &mut Vec<Memory>, id: &str) -> bool {
    let before = memories.len();
    memories.retain(|m| m.id != id);
    memories.len() != before
}

impl MemoryStore {
    pub fn new(api: Arc<dyn MemoryApi>, notices: Arc<NoticeBoard>) -> Self {
        Self {
            api,
            notices,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub async fn memories(&self) -> Vec<Memory> {
        self.state.read().await.memories.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.memories.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.memories.is_empty()
    }

    pub async fn is_creating(&self) -> bool {
        self.state.read().await.creating
    }

    /// True while an edit or delete of `id` is awaiting the server.
    pub async fn is_pending(&self, id: &str) -> bool {
        self.state.read().await.pending.contains_key(id)
    }

    /// Replaces the cache with the server's list.
    pub async fn refresh(&self) -> ClientResult<()> {
        match self.api.list().await {
            Ok(memories) => {
                debug!("Memory cache refreshed with {} entries", memories.len());
                self.state.write().await.memories = memories;
                Ok(())
            }
            Err(e) => {
                self.notices.report("Load memories", &e).await;
                Err(e)
            }
        }
    }

    /// Saves a new memory and makes it the first entry.
    pub async fn create(&self, text: &str) -> ClientResult<()> {
        if text.trim().is_empty() {
            let err = ClientError::validation("memory text is empty");
            self.notices.report("Add memory", &err).await;
            return Err(err);
        }

        self.state.write().await.creating = true;
        let result = self.api.save(text).await;
        self.state.write().await.creating = false;

        match result {
            Ok(Some(id)) => {
                self.state
                    .write()
                    .await
                    .memories
                    .insert(0, Memory::new(id, text));
            }
            // No id to key the new entry on, so take the server's list instead.
            Ok(None) => self.refresh().await?,
            Err(e) => {
                self.notices.report("Add memory", &e).await;
                return Err(e);
            }
        }
        info!("🧠 Memory added ({} total)", self.len().await);
        self.notices.push(NoticeLevel::Success, "Saved to memory").await;
        Ok(())
    }

    pub async fn edit(&self, id: &str, new_message: &str) -> ClientResult<()> {
        self.state.write().await.begin(id);
        let result = self.api.edit(id, new_message).await;

        let mut state = self.state.write().await;
        state.finish(id);
        match result {
            Ok(()) => {
                apply_edit(&mut state.memories, id, new_message);
                Ok(())
            }
            Err(e) => {
                drop(state);
                self.notices.report("Edit memory", &e).await;
                Err(e)
            }
        }
    }

    pub async fn delete(&self, id: &str) -> ClientResult<()> {
        self.state.write().await.begin(id);
        let result = self.api.delete(id).await;

        let mut state = self.state.write().await;
        state.finish(id);
        match result {
            Ok(()) => {
                apply_delete(&mut state.memories, id);
                Ok(())
            }
            Err(e) => {
                drop(state);
                self.notices.report("Delete memory", &e).await;
                Err(e)
            }
        }
    }
}
