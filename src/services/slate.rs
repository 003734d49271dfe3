// src/services/slate.rs
//! Ad-hoc translation pad: an editable source, its translation, presets, and
//! the memories the last translation leaned on.
//!
//! Every translate call runs inside a cycle owned by a [`CancellationToken`].
//! Starting a cycle cancels the previous one under the same lock that guards
//! the view, and a result is applied only while its token is still live, so a
//! superseded response can never overwrite a newer one.

use crate::error::{ClientError, ClientResult};
use crate::memory_client::MemoryApi;
use crate::models::{Memory, TranslateRequest};
use crate::services::memory_store::{apply_delete, apply_edit};
use crate::services::notices::{NoticeBoard, NoticeLevel};
use crate::translation_client::Translator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Everything a slate screen renders.
#[derive(Debug, Clone, PartialEq)]
pub struct SlateView {
    pub source_lang: String,
    pub target_lang: String,
    pub input: String,
    pub show_output: bool,
    pub source: String,
    pub target: String,
    pub loading: bool,
    pub pending_presets: Vec<String>,
    pub applied_presets: Vec<String>,
    pub memory_backed: bool,
    pub memories_used: Vec<Memory>,
    /// Ids of used memories with an edit or delete in flight.
    pub busy_memories: Vec<String>,
}

impl SlateView {
    fn new(source_lang: &str, target_lang: &str) -> Self {
        Self {
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            input: String::new(),
            show_output: false,
            source: String::new(),
            target: String::new(),
            loading: false,
            pending_presets: Vec::new(),
            applied_presets: Vec::new(),
            memory_backed: false,
            memories_used: Vec::new(),
            busy_memories: Vec::new(),
        }
    }

    pub fn memories_badge_active(&self) -> bool {
        self.memory_backed
    }

    pub fn presets_badge_active(&self) -> bool {
        !self.applied_presets.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateOutcome {
    Applied,
    /// A newer request took over; nothing was rendered.
    Superseded,
    /// There was nothing to translate.
    Skipped,
}

struct SlateState {
    view: SlateView,
    cycle: CancellationToken,
}

struct Shared {
    translator: Arc<dyn Translator>,
    memories: Arc<dyn MemoryApi>,
    notices: Arc<NoticeBoard>,
    debounce: Duration,
    state: Mutex<SlateState>,
}

#[derive(Clone)]
pub struct Slate {
    shared: Arc<Shared>,
}

struct Call {
    text: String,
    enrich: bool,
    update_source: bool,
    presets: Vec<String>,
}

impl Slate {
    pub fn new(
        translator: Arc<dyn Translator>,
        memories: Arc<dyn MemoryApi>,
        notices: Arc<NoticeBoard>,
        debounce: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                translator,
                memories,
                notices,
                debounce,
                state: Mutex::new(SlateState {
                    view: SlateView::new("en", "ja"),
                    cycle: CancellationToken::new(),
                }),
            }),
        }
    }

    pub async fn view(&self) -> SlateView {
        self.shared.state.lock().await.view.clone()
    }

    pub async fn set_languages(&self, source_lang: &str, target_lang: &str) {
        let mut state = self.shared.state.lock().await;
        state.view.source_lang = source_lang.to_string();
        state.view.target_lang = target_lang.to_string();
    }

    pub async fn set_input(&self, text: impl Into<String>) {
        self.shared.state.lock().await.view.input = text.into();
    }

    /// Queues a preset for the next send. Returns false for blanks and repeats.
    pub async fn add_preset(&self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() {
            return false;
        }
        let mut state = self.shared.state.lock().await;
        if state.view.pending_presets.iter().any(|p| p == tag) {
            return false;
        }
        state.view.pending_presets.push(tag.to_string());
        true
    }

    pub async fn remove_pending_preset(&self, tag: &str) {
        self.shared
            .state
            .lock()
            .await
            .view
            .pending_presets
            .retain(|p| p != tag);
    }

    /// Translates the input right away, enriching the source with the pending presets.
    pub async fn send(&self) -> ClientResult<TranslateOutcome> {
        let (token, call) = {
            let mut state = self.shared.state.lock().await;
            let input = state.view.input.clone();
            if input.trim().is_empty() {
                drop(state);
                let err = ClientError::validation("type something to translate");
                self.shared.notices.report("Translate", &err).await;
                return Err(err);
            }
            state.view.show_output = true;
            state.view.source = input.clone();
            let call = Call {
                text: input,
                enrich: true,
                update_source: true,
                presets: state.view.pending_presets.clone(),
            };
            (new_cycle(&mut state), call)
        };

        let sent_presets = call.presets.clone();
        let outcome = self.fire(token, call).await?;
        if outcome == TranslateOutcome::Applied {
            let mut state = self.shared.state.lock().await;
            state.view.applied_presets = sent_presets;
            state.view.pending_presets.clear();
            state.view.input.clear();
        }
        Ok(outcome)
    }

    /// Replaces the source text and restarts the debounce window.
    pub async fn edit_source(&self, text: impl Into<String>) {
        let text = text.into();
        let token = {
            let mut state = self.shared.state.lock().await;
            state.view.source = text.clone();
            if !state.view.show_output || text.trim().is_empty() {
                state.cycle.cancel();
                state.view.loading = false;
                return;
            }
            new_cycle(&mut state)
        };

        let slate = self.clone();
        let debounce = self.shared.debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }
            let presets = slate.shared.state.lock().await.view.applied_presets.clone();
            let call = Call {
                text,
                enrich: false,
                update_source: false,
                presets,
            };
            // Failures are already on the notice board.
            let _ = slate.fire(token, call).await;
        });
    }

    /// Re-runs enrichment on the current source with the applied presets.
    pub async fn regenerate(&self) -> ClientResult<TranslateOutcome> {
        let (token, call) = {
            let mut state = self.shared.state.lock().await;
            if state.view.source.trim().is_empty() {
                drop(state);
                let err = ClientError::validation("nothing to regenerate");
                self.shared.notices.report("Regenerate", &err).await;
                return Ok(TranslateOutcome::Skipped);
            }
            let call = Call {
                text: state.view.source.clone(),
                enrich: true,
                update_source: true,
                presets: state.view.applied_presets.clone(),
            };
            (new_cycle(&mut state), call)
        };
        self.fire(token, call).await
    }

    /// Drops an applied preset and re-translates without it, skipping the debounce.
    pub async fn remove_applied_preset(&self, tag: &str) -> ClientResult<TranslateOutcome> {
        let (token, call) = {
            let mut state = self.shared.state.lock().await;
            state.view.applied_presets.retain(|p| p != tag);
            let token = new_cycle(&mut state);
            if state.view.source.trim().is_empty() {
                return Ok(TranslateOutcome::Skipped);
            }
            let call = Call {
                text: state.view.source.clone(),
                enrich: true,
                update_source: true,
                presets: state.view.applied_presets.clone(),
            };
            (token, call)
        };
        self.fire(token, call).await
    }

    /// Cancels whatever translate cycle is waiting or in flight.
    pub async fn cancel_pending(&self) {
        let mut state = self.shared.state.lock().await;
        state.cycle.cancel();
        state.view.loading = false;
    }

    pub async fn save_source_to_memory(&self) -> ClientResult<()> {
        let source = self.shared.state.lock().await.view.source.clone();
        if source.trim().is_empty() {
            let err = ClientError::validation("nothing to save");
            self.shared.notices.report("Save to memory", &err).await;
            return Err(err);
        }
        match self.shared.memories.save(&source).await {
            Ok(id) => {
                info!("💾 Slate source saved to memory (id: {:?})", id);
                self.shared
                    .notices
                    .push(NoticeLevel::Success, "Saved to memory")
                    .await;
                Ok(())
            }
            Err(e) => {
                self.shared.notices.report("Save to memory", &e).await;
                Err(e)
            }
        }
    }

    pub async fn edit_used_memory(&self, id: &str, new_message: &str) -> ClientResult<()> {
        self.mark_busy(id).await;
        let result = self.shared.memories.edit(id, new_message).await;
        let mut state = self.shared.state.lock().await;
        state.view.busy_memories.retain(|b| b != id);
        match result {
            Ok(()) => {
                apply_edit(&mut state.view.memories_used, id, new_message);
                Ok(())
            }
            Err(e) => {
                drop(state);
                self.shared.notices.report("Edit memory", &e).await;
                Err(e)
            }
        }
    }

    pub async fn delete_used_memory(&self, id: &str) -> ClientResult<()> {
        self.mark_busy(id).await;
        let result = self.shared.memories.delete(id).await;
        let mut state = self.shared.state.lock().await;
        state.view.busy_memories.retain(|b| b != id);
        match result {
            Ok(()) => {
                apply_delete(&mut state.view.memories_used, id);
                Ok(())
            }
            Err(e) => {
                drop(state);
                self.shared.notices.report("Delete memory", &e).await;
                Err(e)
            }
        }
    }

    async fn mark_busy(&self, id: &str) {
        let mut state = self.shared.state.lock().await;
        if !state.view.busy_memories.iter().any(|b| b == id) {
            state.view.busy_memories.push(id.to_string());
        }
    }

    async fn fire(&self, token: CancellationToken, call: Call) -> ClientResult<TranslateOutcome> {
        let request = {
            let mut state = self.shared.state.lock().await;
            if token.is_cancelled() {
                return Ok(TranslateOutcome::Superseded);
            }
            state.view.loading = true;
            TranslateRequest::new(
                call.text.clone(),
                state.view.source_lang.clone(),
                state.view.target_lang.clone(),
            )
            .enrich(call.enrich)
            .presets(call.presets)
        };

        let result = tokio::select! {
            _ = token.cancelled() => {
                debug!("Translate of {:?} superseded in flight", call.text);
                return Ok(TranslateOutcome::Superseded);
            }
            result = self.shared.translator.translate(request) => result,
        };

        let mut state = self.shared.state.lock().await;
        if token.is_cancelled() {
            return Ok(TranslateOutcome::Superseded);
        }
        state.view.loading = false;
        match result {
            Ok(response) => {
                if call.enrich || call.update_source {
                    state.view.source = response.host_language.unwrap_or(call.text);
                }
                state.view.target = response.guest_language;
                state.view.memory_backed = response.memory_backed;
                state.view.memories_used = response.memories;
                Ok(TranslateOutcome::Applied)
            }
            Err(e) => {
                drop(state);
                self.shared.notices.report("Translate", &e).await;
                Err(e)
            }
        }
    }
}

fn new_cycle(state: &mut SlateState) -> CancellationToken {
    state.cycle.cancel();
    state.view.loading = false;
    state.cycle = CancellationToken::new();
    state.cycle.clone()
}
