// src/test_support.rs
//! In-process stand-in for the chat backend: the HTTP routes and the chat
//! socket, bound to an ephemeral port.

use crate::backend::BackendHttp;
use crate::config::{ClientConfig, ReconnectPolicy};
use crate::error::{ClientError, ClientResult};
use crate::memory_client::MemoryApi;
use crate::models::{Memory, TranslateRequest, TranslateResponse};
use crate::translation_client::Translator;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, Semaphore};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

#[derive(Debug, Clone)]
pub enum ServerPush {
    Frame(String),
    Close,
}

#[derive(Debug)]
pub struct FakeState {
    pub created_sessions: Mutex<Vec<Value>>,
    pub translate_requests: Mutex<Vec<Value>>,
    pub translations: Mutex<HashMap<String, String>>,
    pub translate_failure: Mutex<Option<String>>,
    pub memories: Mutex<Vec<Memory>>,
    pub listed_users: Mutex<Vec<String>>,
    pub omit_memory_ids: Mutex<bool>,
    pub next_id: Mutex<u32>,
    /// `session/role/participant` for every socket that connected.
    pub sockets: Mutex<Vec<String>>,
    /// Text frames received over sockets, in arrival order.
    pub frames: Mutex<Vec<String>>,
    pub push: broadcast::Sender<ServerPush>,
}

pub struct FakeBackend {
    pub addr: SocketAddr,
    pub state: Arc<FakeState>,
    config: Arc<ClientConfig>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        Self::start_with(|c| c).await
    }

    pub async fn start_with<F>(customize: F) -> Self
    where
        F: FnOnce(ClientConfig) -> ClientConfig,
    {
        let (push, _) = broadcast::channel(64);
        let state = Arc::new(FakeState {
            created_sessions: Mutex::new(Vec::new()),
            translate_requests: Mutex::new(Vec::new()),
            translations: Mutex::new(HashMap::new()),
            translate_failure: Mutex::new(None),
            memories: Mutex::new(Vec::new()),
            listed_users: Mutex::new(Vec::new()),
            omit_memory_ids: Mutex::new(false),
            next_id: Mutex::new(0),
            sockets: Mutex::new(Vec::new()),
            frames: Mutex::new(Vec::new()),
            push,
        });

        let api = Router::new()
            .route("/sessions", post(create_session))
            .route("/slate/translate", post(translate))
            .route("/memory/save", post(save_memory))
            .route("/memory/edit", put(edit_memory))
            .route("/memory/delete", delete(delete_memory))
            .route("/memory/:user_id", get(list_memories))
            .route("/ws/:session_id/:role/:participant", get(socket));
        let app = Router::new().nest("/api/v1", api).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = ClientConfig::new(format!("http://{}/api/v1", addr))
            .unwrap()
            .with_reconnect(ReconnectPolicy {
                enabled: true,
                initial_interval: Duration::from_millis(20),
                max_interval: Duration::from_millis(100),
                max_elapsed: Duration::from_secs(2),
            });

        Self {
            addr,
            state,
            config: Arc::new(customize(config)),
        }
    }

    pub fn config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.config)
    }

    pub fn http(&self) -> BackendHttp {
        BackendHttp::new(self.config()).unwrap()
    }

    pub async fn script_translation(&self, text: &str, translated: &str) {
        self.state
            .translations
            .lock()
            .await
            .insert(text.to_string(), translated.to_string());
    }

    pub async fn fail_translations(&self, error: &str) {
        *self.state.translate_failure.lock().await = Some(error.to_string());
    }

    pub async fn seed_memory(&self, id: &str, message: &str) {
        self.state.memories.lock().await.push(Memory::new(id, message));
    }

    pub async fn omit_memory_ids(&self) {
        *self.state.omit_memory_ids.lock().await = true;
    }

    /// Sends a raw text frame to every connected socket.
    pub fn push_frame(&self, frame: impl Into<String>) {
        let _ = self.state.push.send(ServerPush::Frame(frame.into()));
    }

    /// Closes every connected socket from the server side.
    pub fn drop_sockets(&self) {
        let _ = self.state.push.send(ServerPush::Close);
    }

    pub async fn wait_for_frames(&self, count: usize) -> Vec<String> {
        for _ in 0..500 {
            let frames = self.state.frames.lock().await;
            if frames.len() >= count {
                return frames.clone();
            }
            drop(frames);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} socket frames", count);
    }

    pub async fn wait_for_sockets(&self, count: usize) -> Vec<String> {
        for _ in 0..500 {
            let sockets = self.state.sockets.lock().await;
            if sockets.len() >= count {
                return sockets.clone();
            }
            drop(sockets);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} socket connections", count);
    }
}

async fn next_id(state: &FakeState, prefix: &str) -> String {
    let mut next = state.next_id.lock().await;
    *next += 1;
    format!("{}-{}", prefix, *next)
}

async fn create_session(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> Json<Value> {
    state.created_sessions.lock().await.push(body);
    let session_id = next_id(&state, "session").await;
    Json(json!({
        "session_id": session_id,
        "short_url": format!("http://short.test/{}", session_id),
        "qr_base64": STANDARD.encode(PNG_MAGIC),
        "expires_at": "2026-10-18T06:00:00Z"
    }))
}

async fn translate(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> Json<Value> {
    state.translate_requests.lock().await.push(body.clone());
    if let Some(error) = state.translate_failure.lock().await.clone() {
        return Json(json!({ "error": error }));
    }

    let text = body["text"].as_str().unwrap_or_default().to_string();
    let target = body["target_lang"].as_str().unwrap_or_default();
    let translated = state
        .translations
        .lock()
        .await
        .get(&text)
        .cloned()
        .unwrap_or_else(|| format!("[{}] {}", target, text));

    let mut response = json!({
        "guest_language": translated,
        "memory_backed": false,
        "memories": []
    });
    if body["enrich"].as_bool() == Some(true) {
        response["host_language"] = json!(format!("{} (polished)", text));
    }
    Json(response)
}

async fn list_memories(
    State(state): State<Arc<FakeState>>,
    Path(user_id): Path<String>,
) -> Json<Value> {
    state.listed_users.lock().await.push(user_id.clone());
    let memories = state.memories.lock().await.clone();
    Json(json!({ "user_id": user_id, "memories": memories }))
}

async fn save_memory(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> Json<Value> {
    let message = body["message"].as_str().unwrap_or_default().to_string();
    let id = next_id(&state, "mem").await;
    state.memories.lock().await.insert(0, Memory::new(id.clone(), message.clone()));
    if *state.omit_memory_ids.lock().await {
        return Json(json!({ "status": "success", "saved_message": message }));
    }
    Json(json!({ "status": "success", "memory_id": id, "saved_message": message }))
}

async fn edit_memory(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> impl IntoResponse {
    let id = body["memory_id"].as_str().unwrap_or_default();
    let new_message = body["new_message"].as_str().unwrap_or_default();
    let mut memories = state.memories.lock().await;
    match memories.iter_mut().find(|m| m.id == id) {
        Some(memory) => {
            memory.message = new_message.to_string();
            (StatusCode::OK, Json(json!({ "status": "success", "memory_id": id })))
        }
        None => not_found(),
    }
}

async fn delete_memory(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> impl IntoResponse {
    let id = body["memory_id"].as_str().unwrap_or_default();
    let mut memories = state.memories.lock().await;
    let before = memories.len();
    memories.retain(|m| m.id != id);
    if memories.len() == before {
        return not_found();
    }
    (StatusCode::OK, Json(json!({ "status": "success", "memory_id": id })))
}

fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Memory not found" })))
}

async fn socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<FakeState>>,
    Path((session_id, role, participant)): Path<(String, String, String)>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state, session_id, role, participant))
}

async fn serve_socket(
    mut socket: WebSocket,
    state: Arc<FakeState>,
    session_id: String,
    role: String,
    participant: String,
) {
    let mut pushes = state.push.subscribe();
    state
        .sockets
        .lock()
        .await
        .push(format!("{}/{}/{}", session_id, role, participant));

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        state.frames.lock().await.push(text.clone());
                        if let Ok(frame) = serde_json::from_str::<Value>(&text) {
                            if let Some(message) = frame["message"].as_str() {
                                let echo = json!({
                                    "from": role,
                                    "original": message,
                                    "translated": format!("[tr] {}", message),
                                    "autoModeEnabled": frame["autoModeEnabled"],
                                });
                                let _ = state.push.send(ServerPush::Frame(echo.to_string()));
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
            pushed = pushes.recv() => {
                match pushed {
                    Ok(ServerPush::Frame(frame)) => {
                        if socket.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Ok(ServerPush::Close) => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                    Err(_) => break,
                }
            }
        }
    }
}

/// In-memory [`MemoryApi`] with optional gating so tests can observe a round
/// trip while it is outstanding.
pub struct FakeMemoryApi {
    memories: std::sync::Mutex<Vec<Memory>>,
    failure: std::sync::Mutex<Option<String>>,
    omit_ids: bool,
    gate: Option<Semaphore>,
    next_id: AtomicUsize,
    list_calls: AtomicUsize,
    save_calls: AtomicUsize,
}

impl FakeMemoryApi {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            memories: std::sync::Mutex::new(
                entries.iter().map(|(id, m)| Memory::new(*id, *m)).collect(),
            ),
            failure: std::sync::Mutex::new(None),
            omit_ids: false,
            gate: None,
            next_id: AtomicUsize::new(100),
            list_calls: AtomicUsize::new(0),
            save_calls: AtomicUsize::new(0),
        }
    }

    pub fn without_ids(mut self) -> Self {
        self.omit_ids = true;
        self
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    pub fn fail_next(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Vec<Memory> {
        self.memories.lock().unwrap().clone()
    }

    async fn pass(&self) -> ClientResult<()> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        match self.failure.lock().unwrap().take() {
            Some(message) => Err(ClientError::with_status(404, message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MemoryApi for FakeMemoryApi {
    async fn list(&self) -> ClientResult<Vec<Memory>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.pass().await?;
        Ok(self.stored())
    }

    async fn save(&self, message: &str) -> ClientResult<Option<String>> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.pass().await?;
        let id = format!("m{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.memories
            .lock()
            .unwrap()
            .insert(0, Memory::new(id.clone(), message));
        Ok((!self.omit_ids).then_some(id))
    }

    async fn edit(&self, memory_id: &str, new_message: &str) -> ClientResult<()> {
        self.pass().await?;
        let mut memories = self.memories.lock().unwrap();
        let memory = memories
            .iter_mut()
            .find(|m| m.id == memory_id)
            .ok_or_else(|| ClientError::with_status(404, "Memory not found"))?;
        memory.message = new_message.to_string();
        Ok(())
    }

    async fn delete(&self, memory_id: &str) -> ClientResult<()> {
        self.pass().await?;
        let mut memories = self.memories.lock().unwrap();
        let before = memories.len();
        memories.retain(|m| m.id != memory_id);
        if memories.len() == before {
            return Err(ClientError::with_status(404, "Memory not found"));
        }
        Ok(())
    }
}

/// [`Translator`] that answers after a per-text delay, so tests can overlap
/// requests under a paused clock.
#[derive(Default)]
pub struct ScriptedTranslator {
    delays: std::sync::Mutex<HashMap<String, Duration>>,
    memory_hits: std::sync::Mutex<HashMap<String, Vec<Memory>>>,
    failures: std::sync::Mutex<HashMap<String, String>>,
    started: std::sync::Mutex<Vec<TranslateRequest>>,
    finished: std::sync::Mutex<Vec<String>>,
}

impl ScriptedTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(&self, text: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(text.to_string(), delay);
    }

    pub fn backed_by(&self, text: &str, memories: Vec<Memory>) {
        self.memory_hits.lock().unwrap().insert(text.to_string(), memories);
    }

    pub fn fail(&self, text: &str, error: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(text.to_string(), error.to_string());
    }

    /// Every request that reached the translator, in call order.
    pub fn started(&self) -> Vec<TranslateRequest> {
        self.started.lock().unwrap().clone()
    }

    /// Texts whose translation ran to completion.
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for ScriptedTranslator {
    async fn translate(&self, request: TranslateRequest) -> ClientResult<TranslateResponse> {
        self.started.lock().unwrap().push(request.clone());
        let delay = self.delays.lock().unwrap().get(&request.text).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.finished.lock().unwrap().push(request.text.clone());

        if let Some(error) = self.failures.lock().unwrap().get(&request.text) {
            return Err(ClientError::application(error.clone()));
        }
        let memories = self
            .memory_hits
            .lock()
            .unwrap()
            .get(&request.text)
            .cloned()
            .unwrap_or_default();
        Ok(TranslateResponse {
            host_language: request
                .enrich
                .then(|| format!("{} (polished)", request.text)),
            guest_language: format!("[{}] {}", request.target_lang, request.text),
            memory_backed: !memories.is_empty(),
            memories,
        })
    }
}
