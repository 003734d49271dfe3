// src/services/chat_session.rs
//! Host and guest sides of a live chat: session start, the invite, the
//! message log and suggestions fed by the realtime channel.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::{
    ChannelEvent, ChatMessage, CreateSessionRequest, CreateSessionResponse, OutboundChat, Role,
    TranslateRequest,
};
use crate::realtime_channel::{ChannelAddress, ChannelSignal, RealtimeChannel};
use crate::services::notices::{NoticeBoard, NoticeLevel};
use crate::session_client::SessionClient;
use crate::translation_client::Translator;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Participant id the guest side connects with.
pub const GUEST_PARTICIPANT_ID: &str = "guest";

#[derive(Debug, Clone, PartialEq)]
pub struct Invite {
    pub session_id: String,
    pub qr_base64: String,
    pub invite_url: String,
    /// Invite text in the guest's language, or the original if translation failed.
    pub translated_invite: String,
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    NoSession,
    AwaitingGuest(Invite),
    Live,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatView {
    pub phase: SessionPhase,
    pub session_id: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub suggestions: Vec<String>,
    pub input: String,
    pub auto_mode: bool,
    pub auto_key: Option<String>,
    pub connected: bool,
}

impl Default for ChatView {
    fn default() -> Self {
        Self {
            phase: SessionPhase::NoSession,
            session_id: None,
            messages: Vec::new(),
            suggestions: Vec::new(),
            input: String::new(),
            auto_mode: false,
            auto_key: None,
            connected: false,
        }
    }
}

/// The backend's short link when it sent one, else the frontend page for the session.
fn invite_link(config: &ClientConfig, created: &CreateSessionResponse) -> String {
    created
        .short_url
        .clone()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| config.invite_url(&created.session_id))
}

/// Folds one channel signal into the view. Returns a notice to raise, if any.
pub(crate) fn apply_signal(view: &mut ChatView, signal: &ChannelSignal) -> Option<(NoticeLevel, String)> {
    match signal {
        ChannelSignal::Opened => {
            view.connected = true;
            None
        }
        ChannelSignal::Event(ChannelEvent::GuestJoined) => {
            if matches!(view.phase, SessionPhase::AwaitingGuest(_)) {
                view.phase = SessionPhase::Live;
                return Some((NoticeLevel::Info, "Guest joined".to_string()));
            }
            None
        }
        ChannelSignal::Event(ChannelEvent::Suggestions(items)) => {
            view.suggestions = items.clone();
            None
        }
        ChannelSignal::Event(ChannelEvent::Chat(message)) => {
            view.messages.push(message.clone());
            None
        }
        ChannelSignal::ServerText(text) => Some((NoticeLevel::Error, text.clone())),
        ChannelSignal::Reconnecting { attempt } => {
            view.connected = false;
            (*attempt == 1).then(|| (NoticeLevel::Info, "Connection lost, reconnecting".to_string()))
        }
        ChannelSignal::Closed { unexpected } => {
            view.connected = false;
            unexpected.then(|| (NoticeLevel::Error, "Chat connection closed".to_string()))
        }
    }
}

pub struct ChatSession {
    role: Role,
    config: Arc<ClientConfig>,
    notices: Arc<NoticeBoard>,
    view: Arc<RwLock<ChatView>>,
    updates: broadcast::Sender<ChannelSignal>,
    channel: Option<RealtimeChannel>,
    listener: Option<JoinHandle<()>>,
}

impl ChatSession {
    pub fn host(config: Arc<ClientConfig>, notices: Arc<NoticeBoard>) -> Self {
        Self::new(Role::Host, config, notices)
    }

    pub fn guest(config: Arc<ClientConfig>, notices: Arc<NoticeBoard>) -> Self {
        Self::new(Role::Guest, config, notices)
    }

    fn new(role: Role, config: Arc<ClientConfig>, notices: Arc<NoticeBoard>) -> Self {
        let (updates, _) = broadcast::channel(256);
        Self {
            role,
            config,
            notices,
            view: Arc::new(RwLock::new(ChatView::default())),
            updates,
            channel: None,
            listener: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub async fn view(&self) -> ChatView {
        self.view.read().await.clone()
    }

    /// Every signal the channel delivers, after it has been applied to the view.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelSignal> {
        self.updates.subscribe()
    }

    /// Translates the invite, creates the session and opens the host channel.
    pub async fn start_host(
        &mut self,
        sessions: &SessionClient,
        translator: &dyn Translator,
        request: CreateSessionRequest,
        invite_text: &str,
    ) -> ClientResult<Invite> {
        if self.role != Role::Host {
            return Err(ClientError::validation("only the host can start a session"));
        }

        let translated_invite = self.translate_invite(translator, &request, invite_text).await;

        let created = match sessions.create_session(&request).await {
            Ok(created) => created,
            Err(e) => {
                self.notices.report("Start session", &e).await;
                return Err(e);
            }
        };

        let invite = Invite {
            invite_url: invite_link(&self.config, &created),
            session_id: created.session_id,
            qr_base64: created.qr_base64,
            translated_invite,
            expires_at: created.expires_at,
        };
        self.teardown().await;
        {
            let mut view = self.view.write().await;
            *view = ChatView {
                phase: SessionPhase::AwaitingGuest(invite.clone()),
                session_id: Some(invite.session_id.clone()),
                ..ChatView::default()
            };
        }

        let participant = self.config.user_id.clone();
        self.open(&invite.session_id, &participant).await?;
        Ok(invite)
    }

    /// Joins an existing session from the guest side.
    pub async fn join_as_guest(&mut self, session_id: &str) -> ClientResult<()> {
        if self.role != Role::Guest {
            return Err(ClientError::validation("only a guest can join a session"));
        }
        if session_id.trim().is_empty() {
            let err = ClientError::validation("session id is empty");
            self.notices.report("Join session", &err).await;
            return Err(err);
        }

        self.teardown().await;
        {
            let mut view = self.view.write().await;
            *view = ChatView {
                phase: SessionPhase::Live,
                session_id: Some(session_id.to_string()),
                ..ChatView::default()
            };
        }
        self.open(session_id, GUEST_PARTICIPANT_ID).await
    }

    pub async fn set_input(&self, text: impl Into<String>) {
        self.view.write().await.input = text.into();
    }

    /// Turns auto mode on with a fresh correlation key, or off.
    pub async fn set_auto_mode(&self, enabled: bool) {
        let mut view = self.view.write().await;
        view.auto_mode = enabled;
        view.auto_key = enabled.then(|| Uuid::new_v4().to_string());
    }

    /// Sends the typed input, then clears it along with the suggestions.
    pub async fn send(&self) -> ClientResult<()> {
        let text = self.view.read().await.input.clone();
        self.transmit("Send", &text).await?;
        let mut view = self.view.write().await;
        view.input.clear();
        view.suggestions.clear();
        Ok(())
    }

    /// Sends a suggestion as-is. The typed input is left alone.
    pub async fn send_suggestion(&self, text: &str) -> ClientResult<()> {
        self.transmit("Send suggestion", text).await?;
        self.view.write().await.suggestions.clear();
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.channel.as_ref().is_some_and(|c| !c.is_closed())
    }

    /// Closes the channel. Safe to call more than once.
    pub async fn close(&mut self) {
        self.teardown().await;
    }

    async fn transmit(&self, action: &str, text: &str) -> ClientResult<()> {
        let result = self.try_transmit(text).await;
        if let Err(e) = &result {
            self.notices.report(action, e).await;
        }
        result
    }

    async fn try_transmit(&self, text: &str) -> ClientResult<()> {
        if text.trim().is_empty() {
            return Err(ClientError::validation("message is empty"));
        }
        let channel = self.channel.as_ref().ok_or(ClientError::ChannelClosed)?;
        let frame = {
            let view = self.view.read().await;
            OutboundChat {
                message: text.to_string(),
                auto_mode_enabled: view.auto_mode,
                auto_key: view.auto_key.clone(),
            }
        };
        channel.send_chat(&frame)?;
        debug!("💬 {} sent {} chars", self.role, text.len());
        Ok(())
    }

    async fn translate_invite(
        &self,
        translator: &dyn Translator,
        request: &CreateSessionRequest,
        invite_text: &str,
    ) -> String {
        if invite_text.trim().is_empty() {
            return invite_text.to_string();
        }
        let translate = TranslateRequest::new(
            invite_text,
            request.host_language.clone(),
            request.target_language.clone(),
        );
        match translator.translate(translate).await {
            Ok(response) => response.guest_language,
            Err(e) => {
                warn!("⚠️ Invite translation failed, using original text: {}", e);
                invite_text.to_string()
            }
        }
    }

    async fn open(&mut self, session_id: &str, participant_id: &str) -> ClientResult<()> {
        let address = ChannelAddress::new(session_id, self.role, participant_id);
        let (channel, signals) = match RealtimeChannel::connect(&self.config, address).await {
            Ok(opened) => opened,
            Err(e) => {
                self.notices.report("Connect", &e).await;
                return Err(e);
            }
        };
        info!("🤝 {} connected to session {}", self.role, session_id);

        self.listener = Some(tokio::spawn(listen(
            signals,
            Arc::clone(&self.view),
            Arc::clone(&self.notices),
            self.updates.clone(),
        )));
        self.channel = Some(channel);
        Ok(())
    }

    async fn teardown(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
        if let Some(listener) = self.listener.take() {
            if let Err(e) = listener.await {
                warn!("Chat listener ended abnormally: {}", e);
            }
        }
    }
}

async fn listen(
    mut signals: mpsc::UnboundedReceiver<ChannelSignal>,
    view: Arc<RwLock<ChatView>>,
    notices: Arc<NoticeBoard>,
    updates: broadcast::Sender<ChannelSignal>,
) {
    while let Some(signal) = signals.recv().await {
        let notice = apply_signal(&mut *view.write().await, &signal);
        if let Some((level, text)) = notice {
            notices.push(level, text).await;
        }
        // No subscribers is fine.
        let _ = updates.send(signal);
    }
}
