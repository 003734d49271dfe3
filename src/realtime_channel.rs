// src/realtime_channel.rs
//! One WebSocket per `(session, role, participant)`. Frames are decoded into
//! [`ChannelEvent`]s here and nowhere else.

use crate::config::{ClientConfig, ReconnectPolicy};
use crate::error::{ClientError, ClientResult};
use crate::models::chat::JoinAnnouncement;
use crate::models::{ChannelEvent, ChatMessage, OutboundChat, Role};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAddress {
    pub session_id: String,
    pub role: Role,
    pub participant_id: String,
}

impl ChannelAddress {
    pub fn new(session_id: impl Into<String>, role: Role, participant_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            role,
            participant_id: participant_id.into(),
        }
    }

    pub fn url(&self, ws_base_url: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            ws_base_url.trim_end_matches('/'),
            urlencoding::encode(&self.session_id),
            self.role.as_str(),
            urlencoding::encode(&self.participant_id)
        )
    }
}

/// What the channel reports to its owner, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSignal {
    /// The socket is up and the join announcement has been sent.
    Opened,
    Event(ChannelEvent),
    /// A non-JSON text frame, e.g. "Invalid or expired session."
    ServerText(String),
    Reconnecting { attempt: u32 },
    /// Terminal. `unexpected` is false only for a requested close.
    Closed { unexpected: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Inbound {
    Event(ChannelEvent),
    ServerText(String),
    Unrecognised(String),
}

pub(crate) fn decode_frame(text: &str) -> Inbound {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => return Inbound::ServerText(text.to_string()),
    };

    match value.get("type").and_then(Value::as_str) {
        Some("guest_joined") => Inbound::Event(ChannelEvent::GuestJoined),
        Some("suggestions") => {
            let items = value
                .get("suggestions")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|s| s.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            Inbound::Event(ChannelEvent::Suggestions(items))
        }
        _ => match serde_json::from_value::<ChatMessage>(value) {
            Ok(message) => Inbound::Event(ChannelEvent::Chat(message)),
            Err(e) => Inbound::Unrecognised(e.to_string()),
        },
    }
}

pub struct RealtimeChannel {
    address: ChannelAddress,
    outbound: mpsc::UnboundedSender<String>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RealtimeChannel {
    /// Opens the socket, announces the participant and starts pumping frames.
    ///
    /// Failing to open the first connection is returned as an error; later
    /// drops are handled by the reconnect policy and reported as signals.
    pub async fn connect(
        config: &ClientConfig,
        address: ChannelAddress,
    ) -> ClientResult<(Self, mpsc::UnboundedReceiver<ChannelSignal>)> {
        let url = address.url(&config.ws_base_url);
        info!("🔌 Connecting realtime channel {}", url);
        let socket = open_socket(&url, address.role).await?;

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (signals, signals_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let _ = signals.send(ChannelSignal::Opened);

        let pump = ChannelPump {
            url,
            role: address.role,
            policy: config.reconnect.clone(),
            signals,
            shutdown: shutdown.clone(),
        };
        let task = tokio::spawn(pump.run(socket, outbound_rx));

        Ok((
            Self {
                address,
                outbound,
                shutdown,
                task: Some(task),
            },
            signals_rx,
        ))
    }

    pub fn address(&self) -> &ChannelAddress {
        &self.address
    }

    pub fn send_chat(&self, frame: &OutboundChat) -> ClientResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(ClientError::ChannelClosed);
        }
        let text = serde_json::to_string(frame)
            .map_err(|e| ClientError::validation(format!("unserialisable frame: {}", e)))?;
        self.outbound
            .send(text)
            .map_err(|_| ClientError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.outbound.is_closed()
    }

    /// Closes the socket and waits for the pump to finish.
    pub async fn close(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Realtime channel task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn open_socket(url: &str, role: Role) -> Result<Socket, tokio_tungstenite::tungstenite::Error> {
    let (mut socket, _) = connect_async(url).await?;
    if let Some(announcement) = JoinAnnouncement::for_role(role) {
        let text = serde_json::to_string(&announcement)
            .unwrap_or_else(|_| format!(r#"{{"type":"{}"}}"#, announcement.kind));
        socket.send(Message::Text(text)).await?;
        debug!("📣 Announced {} on {}", role, url);
    }
    Ok(socket)
}

enum PumpEnd {
    Requested,
    Dropped,
}

struct ChannelPump {
    url: String,
    role: Role,
    policy: ReconnectPolicy,
    signals: mpsc::UnboundedSender<ChannelSignal>,
    shutdown: CancellationToken,
}

impl ChannelPump {
    async fn run(self, socket: Socket, mut outbound: mpsc::UnboundedReceiver<String>) {
        let unexpected = self.drive(socket, &mut outbound).await;
        // Nothing can be sent once the closed signal is out.
        drop(outbound);
        let _ = self.signals.send(ChannelSignal::Closed { unexpected });
    }

    async fn drive(&self, mut socket: Socket, outbound: &mut mpsc::UnboundedReceiver<String>) -> bool {
        loop {
            match self.pump(&mut socket, outbound).await {
                PumpEnd::Requested => {
                    if let Err(e) = socket.close(None).await {
                        debug!("Close handshake on {} failed: {}", self.url, e);
                    }
                    info!("👋 Realtime channel {} closed", self.url);
                    return false;
                }
                PumpEnd::Dropped if !self.policy.enabled => {
                    warn!("Realtime channel {} dropped; reconnect disabled", self.url);
                    return true;
                }
                PumpEnd::Dropped => match self.reconnect().await {
                    Some(fresh) => {
                        socket = fresh;
                        let _ = self.signals.send(ChannelSignal::Opened);
                    }
                    None => return !self.shutdown.is_cancelled(),
                },
            }
        }
    }

    async fn pump(&self, socket: &mut Socket, outbound: &mut mpsc::UnboundedReceiver<String>) -> PumpEnd {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return PumpEnd::Requested,
                frame = outbound.recv() => {
                    let Some(frame) = frame else {
                        return PumpEnd::Requested;
                    };
                    if let Err(e) = socket.send(Message::Text(frame)).await {
                        warn!("Send on {} failed: {}", self.url, e);
                        return PumpEnd::Dropped;
                    }
                }
                incoming = socket.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text),
                    Some(Ok(Message::Close(frame))) => {
                        warn!("Server closed {}: {:?}", self.url, frame);
                        return PumpEnd::Dropped;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Realtime channel {} errored: {}", self.url, e);
                        return PumpEnd::Dropped;
                    }
                    None => return PumpEnd::Dropped,
                },
            }
        }
    }

    fn dispatch(&self, text: &str) {
        let signal = match decode_frame(text) {
            Inbound::Event(event) => ChannelSignal::Event(event),
            Inbound::ServerText(text) => {
                warn!("Server says: {}", text);
                ChannelSignal::ServerText(text)
            }
            Inbound::Unrecognised(reason) => {
                warn!("Dropping unrecognised frame ({}): {}", reason, text);
                return;
            }
        };
        let _ = self.signals.send(signal);
    }

    async fn reconnect(&self) -> Option<Socket> {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let url = self.url.as_str();
        let role = self.role;
        let signals = &self.signals;

        let operation = move || async move {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            let _ = signals.send(ChannelSignal::Reconnecting { attempt });
            info!("🔁 Reconnecting {} (attempt {})", url, attempt);
            open_socket(url, role).await.map_err(backoff::Error::transient)
        };

        tokio::select! {
            _ = self.shutdown.cancelled() => None,
            result = backoff::future::retry(self.policy.backoff(), operation) => match result {
                Ok(socket) => {
                    info!("✅ Realtime channel {} restored", url);
                    Some(socket)
                }
                Err(e) => {
                    warn!("Giving up on {}: {}", url, e);
                    None
                }
            },
        }
    }
}
