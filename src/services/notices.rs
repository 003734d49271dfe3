// src/services/notices.rs
//! Transient, dismissible notices: the one place failures reach the user.

use crate::error::ClientError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

pub type NoticeId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub id: NoticeId,
    pub level: NoticeLevel,
    pub text: String,
    pub raised_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NoticeBoard {
    ttl: chrono::Duration,
    next_id: AtomicU64,
    notices: RwLock<Vec<Notice>>,
}

impl NoticeBoard {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(6)),
            next_id: AtomicU64::new(1),
            notices: RwLock::new(Vec::new()),
        }
    }

    pub async fn push(&self, level: NoticeLevel, text: impl Into<String>) -> NoticeId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let notice = Notice {
            id,
            level,
            text: text.into(),
            raised_at: Utc::now(),
        };
        match level {
            NoticeLevel::Error => warn!("🔔 {}", notice.text),
            _ => info!("🔔 {}", notice.text),
        }
        let mut notices = self.notices.write().await;
        let now = notice.raised_at;
        notices.retain(|n| now - n.raised_at < self.ttl);
        notices.push(notice);
        id
    }

    /// Logs `err` and raises a user-facing notice for it.
    pub async fn report(&self, action: &str, err: &ClientError) -> NoticeId {
        error!("{} failed: {}", action, err);
        let text = match err {
            ClientError::Transport(_) | ClientError::Socket(_) => {
                format!("{}: network or server error", action)
            }
            ClientError::Application { message, .. } => format!("{} failed: {}", action, message),
            ClientError::Validation(reason) => format!("{}: {}", action, reason),
            ClientError::ChannelClosed => format!("{}: chat connection is closed", action),
        };
        self.push(NoticeLevel::Error, text).await
    }

    pub async fn dismiss(&self, id: NoticeId) -> bool {
        let mut notices = self.notices.write().await;
        let before = notices.len();
        notices.retain(|n| n.id != id);
        notices.len() != before
    }

    /// Notices still within their lifetime, oldest first.
    pub async fn active(&self) -> Vec<Notice> {
        let now = Utc::now();
        self.notices
            .read()
            .await
            .iter()
            .filter(|n| now - n.raised_at < self.ttl)
            .cloned()
            .collect()
    }

    /// Drops notices older than the configured lifetime; returns how many went.
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let mut notices = self.notices.write().await;
        let before = notices.len();
        notices.retain(|n| now - n.raised_at < self.ttl);
        before - notices.len()
    }
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_NOTICE_TTL)
    }
}
