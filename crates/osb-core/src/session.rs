//! Per-user conversation sessions.
//!
//! A session is opened when a command asks the user for input and is destroyed
//! when the next text message consumes it, when the user cancels, or when it
//! expires. Nothing else survives between messages.

use std::{collections::HashMap, time::Duration};

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::{ChatId, UserId};

/// What the bot is waiting for from the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Awaiting {
    /// The next text message is a database search query.
    SearchQuery,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub awaiting: Awaiting,
    pub opened_at: Instant,
    pub expires_at: Instant,
}

impl SessionContext {
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Outcome of handing a text message to the session table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Consumed {
    Active(SessionContext),
    Expired(SessionContext),
    None,
}

/// Open sessions, at most one per user. Owned by the bot's app state.
#[derive(Debug)]
pub struct SessionTable {
    ttl: Duration,
    open: Mutex<HashMap<UserId, SessionContext>>,
}

impl SessionTable {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Open (or replace) the user's session.
    pub async fn open(&self, user_id: UserId, chat_id: ChatId, awaiting: Awaiting) -> SessionContext {
        self.open_at(user_id, chat_id, awaiting, Instant::now()).await
    }

    pub async fn open_at(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        awaiting: Awaiting,
        now: Instant,
    ) -> SessionContext {
        let ctx = SessionContext {
            user_id,
            chat_id,
            awaiting,
            opened_at: now,
            expires_at: now + self.ttl,
        };
        let mut open = self.open.lock().await;
        open.retain(|_, s| !s.is_expired_at(now));
        open.insert(user_id, ctx.clone());
        ctx
    }

    /// Remove and return the user's session. Each session is consumed at most once.
    pub async fn consume(&self, user_id: UserId) -> Consumed {
        self.consume_at(user_id, Instant::now()).await
    }

    pub async fn consume_at(&self, user_id: UserId, now: Instant) -> Consumed {
        match self.open.lock().await.remove(&user_id) {
            Some(ctx) if ctx.is_expired_at(now) => Consumed::Expired(ctx),
            Some(ctx) => Consumed::Active(ctx),
            None => Consumed::None,
        }
    }

    /// Destroy the user's session, if any. Returns whether one was open.
    pub async fn cancel(&self, user_id: UserId) -> bool {
        self.open.lock().await.remove(&user_id).is_some()
    }

    /// Drop expired sessions; returns how many were removed.
    pub async fn sweep_at(&self, now: Instant) -> usize {
        let mut open = self.open.lock().await;
        let before = open.len();
        open.retain(|_, s| !s.is_expired_at(now));
        before - open.len()
    }

    pub async fn len(&self) -> usize {
        self.open.lock().await.len()
    }
}
