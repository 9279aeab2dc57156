use std::{collections::HashMap, sync::Arc, time::Duration};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use osb_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use osb_core::{
    audit::AuditLogger,
    config::Config,
    messaging::port::MessagingPort,
    security::RateLimiter,
    session::SessionTable,
    shards::{dispatch::SearchDispatcher, registry::ShardRegistry},
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub registry: Arc<ShardRegistry>,
    pub dispatcher: Arc<SearchDispatcher>,
    pub messenger: Arc<dyn MessagingPort>,
    pub sessions: Arc<SessionTable>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub chat_locks: Arc<ChatLocks>,
    pub audit: Arc<AuditLogger>,
}

/// Serialises searches per chat so result lines from two queries never interleave.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drop locks nobody holds or waits on. Returns how many were dropped.
    pub async fn prune(&self) -> usize {
        let mut map = self.inner.lock().await;
        let before = map.len();
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - map.len()
    }
}

pub async fn run_polling(
    cfg: Arc<Config>,
    registry: Arc<ShardRegistry>,
    dispatcher: Arc<SearchDispatcher>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.require_bot_token()?);

    // Drop updates that queued up while the bot was down.
    if let Err(e) = bot.delete_webhook().drop_pending_updates(true).await {
        warn!(error = %e, "failed to reset webhook");
    }
    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "osb started"),
        Err(e) => warn!(error = %e, "get_me failed"),
    }
    info!(
        mode = dispatcher.mode().label(),
        shards = registry.fulltext().len(),
        allowed_users = cfg.telegram_allowed_users.len(),
        "search ready"
    );

    // Raw messenger wrapped with pacing: one search can emit many single-line messages.
    // The Telegram adapter still retries once on 429 RetryAfter.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let throttled = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        registry,
        dispatcher,
        messenger: throttled.clone(),
        sessions: Arc::new(SessionTable::new(cfg.session_ttl)),
        rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
            cfg.rate_limit_enabled,
            cfg.rate_limit_requests,
            cfg.rate_limit_window,
        ))),
        chat_locks: Arc::new(ChatLocks::default()),
        audit: Arc::new(AuditLogger::new(
            cfg.audit_log_path.clone(),
            cfg.audit_log_json,
        )),
    });
    spawn_housekeeping(state.clone(), throttled, cfg.session_ttl);

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Periodically drop expired sessions and idle per-user and per-chat state.
fn spawn_housekeeping(state: Arc<AppState>, throttled: Arc<ThrottledMessenger>, ttl: Duration) {
    let period = ttl.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        loop {
            tick.tick().await;
            let now = tokio::time::Instant::now();
            let sessions = state.sessions.sweep_at(now).await;
            let buckets = state.rate_limiter.lock().await.prune_at(now.into_std());
            let clocks = throttled.prune_idle(now).await;
            let locks = state.chat_locks.prune().await;
            if sessions + buckets + clocks + locks > 0 {
                debug!(sessions, buckets, clocks, locks, "idle state pruned");
            }
        }
    });
}
