use std::sync::Arc;

use teloxide::{prelude::*, types::ChatAction};
use tracing::{info, warn};

use osb_core::{
    audit::AuditEvent,
    domain::{ChatId, Sender},
    security::RateDecision,
    shards::sink::{MessengerSink, ResultSink},
};

use crate::router::AppState;

#[derive(Clone)]
pub struct SearchContext {
    pub bot: Bot,
    pub state: Arc<AppState>,
    pub chat_id: i64,
    pub sender: Sender,
}

/// Run one search and deliver its lines to the chat, one message per line.
pub async fn run_search(ctx: SearchContext, query: String) -> ResponseResult<()> {
    let SearchContext {
        bot,
        state,
        chat_id,
        sender,
    } = ctx;

    let query = query.trim().to_string();
    if query.is_empty() {
        bot.send_message(teloxide::types::ChatId(chat_id), "Empty query, nothing to search.")
            .await?;
        return Ok(());
    }

    // Rate limit before the shard scan.
    let decision = state.rate_limiter.lock().await.check(sender.id);
    if let RateDecision::Limited { retry_after } = decision {
        let retry = retry_after.as_secs_f64();
        if let Err(e) = state
            .audit
            .write(AuditEvent::rate_limit(&sender, retry))
        {
            warn!(error = %e, "failed to write rate_limit audit event");
        }
        bot.send_message(
            teloxide::types::ChatId(chat_id),
            format!("⏳ Too many searches. Please wait {retry:.1} seconds."),
        )
        .await?;
        return Ok(());
    }

    // One search at a time per chat keeps result lines contiguous.
    let _guard = state.chat_locks.lock_chat(chat_id).await;

    // Typing loop (best-effort) while shards are scanned.
    let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();
    let bot_for_typing = bot.clone();
    let chat_for_typing = teloxide::types::ChatId(chat_id);
    let typing_task = tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(4));
        loop {
            tokio::select! {
              _ = tick.tick() => {
                let _ = bot_for_typing.send_chat_action(chat_for_typing, ChatAction::Typing).await;
              }
              _ = &mut stop_rx => break,
            }
        }
    });

    let request = state.dispatcher.request(query.clone());
    let mode = request.mode;
    let result = state.dispatcher.dispatch(request).await;

    let _ = stop_tx.send(());
    let _ = typing_task.await;

    let sink = MessengerSink::new(state.messenger.clone(), ChatId(chat_id));
    let report = sink.deliver(&result).await;

    info!(
        user = %sender,
        mode = mode.label(),
        lines = result.lines.len(),
        records = result.record_count(),
        undelivered = report.failed.len(),
        "search answered"
    );
    if let Err(e) = state.audit.write(AuditEvent::search(
        &sender,
        mode,
        &query,
        &result,
        report.failed.len(),
    )) {
        warn!(error = %e, "failed to write search audit event");
    }

    Ok(())
}
