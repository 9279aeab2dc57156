use std::sync::Arc;

use teloxide::prelude::*;

use osb_core::{
    domain::{ChatId, Sender},
    session::Awaiting,
    shards::{
        acquire::AcquisitionState,
        dispatch::SearchMode,
        registry::{ShardDescriptor, ShardRegistry},
    },
};

use crate::router::AppState;

use super::search::{run_search, SearchContext};

pub(crate) fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

fn help_text(mode: SearchMode) -> String {
    let search = match mode {
        SearchMode::Prefix => "Look up phone, email or name prefixes in the primary shard",
        SearchMode::FullText => "Search a phrase across all full-text shards",
    };
    format!(
        "🔎 Sharded record search\n\n\
Search mode: {mode}\n\n\
📋 Commands:\n\
/start - Show this help message\n\
/searchdb [query] - {search}\n\
/shards - Show which shards are on disk\n\
/cancel - Drop a pending search prompt",
        mode = mode.label()
    )
}

fn format_size(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB {
        return format!("{:.1} MiB", bytes as f64 / MIB as f64);
    }
    if bytes >= 1024 {
        return format!("{:.1} KiB", bytes as f64 / 1024.0);
    }
    format!("{bytes} B")
}

fn shard_status_line(shard: &ShardDescriptor, state: AcquisitionState) -> String {
    let label = if shard.id.is_primary() {
        "primary".to_string()
    } else {
        format!("shard {}", shard.id)
    };
    if state.present {
        format!("✅ {label}: {}", format_size(state.size_bytes))
    } else {
        format!("❌ {label}: missing")
    }
}

fn shards_report(registry: &ShardRegistry) -> String {
    let lines: Vec<String> = registry
        .all()
        .map(|s| shard_status_line(s, AcquisitionState::probe(&s.local_path)))
        .collect();
    lines.join("\n")
}

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let sender = Sender::new(user.id.0 as i64, user.username.as_deref());
    let chat_id = msg.chat.id.0;

    let (cmd, arg) = parse_command(text);

    match cmd.as_str() {
        "start" | "help" => {
            bot.send_message(msg.chat.id, help_text(state.dispatcher.mode()))
                .await?;
            Ok(())
        }

        "searchdb" => {
            if arg.is_empty() {
                state
                    .sessions
                    .open(sender.id, ChatId(chat_id), Awaiting::SearchQuery)
                    .await;
                bot.send_message(msg.chat.id, "Send the text to search for.")
                    .await?;
                return Ok(());
            }

            // An inline query replaces any pending prompt.
            state.sessions.cancel(sender.id).await;
            run_search(
                SearchContext {
                    bot,
                    state,
                    chat_id,
                    sender,
                },
                arg,
            )
            .await
        }

        "shards" => {
            let registry = state.registry.clone();
            let report = tokio::task::spawn_blocking(move || shards_report(&registry))
                .await
                .unwrap_or_else(|e| format!("Shard status unavailable: {e}"));
            bot.send_message(msg.chat.id, report).await?;
            Ok(())
        }

        "cancel" => {
            let reply = if state.sessions.cancel(sender.id).await {
                "Cancelled."
            } else {
                "Nothing to cancel."
            };
            bot.send_message(msg.chat.id, reply).await?;
            Ok(())
        }

        _ => {
            bot.send_message(msg.chat.id, "Unknown command. Use /start to see the list.")
                .await?;
            Ok(())
        }
    }
}
