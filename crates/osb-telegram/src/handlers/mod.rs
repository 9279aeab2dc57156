//! Telegram update handlers.
//!
//! Every message is checked against the allowlist, then routed: commands to
//! `commands`, plain text to `text` (which consumes the caller's session).

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};
use tracing::{info, warn};

use osb_core::{
    audit::AuditEvent,
    domain::{Sender, UserId},
    security::is_authorized,
};

use crate::router::AppState;

mod commands;
mod search;
mod text;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let user = msg.from();
    let user_id = user.map(|u| u.id.0 as i64);

    if !is_authorized(user_id.map(UserId), &state.cfg.telegram_allowed_users) {
        if let Some(id) = user_id {
            let sender = Sender::new(id, user.and_then(|u| u.username.as_deref()));
            info!(user = %sender, "unauthorized message rejected");
            if let Err(e) = state.audit.write(AuditEvent::unauthorized(&sender)) {
                warn!(error = %e, "failed to write unauthorized audit event");
            }
        }
        let _ = bot
            .send_message(
                msg.chat.id,
                "Unauthorized. Contact the bot owner for access.",
            )
            .await;
        return Ok(());
    }

    let is_command = msg.text().map(|t| t.starts_with('/'));
    match is_command {
        Some(true) => commands::handle_command(bot, msg, state).await,
        Some(false) => text::handle_text(bot, msg, state).await,
        None => {
            let _ = bot
                .send_message(msg.chat.id, "Only text messages are supported.")
                .await;
            Ok(())
        }
    }
}
