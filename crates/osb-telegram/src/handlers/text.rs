use std::sync::Arc;

use teloxide::prelude::*;
use tracing::debug;

use osb_core::{
    domain::Sender,
    session::{Awaiting, Consumed},
};

use crate::handlers::search::{run_search, SearchContext};
use crate::router::AppState;

const START_HINT: &str = "Use /start to see what I can do.";

/// Plain text is only meaningful as the answer to an open session.
pub async fn handle_text(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text().map(|s| s.to_string()) else {
        return Ok(());
    };

    let sender = Sender::new(user.id.0 as i64, user.username.as_deref());
    let chat_id = msg.chat.id.0;

    match state.sessions.consume(sender.id).await {
        Consumed::Active(session) => match session.awaiting {
            Awaiting::SearchQuery => {
                run_search(
                    SearchContext {
                        bot,
                        state,
                        chat_id,
                        sender,
                    },
                    text,
                )
                .await
            }
        },
        Consumed::Expired(session) => {
            debug!(user = %sender, opened_at = ?session.opened_at, "session expired");
            bot.send_message(
                msg.chat.id,
                "That prompt has expired. Send /searchdb again.",
            )
            .await?;
            Ok(())
        }
        Consumed::None => {
            bot.send_message(msg.chat.id, START_HINT).await?;
            Ok(())
        }
    }
}
