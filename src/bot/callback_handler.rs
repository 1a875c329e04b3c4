//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{debug, warn};

use crate::machine::{Callback, Event};

use super::ui_builder::send_replies;
use super::BotDeps;

/// Handle callback queries from inline keyboards.
pub async fn callback_handler(
    bot: Bot,
    q: teloxide::types::CallbackQuery,
    deps: BotDeps,
) -> Result<()> {
    debug!(user_id = %q.from.id, data = ?q.data, "Received callback query from user");

    let chat_id = match &q.message {
        Some(message) => message.chat().id,
        None => {
            // No originating message to reply into; just stop the spinner.
            bot.answer_callback_query(q.id).await?;
            return Ok(());
        }
    };

    let callback = q.data.as_deref().and_then(Callback::parse);
    match callback {
        Some(callback) => {
            let mut session = deps.sessions.get_or_create(chat_id.0).await;
            let replies = deps
                .machine
                .dispatch(&mut session, Event::Callback(callback))
                .await;
            deps.sessions.save(session).await;
            send_replies(&bot, chat_id, &replies).await?;
        }
        None => {
            warn!(user_id = %q.from.id, data = ?q.data, "Unrecognised callback payload");
        }
    }

    // Answer the callback query to remove the loading state
    bot.answer_callback_query(q.id).await?;
    Ok(())
}
