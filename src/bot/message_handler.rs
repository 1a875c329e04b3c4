//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{debug, error};

use crate::machine::{Command, Event};

use super::ui_builder::send_replies;
use super::BotDeps;

/// Download a Telegram file's bytes.
pub async fn download_file(bot: &Bot, file_id: teloxide::types::FileId) -> Result<Vec<u8>> {
    let file = bot.get_file(file_id).await?;
    let url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );
    let response = reqwest::get(&url).await?;
    let bytes = response.bytes().await?;
    Ok(bytes.to_vec())
}

async fn handle_text_message(bot: &Bot, msg: &Message, deps: &BotDeps, text: &str) -> Result<()> {
    debug!(user_id = %msg.chat.id, message_length = text.len(), "Received text message from user");

    let event = match Command::parse(text) {
        Some(command) => Event::Command(command),
        None => Event::Text(text.to_string()),
    };

    let mut session = deps.sessions.get_or_create(msg.chat.id.0).await;
    let replies = deps.machine.dispatch(&mut session, event).await;
    deps.sessions.save(session).await;

    send_replies(bot, msg.chat.id, &replies).await
}

async fn handle_photo_message(bot: &Bot, msg: &Message, deps: &BotDeps) -> Result<()> {
    debug!(user_id = %msg.chat.id, "Received photo message from user");

    let Some(largest_photo) = msg.photo().and_then(|photos| photos.last()) else {
        return Ok(());
    };

    let image = match download_file(bot, largest_photo.file.id.clone()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(user_id = %msg.chat.id, error = %e, "Failed to download photo");
            bot.send_message(msg.chat.id, "⚠️ Couldn't download that photo. Please try again.")
                .await?;
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, "🔄 Analysing your image...")
        .await?;

    let mut session = deps.sessions.get_or_create(msg.chat.id.0).await;
    let replies = deps.machine.dispatch(&mut session, Event::Photo(image)).await;
    deps.sessions.save(session).await;

    send_replies(bot, msg.chat.id, &replies).await
}

async fn handle_unsupported_message(bot: &Bot, msg: &Message) -> Result<()> {
    debug!(user_id = %msg.chat.id, "Received unsupported message type from user");
    bot.send_message(
        msg.chat.id,
        "I can work with text, voice notes, photos and the menu buttons. \
         Type /help to see what I can do.",
    )
    .await?;
    Ok(())
}

/// Entry point for all non-callback updates.
pub async fn message_handler(bot: Bot, msg: Message, deps: BotDeps) -> Result<()> {
    if let Some(text) = msg.text() {
        let text = text.to_string();
        handle_text_message(&bot, &msg, &deps, &text).await?;
    } else if msg.voice().is_some() {
        super::voice_handler::handle_voice(&bot, &msg, &deps).await?;
    } else if msg.photo().is_some() {
        handle_photo_message(&bot, &msg, &deps).await?;
    } else {
        handle_unsupported_message(&bot, &msg).await?;
    }
    Ok(())
}
