//! Voice Handler module: download, transcribe, resolve intent, dispatch.

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{error, info};

use crate::intent::{self, Resolution};
use crate::machine::{Command, Event};
use crate::session::ChatState;

use super::message_handler::download_file;
use super::ui_builder::send_replies;
use super::BotDeps;

pub async fn handle_voice(bot: &Bot, msg: &Message, deps: &BotDeps) -> Result<()> {
    let Some(voice) = msg.voice() else {
        return Ok(());
    };
    info!(user_id = %msg.chat.id, "Processing voice message");

    if voice.duration.seconds() > deps.max_voice_secs {
        bot.send_message(
            msg.chat.id,
            format!(
                "⏰ Please keep voice messages under {}s.",
                deps.max_voice_secs
            ),
        )
        .await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "🎤 Processing your voice…")
        .await?;

    let audio = match download_file(bot, voice.file.id.clone()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(user_id = %msg.chat.id, error = %e, "Failed to download voice note");
            bot.send_message(msg.chat.id, "❌ Couldn't fetch that voice note. Try again?")
                .await?;
            return Ok(());
        }
    };

    let transcription = match deps.speech.transcribe(&audio).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            bot.send_message(msg.chat.id, "❌ I didn't catch that — please try again.")
                .await?;
            return Ok(());
        }
        Err(e) => {
            error!(user_id = %msg.chat.id, error = %e, "Transcription failed");
            bot.send_message(msg.chat.id, "❌ I didn't catch that — please try again.")
                .await?;
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, format!("🗣️ You said: \u{201c}{transcription}\u{201d}"))
        .await?;

    let mut session = deps.sessions.get_or_create(msg.chat.id.0).await;

    // Voice commands only work after login, except inside chat mode where
    // speech is conversational content.
    if !session.is_authenticated() && session.state != ChatState::AskAnythingChat {
        bot.send_message(
            msg.chat.id,
            "🔐 Voice commands only work after login. Use /start first.",
        )
        .await?;
        return Ok(());
    }

    let in_chat_mode = session.state == ChatState::AskAnythingChat;
    let event = match intent::resolve(&transcription.to_lowercase(), in_chat_mode) {
        Resolution::Exit => Event::Command(Command::Menu),
        Resolution::ChatMessage(_) => Event::Text(transcription),
        Resolution::Command(intent) => Event::VoiceIntent(intent),
        Resolution::NoIntentMatched => {
            bot.send_message(
                msg.chat.id,
                "🤔 I didn't catch a valid command. Tap \u{201c}Ask Anything\u{201d} first if \
                 you want to chat, then speak.",
            )
            .await?;
            return Ok(());
        }
    };

    let replies = deps.machine.dispatch(&mut session, event).await;
    deps.sessions.save(session).await;

    send_replies(bot, msg.chat.id, &replies).await
}
