//! UI Builder module for rendering machine replies into Telegram messages

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::machine::{Keyboard, Reply};

/// Convert the machine's keyboard description into Telegram markup.
pub fn render_keyboard(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
        .0
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| {
                    InlineKeyboardButton::callback(button.label.clone(), button.data.clone())
                })
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

/// Send every reply from a transition to the chat, in order.
pub async fn send_replies(bot: &Bot, chat_id: ChatId, replies: &[Reply]) -> Result<()> {
    for reply in replies {
        let request = bot.send_message(chat_id, reply.text.clone());
        match &reply.keyboard {
            Some(keyboard) => {
                request.reply_markup(render_keyboard(keyboard)).await?;
            }
            None => {
                request.await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{Button, Callback};

    #[test]
    fn test_render_keyboard_preserves_layout() {
        let keyboard = Keyboard(vec![
            vec![
                Button::new("Register", Callback::Register),
                Button::new("Login", Callback::Login),
            ],
            vec![Button::new("🔙 Back to Menu", Callback::BackToMenu)],
        ]);
        let markup = render_keyboard(&keyboard);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert_eq!(markup.inline_keyboard[1].len(), 1);
    }
}
