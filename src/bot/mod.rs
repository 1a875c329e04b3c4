//! Telegram adapter: translates updates into machine events and renders the
//! replies back out. All conversation logic lives in [`crate::machine`].

pub mod callback_handler;
pub mod message_handler;
pub mod ui_builder;
pub mod voice_handler;

use std::sync::Arc;

use crate::collaborators::SpeechTranscription;
use crate::machine::Machine;
use crate::session::SessionManager;

pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

/// Shared handler dependencies, cloned into each dispatcher branch.
#[derive(Clone)]
pub struct BotDeps {
    pub machine: Arc<Machine>,
    pub sessions: SessionManager,
    pub speech: Arc<dyn SpeechTranscription>,
    /// Longest accepted voice note, seconds
    pub max_voice_secs: u32,
}
