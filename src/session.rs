//! # Conversation Session Module
//!
//! Explicit per-chat session state: the current machine state, a small bag
//! of transient flags, and a cached profile copy. Sessions are owned by a
//! [`SessionManager`] keyed by platform user id, created on first contact
//! and reset (flags only) on return-to-menu or cancellation.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::estimators::feed_model::CropType;
use crate::store::UserProfile;

/// The declared conversation states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChatState {
    #[default]
    Unauthenticated,
    AwaitingAuthChoice,
    RegisteringUsername,
    RegisteringPassword,
    LoggingInUsername,
    LoggingInPassword,
    SettingTankVolume,
    SettingSoilVolume,
    MainMenu,
    AwaitingGreensInput,
    AwaitingCropSelection,
    AwaitingMlGreensInput,
    AwaitingCompostMixInput,
    AwaitingScanTypeSelection,
    AwaitingFeedingLogInput,
    AwaitingMoistureInput,
    AwaitingEcInput,
    AwaitingCo2FoodWasteInput,
    AskAnythingChat,
}

/// What an incoming photo should be analysed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanType {
    CompostTank,
    Plant,
}

impl ScanType {
    pub fn label(&self) -> &'static str {
        match self {
            ScanType::CompostTank => "compost tank",
            ScanType::Plant => "plant",
        }
    }
}

/// Transient flags, cleared whenever the machine returns to the main menu.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFlags {
    /// Username collected during a registration/login chain
    pub pending_username: Option<String>,
    /// Crop chosen before the ML greens prompt
    pub selected_crop: Option<CropType>,
    /// Which scan category the user picked
    pub scan_type: Option<ScanType>,
    /// Set after the scan prompt; a photo is only analysed while true
    pub awaiting_image: bool,
}

/// One active chat's conversation state.
#[derive(Debug, Clone, Default)]
pub struct ConversationSession {
    pub user_id: i64,
    pub state: ChatState,
    pub flags: SessionFlags,
    /// Cached profile to avoid redundant store reads within one session;
    /// invalidated after any profile write.
    pub profile: Option<UserProfile>,
}

impl ConversationSession {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.profile.is_some()
    }

    /// Return to the main menu, clearing transient flags.
    pub fn return_to_menu(&mut self) {
        self.flags = SessionFlags::default();
        self.state = ChatState::MainMenu;
    }

    /// Global cancel: back to the initial state, everything cleared.
    pub fn cancel(&mut self) {
        self.flags = SessionFlags::default();
        self.profile = None;
        self.state = ChatState::Unauthenticated;
    }

    /// Drop the cached profile after a store write.
    pub fn invalidate_profile_cache(&mut self) {
        self.profile = None;
    }
}

/// Session registry shared across handler tasks. Events for different
/// sessions may run concurrently; each session is read-modify-written by a
/// single event at a time.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<i64, ConversationSession>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the session for a user, creating it on first contact.
    pub async fn get_or_create(&self, user_id: i64) -> ConversationSession {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(&user_id) {
                return session.clone();
            }
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(user_id)
            .or_insert_with(|| ConversationSession::new(user_id))
            .clone()
    }

    /// Write a mutated session back.
    pub async fn save(&self, session: ConversationSession) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.user_id, session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_to_menu_clears_flags() {
        let mut session = ConversationSession::new(7);
        session.state = ChatState::AwaitingScanTypeSelection;
        session.flags.awaiting_image = true;
        session.flags.scan_type = Some(ScanType::Plant);

        session.return_to_menu();

        assert_eq!(session.state, ChatState::MainMenu);
        assert!(!session.flags.awaiting_image);
        assert!(session.flags.scan_type.is_none());
    }

    #[test]
    fn test_cancel_resets_to_initial_state() {
        let mut session = ConversationSession::new(7);
        session.state = ChatState::AskAnythingChat;
        session.flags.pending_username = Some("sprout".to_string());

        session.cancel();

        assert_eq!(session.state, ChatState::Unauthenticated);
        assert!(session.flags.pending_username.is_none());
        assert!(session.profile.is_none());
    }

    #[tokio::test]
    async fn test_manager_creates_on_first_contact() {
        let manager = SessionManager::new();
        let session = manager.get_or_create(42).await;
        assert_eq!(session.user_id, 42);
        assert_eq!(session.state, ChatState::Unauthenticated);

        let mut session = manager.get_or_create(42).await;
        session.state = ChatState::MainMenu;
        manager.save(session).await;

        let reloaded = manager.get_or_create(42).await;
        assert_eq!(reloaded.state, ChatState::MainMenu);
    }
}
