//! # Conversation State Machine
//!
//! The finite-state dispatcher at the heart of the bot: a typed `Event`
//! enters, a handler for the current [`ChatState`] runs (possibly invoking
//! an estimator, the store, or an AI collaborator), and the returned
//! transition names the next state. The machine is transport-free; the
//! `bot` module translates Telegram updates into events and renders the
//! replies back out.

mod auth;
mod inputs;
mod menu;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::collaborators::{ChatCompletion, VisionAnalysis};
use crate::errors::BotError;
use crate::estimators::feed_model::CropType;
use crate::estimators::Estimators;
use crate::intent::Intent;
use crate::session::{ChatState, ConversationSession};
use crate::store::ProfileStore;

/// Slash commands the transport recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Status,
    Input,
    Scan,
    Care,
    Co2,
    Profile,
    Menu,
    Cancel,
}

impl Command {
    /// Parse a `/command` string (arguments and @bot suffixes ignored).
    pub fn parse(text: &str) -> Option<Command> {
        let command = text.trim().split_whitespace().next()?;
        let command = command.split('@').next().unwrap_or(command);
        match command {
            "/start" => Some(Command::Start),
            "/help" => Some(Command::Help),
            "/status" => Some(Command::Status),
            "/input" => Some(Command::Input),
            "/scan" => Some(Command::Scan),
            "/care" => Some(Command::Care),
            "/co2" => Some(Command::Co2),
            "/profile" => Some(Command::Profile),
            "/menu" | "/back" | "/exit" => Some(Command::Menu),
            "/cancel" => Some(Command::Cancel),
            _ => None,
        }
    }
}

/// Inline-keyboard callback payloads as a tagged union, replacing
/// string-keyed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    Register,
    Login,
    CompostFeed,
    UseCalculator,
    UseMlCalculator,
    Crop(CropType),
    CompostExtract,
    FeedingLog,
    MoistureCheck,
    EcForecast,
    Co2Tracker,
    Co2Calculate,
    Co2ViewTotal,
    Co2Reset,
    ImageScan,
    ScanCompost,
    ScanPlant,
    StartChat,
    HelpCommands,
    ChangeVolumes,
    BackToMenu,
}

impl Callback {
    pub fn parse(data: &str) -> Option<Callback> {
        match data {
            "register" => Some(Callback::Register),
            "login" => Some(Callback::Login),
            "compost_feed" => Some(Callback::CompostFeed),
            "use_calculator" => Some(Callback::UseCalculator),
            "use_ml_calculator" => Some(Callback::UseMlCalculator),
            "compost_extract" => Some(Callback::CompostExtract),
            "feeding_log" => Some(Callback::FeedingLog),
            "moisture_check" => Some(Callback::MoistureCheck),
            "ec_forecast" => Some(Callback::EcForecast),
            "co2_tracker" => Some(Callback::Co2Tracker),
            "co2_calculate" => Some(Callback::Co2Calculate),
            "co2_view_total" => Some(Callback::Co2ViewTotal),
            "co2_reset" => Some(Callback::Co2Reset),
            "image_scan" => Some(Callback::ImageScan),
            "scan_compost" => Some(Callback::ScanCompost),
            "scan_plant" => Some(Callback::ScanPlant),
            "start_chat" => Some(Callback::StartChat),
            "help_commands" => Some(Callback::HelpCommands),
            "change_volume" => Some(Callback::ChangeVolumes),
            "back_to_menu" => Some(Callback::BackToMenu),
            _ => data
                .strip_prefix("crop_")
                .and_then(|name| CropType::parse(name).ok())
                .map(Callback::Crop),
        }
    }

    pub fn payload(&self) -> String {
        match self {
            Callback::Register => "register".to_string(),
            Callback::Login => "login".to_string(),
            Callback::CompostFeed => "compost_feed".to_string(),
            Callback::UseCalculator => "use_calculator".to_string(),
            Callback::UseMlCalculator => "use_ml_calculator".to_string(),
            Callback::Crop(crop) => format!(
                "crop_{}",
                crop.label().to_lowercase().replace(' ', "")
            ),
            Callback::CompostExtract => "compost_extract".to_string(),
            Callback::FeedingLog => "feeding_log".to_string(),
            Callback::MoistureCheck => "moisture_check".to_string(),
            Callback::EcForecast => "ec_forecast".to_string(),
            Callback::Co2Tracker => "co2_tracker".to_string(),
            Callback::Co2Calculate => "co2_calculate".to_string(),
            Callback::Co2ViewTotal => "co2_view_total".to_string(),
            Callback::Co2Reset => "co2_reset".to_string(),
            Callback::ImageScan => "image_scan".to_string(),
            Callback::ScanCompost => "scan_compost".to_string(),
            Callback::ScanPlant => "scan_plant".to_string(),
            Callback::StartChat => "start_chat".to_string(),
            Callback::HelpCommands => "help_commands".to_string(),
            Callback::ChangeVolumes => "change_volume".to_string(),
            Callback::BackToMenu => "back_to_menu".to_string(),
        }
    }
}

/// One inbound event for a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Command(Command),
    Callback(Callback),
    Text(String),
    /// A keyword intent resolved from transcribed speech
    VoiceIntent(Intent),
    Photo(Vec<u8>),
}

/// An inline-keyboard button the transport should render.
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, callback: Callback) -> Self {
        Self {
            label: label.into(),
            data: callback.payload(),
        }
    }
}

/// Button rows for one message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Keyboard(pub Vec<Vec<Button>>);

/// One outbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// Handler outcome: what to send, and the state the session moves to.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub replies: Vec<Reply>,
    pub next: ChatState,
}

impl Transition {
    pub fn stay(state: ChatState, reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            next: state,
        }
    }

    pub fn to(next: ChatState, reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            next,
        }
    }
}

/// The dispatcher. Holds the injected store, estimator set and AI
/// collaborators; constructed once at startup.
pub struct Machine {
    pub(crate) store: Arc<dyn ProfileStore>,
    pub(crate) estimators: Estimators,
    pub(crate) chat: Arc<dyn ChatCompletion>,
    pub(crate) vision: Arc<dyn VisionAnalysis>,
}

impl Machine {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        estimators: Estimators,
        chat: Arc<dyn ChatCompletion>,
        vision: Arc<dyn VisionAnalysis>,
    ) -> Self {
        Self {
            store,
            estimators,
            chat,
            vision,
        }
    }

    /// Process one event to completion. Always leaves the session in a
    /// declared state; expected failures become re-prompts, never crashes.
    pub async fn dispatch(&self, session: &mut ConversationSession, event: Event) -> Vec<Reply> {
        debug!(user_id = session.user_id, state = ?session.state, event = ?event, "Dispatching event");
        let current = session.state;
        let transition = match self.route(session, event).await {
            Ok(transition) => transition,
            Err(e) => self.recover(current, e),
        };
        session.state = transition.next;
        transition.replies
    }

    async fn route(
        &self,
        session: &mut ConversationSession,
        event: Event,
    ) -> Result<Transition, BotError> {
        // Global cancel works from every state and clears everything.
        if event == Event::Command(Command::Cancel) {
            if session.state == ChatState::AskAnythingChat {
                self.chat.clear_history(session.user_id).await;
            }
            session.cancel();
            return Ok(Transition::to(
                ChatState::Unauthenticated,
                Reply::text("Operation cancelled. Type /start to begin again."),
            ));
        }

        // Ask-Anything mode contains everything except the exit phrase.
        if session.state == ChatState::AskAnythingChat {
            return menu::handle_chat_mode(self, session, event).await;
        }

        match event {
            Event::Command(command) => self.route_command(session, command).await,
            Event::VoiceIntent(intent) => self.route_intent(session, intent).await,
            Event::Callback(callback) => self.route_callback(session, callback).await,
            Event::Text(text) => self.route_text(session, &text).await,
            Event::Photo(image) => menu::handle_photo(self, session, &image).await,
        }
    }

    async fn route_command(
        &self,
        session: &mut ConversationSession,
        command: Command,
    ) -> Result<Transition, BotError> {
        match command {
            Command::Start => auth::on_start(self, session).await,
            Command::Help => Ok(menu::help_transition(session.state)),
            Command::Cancel => unreachable!("cancel handled in route"),
            _ if !session.is_authenticated() => Ok(Transition::stay(
                session.state,
                Reply::text("Please /start to login first."),
            )),
            Command::Status => menu::status_transition(self, session).await,
            Command::Input => Ok(menu::compost_feed_transition()),
            Command::Scan => Ok(menu::scan_type_transition(session)),
            Command::Care => menu::care_transition(self, session).await,
            Command::Co2 => menu::co2_tracker_transition(self, session).await,
            Command::Profile => menu::profile_transition(self, session).await,
            Command::Menu => Ok(menu::main_menu_transition(session, false)),
        }
    }

    async fn route_intent(
        &self,
        session: &mut ConversationSession,
        intent: Intent,
    ) -> Result<Transition, BotError> {
        let command = match intent {
            Intent::Help => Command::Help,
            Intent::Status => Command::Status,
            Intent::Input => Command::Input,
            Intent::Scan => Command::Scan,
            Intent::Care => Command::Care,
            Intent::Co2 => Command::Co2,
            Intent::Back => Command::Menu,
            Intent::Profile => Command::Profile,
        };
        self.route_command(session, command).await
    }

    async fn route_callback(
        &self,
        session: &mut ConversationSession,
        callback: Callback,
    ) -> Result<Transition, BotError> {
        match session.state {
            ChatState::AwaitingAuthChoice => auth::on_auth_choice(session, callback),
            ChatState::AwaitingCropSelection => {
                inputs::on_crop_selected(self, session, callback).await
            }
            ChatState::AwaitingScanTypeSelection => menu::on_scan_type(session, callback),
            ChatState::MainMenu => menu::on_menu_choice(self, session, callback).await,
            state => {
                warn!(user_id = session.user_id, state = ?state, callback = ?callback, "Callback in unexpected state");
                Err(BotError::InvalidStateTransition(format!(
                    "callback {callback:?} not valid here"
                )))
            }
        }
    }

    async fn route_text(
        &self,
        session: &mut ConversationSession,
        text: &str,
    ) -> Result<Transition, BotError> {
        match session.state {
            ChatState::Unauthenticated => Ok(Transition::stay(
                session.state,
                Reply::text("Hi! Type /start to register or log in."),
            )),
            ChatState::RegisteringUsername => auth::on_register_username(self, session, text).await,
            ChatState::RegisteringPassword => auth::on_register_password(self, session, text).await,
            ChatState::LoggingInUsername => Ok(auth::on_login_username(session, text)),
            ChatState::LoggingInPassword => auth::on_login_password(self, session, text).await,
            ChatState::SettingTankVolume => auth::on_tank_volume(self, session, text).await,
            ChatState::SettingSoilVolume => auth::on_soil_volume(self, session, text).await,
            ChatState::AwaitingGreensInput => inputs::on_greens_input(self, session, text),
            ChatState::AwaitingMlGreensInput => {
                inputs::on_ml_greens_input(self, session, text).await
            }
            ChatState::AwaitingCompostMixInput => inputs::on_mix_input(self, session, text),
            ChatState::AwaitingFeedingLogInput => {
                inputs::on_feeding_log_input(self, session, text).await
            }
            ChatState::AwaitingMoistureInput => {
                inputs::on_moisture_input(self, session, text).await
            }
            ChatState::AwaitingEcInput => inputs::on_ec_input(self, session, text).await,
            ChatState::AwaitingCo2FoodWasteInput => {
                inputs::on_co2_food_waste_input(self, session, text).await
            }
            ChatState::AwaitingAuthChoice => Ok(Transition::stay(
                session.state,
                Reply::text("Please use the Register or Login buttons above."),
            )),
            ChatState::AwaitingCropSelection | ChatState::AwaitingScanTypeSelection => {
                Ok(Transition::stay(
                    session.state,
                    Reply::text("Please pick one of the options above."),
                ))
            }
            ChatState::MainMenu => Err(BotError::InvalidStateTransition(
                "free text in main menu".to_string(),
            )),
            ChatState::AskAnythingChat => unreachable!("chat mode handled in route"),
        }
    }

    /// Map an expected failure to a user-visible recovery, staying in a safe
    /// state. No raw error text reaches the user.
    fn recover(&self, current: ChatState, error: BotError) -> Transition {
        warn!(state = ?current, error = %error, "Recovering from handler error");
        match error {
            BotError::Validation(e) => Transition::stay(
                current,
                Reply::text(format!("That input doesn't look right ({e}). Please try again.")),
            ),
            BotError::MissingProfileData(_) => Transition::to(
                ChatState::MainMenu,
                Reply::text(
                    "Volume setup required. Please set your tank and soil volumes via /profile first.",
                ),
            ),
            BotError::InvalidCropType(name) => Transition::stay(
                current,
                Reply::text(format!(
                    "\"{name}\" is not a crop I know. Please pick one of the listed crops."
                )),
            ),
            BotError::CollaboratorUnavailable(_) => Transition::stay(
                current,
                Reply::text(
                    "Sorry, I'm having trouble reaching that service right now. Please try again in a moment.",
                ),
            ),
            BotError::InvalidStateTransition(_) => Transition::stay(
                current,
                Reply::text(
                    "I wasn't expecting that here. Use the menu buttons, or /help for the command list.",
                ),
            ),
            BotError::ModelUnavailable(_) => Transition::to(
                ChatState::MainMenu,
                Reply::text(
                    "The EC forecast model is not available right now, so I can't produce a forecast.",
                ),
            ),
            BotError::Store(_) => Transition::stay(
                current,
                Reply::text("Something went wrong saving your data. Please try again."),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/start@compostbot"), Some(Command::Start));
        assert_eq!(Command::parse("/back"), Some(Command::Menu));
        assert_eq!(Command::parse("hello"), None);
    }

    #[test]
    fn test_callback_round_trip() {
        let callbacks = [
            Callback::Register,
            Callback::CompostFeed,
            Callback::Crop(CropType::Herbs),
            Callback::Crop(CropType::LeafyGreens),
            Callback::ScanPlant,
            Callback::BackToMenu,
        ];
        for callback in callbacks {
            assert_eq!(Callback::parse(&callback.payload()), Some(callback));
        }
        assert_eq!(Callback::parse("nonsense"), None);
    }
}
