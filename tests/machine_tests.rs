use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use compostbot::collaborators::{ChatCompletion, Concept, VisionAnalysis};
use compostbot::errors::BotError;
use compostbot::estimators::ec::{EcForecaster, EcModelArtifact};
use compostbot::estimators::feed_model::{CropType, FeedRecommender};
use compostbot::estimators::emissions::EmissionsCalculator;
use compostbot::estimators::moisture::MoistureForecaster;
use compostbot::estimators::recipe::RecipeCalculator;
use compostbot::estimators::Estimators;
use compostbot::machine::{Callback, Command, Event, Machine};
use compostbot::session::{ChatState, ConversationSession, ScanType};
use compostbot::store::{hash_password, MemoryStore, ProfileStore, UserProfile};

/// Chat stub that records how often it is called.
#[derive(Default)]
struct StubChat {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatCompletion for StubChat {
    async fn complete(&self, _user_id: i64, prompt: &str) -> Result<String, BotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("echo: {prompt}"))
    }

    async fn clear_history(&self, _user_id: i64) {}
}

/// Chat stub that always fails.
struct FailingChat;

#[async_trait]
impl ChatCompletion for FailingChat {
    async fn complete(&self, _user_id: i64, _prompt: &str) -> Result<String, BotError> {
        Err(BotError::CollaboratorUnavailable("stub outage".to_string()))
    }

    async fn clear_history(&self, _user_id: i64) {}
}

#[derive(Default)]
struct StubVision {
    calls: AtomicUsize,
}

#[async_trait]
impl VisionAnalysis for StubVision {
    async fn classify_image(
        &self,
        _image: &[u8],
        _category: ScanType,
    ) -> Result<Vec<Concept>, BotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Concept {
            name: "compost".to_string(),
            confidence: 0.93,
        }])
    }
}

fn estimators(ec_available: bool) -> Estimators {
    let ec = if ec_available {
        EcForecaster::new(EcModelArtifact {
            decay_rate: 0.99,
            decay_scale: 0.1,
            seasonal_amplitude: 0.05,
            seasonal_frequency: 0.05,
            moisture_coeff: 0.001,
            ec_floor: 0.1,
            ec_ceiling: 8.0,
        })
    } else {
        EcForecaster::unavailable()
    };
    Estimators {
        recipe: Arc::new(RecipeCalculator::default()),
        feed: Arc::new(FeedRecommender::new()),
        moisture: Arc::new(MoistureForecaster::new(None)),
        ec: Arc::new(ec),
        emissions: Arc::new(EmissionsCalculator::new()),
    }
}

struct Harness {
    machine: Machine,
    store: Arc<MemoryStore>,
    chat: Arc<StubChat>,
    vision: Arc<StubVision>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let chat = Arc::new(StubChat::default());
    let vision = Arc::new(StubVision::default());
    let machine = Machine::new(
        store.clone(),
        estimators(true),
        chat.clone(),
        vision.clone(),
    );
    Harness {
        machine,
        store,
        chat,
        vision,
    }
}

fn profile(user_id: i64) -> UserProfile {
    UserProfile {
        user_id,
        username: "sprout".to_string(),
        password_hash: hash_password("hunter2"),
        tank_volume_l: Some(120.0),
        soil_volume_l: Some(10.0),
        total_food_waste_kg: 0.0,
        selected_crop: None,
    }
}

/// An authenticated session sitting in the main menu.
async fn logged_in_session(store: &MemoryStore, user_id: i64) -> ConversationSession {
    let p = profile(user_id);
    store.create_profile(&p).await.unwrap();
    let mut session = ConversationSession::new(user_id);
    session.profile = Some(p);
    session.state = ChatState::MainMenu;
    session
}

#[tokio::test]
async fn test_registration_and_setup_chain() {
    let h = harness();
    let mut session = ConversationSession::new(1);

    h.machine
        .dispatch(&mut session, Event::Command(Command::Start))
        .await;
    assert_eq!(session.state, ChatState::AwaitingAuthChoice);

    h.machine
        .dispatch(&mut session, Event::Callback(Callback::Register))
        .await;
    assert_eq!(session.state, ChatState::RegisteringUsername);

    h.machine
        .dispatch(&mut session, Event::Text("sprout".to_string()))
        .await;
    assert_eq!(session.state, ChatState::RegisteringPassword);

    h.machine
        .dispatch(&mut session, Event::Text("hunter2".to_string()))
        .await;
    assert_eq!(session.state, ChatState::SettingTankVolume);

    h.machine
        .dispatch(&mut session, Event::Text("120".to_string()))
        .await;
    assert_eq!(session.state, ChatState::SettingSoilVolume);

    h.machine
        .dispatch(&mut session, Event::Text("40".to_string()))
        .await;
    assert_eq!(session.state, ChatState::MainMenu);

    let stored = h.store.get_profile(1).await.unwrap().unwrap();
    assert!(stored.is_complete());
    assert_eq!(stored.username, "sprout");
    assert_eq!(stored.password_hash, hash_password("hunter2"));
}

#[tokio::test]
async fn test_login_with_complete_profile_skips_setup() {
    let h = harness();
    h.store.create_profile(&profile(99)).await.unwrap();

    let mut session = ConversationSession::new(2);
    session.state = ChatState::AwaitingAuthChoice;

    h.machine
        .dispatch(&mut session, Event::Callback(Callback::Login))
        .await;
    assert_eq!(session.state, ChatState::LoggingInUsername);

    h.machine
        .dispatch(&mut session, Event::Text("sprout".to_string()))
        .await;
    assert_eq!(session.state, ChatState::LoggingInPassword);

    h.machine
        .dispatch(&mut session, Event::Text("hunter2".to_string()))
        .await;
    assert_eq!(session.state, ChatState::MainMenu);
}

#[tokio::test]
async fn test_login_with_wrong_password_reprompts() {
    let h = harness();
    h.store.create_profile(&profile(99)).await.unwrap();

    let mut session = ConversationSession::new(2);
    session.state = ChatState::LoggingInUsername;
    h.machine
        .dispatch(&mut session, Event::Text("sprout".to_string()))
        .await;
    h.machine
        .dispatch(&mut session, Event::Text("wrong".to_string()))
        .await;
    assert_eq!(session.state, ChatState::LoggingInUsername);
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_ask_anything_contains_everything_but_the_exit_phrase() {
    let h = harness();
    let mut session = logged_in_session(&h.store, 3).await;
    session.state = ChatState::AskAnythingChat;

    let utterances = [
        "what is compost status",
        "help",
        "scan my plant please",
        "random words entirely",
    ];
    for utterance in utterances {
        h.machine
            .dispatch(&mut session, Event::Text(utterance.to_string()))
            .await;
        assert_eq!(
            session.state,
            ChatState::AskAnythingChat,
            "{utterance:?} must not leave chat mode"
        );
    }
    assert_eq!(h.chat.calls.load(Ordering::SeqCst), utterances.len());

    // Non-exit commands are blocked too
    h.machine
        .dispatch(&mut session, Event::Command(Command::Status))
        .await;
    assert_eq!(session.state, ChatState::AskAnythingChat);

    // Only the exit phrase leaves
    h.machine
        .dispatch(&mut session, Event::Text("back".to_string()))
        .await;
    assert_eq!(session.state, ChatState::MainMenu);
}

#[tokio::test]
async fn test_chat_collaborator_failure_is_contained() {
    let store = Arc::new(MemoryStore::new());
    let machine = Machine::new(
        store.clone(),
        estimators(true),
        Arc::new(FailingChat),
        Arc::new(StubVision::default()),
    );
    let mut session = logged_in_session(&store, 4).await;
    session.state = ChatState::AskAnythingChat;

    let replies = machine
        .dispatch(&mut session, Event::Text("hello there".to_string()))
        .await;
    assert_eq!(session.state, ChatState::AskAnythingChat);
    assert!(replies[0].text.contains("trouble"));
}

#[tokio::test]
async fn test_invalid_input_reprompts_idempotently() {
    let h = harness();
    let mut session = logged_in_session(&h.store, 5).await;
    session.state = ChatState::AwaitingFeedingLogInput;

    let before_total = h.store.total_food_waste(5).await.unwrap();
    for _ in 0..2 {
        let replies = h
            .machine
            .dispatch(&mut session, Event::Text("300;600".to_string()))
            .await;
        assert_eq!(session.state, ChatState::AwaitingFeedingLogInput);
        assert!(replies[0].text.contains("Invalid input"));
    }
    assert_eq!(h.store.feeding_log_count(), 0);
    assert_eq!(h.store.total_food_waste(5).await.unwrap(), before_total);
}

#[tokio::test]
async fn test_mix_analysis_flow_returns_to_menu() {
    let h = harness();
    let mut session = logged_in_session(&h.store, 6).await;
    session.state = ChatState::AwaitingCompostMixInput;

    let replies = h
        .machine
        .dispatch(&mut session, Event::Text("1.5;0.8;0.4".to_string()))
        .await;
    assert_eq!(session.state, ChatState::MainMenu);
    assert!(replies[0].text.contains("2.70"));
    assert!(replies[0].text.contains("0.75"));
    assert!(replies[0].text.contains("9.0"));
}

#[tokio::test]
async fn test_ml_flow_water_from_soil_volume() {
    let h = harness();
    let mut session = logged_in_session(&h.store, 7).await;
    session.state = ChatState::AwaitingCropSelection;

    h.machine
        .dispatch(
            &mut session,
            Event::Callback(Callback::Crop(CropType::Herbs)),
        )
        .await;
    assert_eq!(session.state, ChatState::AwaitingMlGreensInput);

    let replies = h
        .machine
        .dispatch(&mut session, Event::Text("30".to_string()))
        .await;
    assert_eq!(session.state, ChatState::MainMenu);
    assert!(replies[0].text.contains("60 g"));
    assert!(replies[0].text.contains("5000 ml"));
}

#[tokio::test]
async fn test_ml_flow_without_soil_volume_redirects_to_setup() {
    let h = harness();
    let incomplete = UserProfile {
        soil_volume_l: None,
        tank_volume_l: None,
        ..profile(8)
    };
    h.store.create_profile(&incomplete).await.unwrap();
    let mut session = ConversationSession::new(8);
    session.profile = Some(incomplete);
    session.state = ChatState::AwaitingCropSelection;

    h.machine
        .dispatch(
            &mut session,
            Event::Callback(Callback::Crop(CropType::Herbs)),
        )
        .await;
    let replies = h
        .machine
        .dispatch(&mut session, Event::Text("30".to_string()))
        .await;
    assert_eq!(session.state, ChatState::MainMenu);
    assert!(replies[0].text.contains("Volume setup required"));
}

#[tokio::test]
async fn test_ec_flow_refused_when_model_missing() {
    let store = Arc::new(MemoryStore::new());
    let machine = Machine::new(
        store.clone(),
        estimators(false),
        Arc::new(StubChat::default()),
        Arc::new(StubVision::default()),
    );
    let mut session = logged_in_session(&store, 9).await;

    let replies = machine
        .dispatch(&mut session, Event::Callback(Callback::EcForecast))
        .await;
    assert_eq!(session.state, ChatState::MainMenu);
    assert!(replies[0].text.contains("not available"));
}

#[tokio::test]
async fn test_free_text_in_main_menu_is_rejected_gently() {
    let h = harness();
    let mut session = logged_in_session(&h.store, 10).await;

    let replies = h
        .machine
        .dispatch(&mut session, Event::Text("42".to_string()))
        .await;
    assert_eq!(session.state, ChatState::MainMenu);
    assert!(replies[0].text.contains("menu"));
    assert_eq!(h.store.feeding_log_count(), 0);
}

#[tokio::test]
async fn test_cancel_resets_from_any_state() {
    let h = harness();
    for state in [
        ChatState::AwaitingGreensInput,
        ChatState::AskAnythingChat,
        ChatState::LoggingInPassword,
        ChatState::AwaitingScanTypeSelection,
    ] {
        let mut session = ConversationSession::new(11);
        session.state = state;
        session.flags.awaiting_image = true;

        h.machine
            .dispatch(&mut session, Event::Command(Command::Cancel))
            .await;
        assert_eq!(session.state, ChatState::Unauthenticated);
        assert!(!session.flags.awaiting_image);
    }
}

#[tokio::test]
async fn test_photo_requires_scan_selection_first() {
    let h = harness();
    let mut session = logged_in_session(&h.store, 12).await;

    let replies = h
        .machine
        .dispatch(&mut session, Event::Photo(vec![0xFF, 0xD8]))
        .await;
    assert!(replies[0].text.contains("Image Scan option"));
    assert_eq!(h.vision.calls.load(Ordering::SeqCst), 0);

    // Pick a scan type, then the photo goes to the vision collaborator
    h.machine
        .dispatch(&mut session, Event::Callback(Callback::ImageScan))
        .await;
    assert_eq!(session.state, ChatState::AwaitingScanTypeSelection);

    h.machine
        .dispatch(&mut session, Event::Callback(Callback::ScanPlant))
        .await;
    assert_eq!(session.state, ChatState::MainMenu);
    assert!(session.flags.awaiting_image);

    let replies = h
        .machine
        .dispatch(&mut session, Event::Photo(vec![0xFF, 0xD8]))
        .await;
    assert_eq!(h.vision.calls.load(Ordering::SeqCst), 1);
    assert!(replies[0].text.contains("Image Analysis Results"));
    assert!(!session.flags.awaiting_image);
}

#[tokio::test]
async fn test_feeding_log_accumulates_food_waste() {
    let h = harness();
    let mut session = logged_in_session(&h.store, 13).await;
    session.state = ChatState::AwaitingFeedingLogInput;

    h.machine
        .dispatch(&mut session, Event::Text("300;600;250".to_string()))
        .await;
    assert_eq!(session.state, ChatState::MainMenu);
    assert_eq!(h.store.feeding_log_count(), 1);
    assert!((h.store.total_food_waste(13).await.unwrap() - 0.3).abs() < 1e-9);
}

#[tokio::test]
async fn test_moisture_flow_logs_and_forecasts() {
    let h = harness();
    let mut session = logged_in_session(&h.store, 14).await;
    session.state = ChatState::AwaitingMoistureInput;

    let replies = h
        .machine
        .dispatch(&mut session, Event::Text("45%".to_string()))
        .await;
    assert_eq!(session.state, ChatState::MainMenu);
    assert_eq!(h.store.moisture_log_count(), 1);
    assert!(replies[0].text.contains("Moisture Forecast"));
}
