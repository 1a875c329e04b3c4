//! Main-menu branching, scan and CO₂ flows, and Ask-Anything containment.

use tracing::{error, info};

use crate::errors::BotError;
use crate::intent;
use crate::session::{ChatState, ConversationSession, ScanType};

use super::{Button, Callback, Command, Event, Keyboard, Machine, Reply, Transition};

const HELP_MESSAGE: &str = "Here's what I can do for you:\n\n\
/status — Check compost readiness\n\
/input  — Get food & water guidance\n\
/scan   — Upload compost or plant image for analysis\n\
/care   — Get compost or plant care advice\n\
/co2    — View your CO₂ emissions impact\n\
/profile — Update your compost setup\n\
/help   — Show this commands list\n\n\
Type a command or tap a button to get started!";

fn back_to_menu_row() -> Vec<Button> {
    vec![Button::new("🔙 Back to Menu", Callback::BackToMenu)]
}

/// The main menu, clearing transient flags on the way in.
pub(super) fn main_menu_transition(session: &mut ConversationSession, setup_done: bool) -> Transition {
    session.return_to_menu();
    let username = session
        .profile
        .as_ref()
        .map(|p| p.username.clone())
        .unwrap_or_else(|| "there".to_string());

    let text = if setup_done {
        format!("Setup complete, {username}! Your compost setup is saved.\n\nWhat would you like to do?")
    } else {
        format!("Welcome, {username}! Let's care for your compost.\n\nChoose an option:")
    };

    let keyboard = Keyboard(vec![
        vec![
            Button::new("📦 Compost Feeding", Callback::CompostFeed),
            Button::new("💩 Compost Extraction", Callback::CompostExtract),
        ],
        vec![
            Button::new("🥕 Feeding Log", Callback::FeedingLog),
            Button::new("💧 Moisture Forecast", Callback::MoistureCheck),
        ],
        vec![
            Button::new("🧪 EC Forecast", Callback::EcForecast),
            Button::new("📈 CO₂ Tracker", Callback::Co2Tracker),
        ],
        vec![
            Button::new("📸 Image Scan", Callback::ImageScan),
            Button::new("🪴 Ask Anything", Callback::StartChat),
        ],
        vec![Button::new("❓ Help", Callback::HelpCommands)],
    ]);

    Transition::to(ChatState::MainMenu, Reply::with_keyboard(text, keyboard))
}

pub(super) fn help_transition(current: ChatState) -> Transition {
    Transition::stay(current, Reply::text(HELP_MESSAGE))
}

/// Compost readiness summary from the cumulative food-waste total.
pub(super) async fn status_transition(
    machine: &Machine,
    session: &mut ConversationSession,
) -> Result<Transition, BotError> {
    let total_kg = machine.store.total_food_waste(session.user_id).await?;
    let text = if total_kg > 0.0 {
        let time = machine.estimators.recipe.estimate_time_range(total_kg);
        format!(
            "🧪 Compost Status Check\n\n\
             You've composted {total_kg:.1} kg of food waste so far.\n\
             Estimated time to full maturity: {:.0}–{:.0} days ({:.0} days typical).\n\n\
             Keep feeding and turning weekly for best results.",
            time.lower_days, time.upper_days, time.estimate_days
        )
    } else {
        "🧪 Compost Status Check\n\n\
         No feedings logged yet — add your first batch via the Feeding Log \
         and I'll start estimating maturity."
            .to_string()
    };
    Ok(Transition::stay(session.state, Reply::text(text)))
}

/// Crop-specific care advice for the profile's selected crop.
pub(super) async fn care_transition(
    machine: &Machine,
    session: &mut ConversationSession,
) -> Result<Transition, BotError> {
    let profile = match &session.profile {
        Some(profile) => profile.clone(),
        None => {
            let fetched = machine.store.get_profile(session.user_id).await?;
            session.profile = fetched.clone();
            fetched.ok_or(BotError::MissingProfileData("profile"))?
        }
    };

    let tips = match profile.selected_crop {
        Some(crop) => {
            let (cn_min, cn_max) = crop.cn_range();
            format!(
                "🪴 {} Care Guide\n\n\
                 • Target compost C:N ratio: {cn_min:.1}–{cn_max:.1}\n\
                 • Mix {}x browns per greens when feeding\n\
                 • Apply compost when nutrients deplete",
                crop.label(),
                crop.browns_multiplier()
            )
        }
        None => "🪴 Care Guide\n\n\
                 Keep soil moist, give sunlight, and apply compost when \
                 nutrients deplete. Pick a crop in the ML feeding calculator \
                 for crop-specific advice."
            .to_string(),
    };
    Ok(Transition::stay(session.state, Reply::text(tips)))
}

/// Feeding submenu: ML recommendation vs. basic calculator.
pub(super) fn compost_feed_transition() -> Transition {
    let keyboard = Keyboard(vec![
        vec![Button::new("🧠 ML Smart Recommendations", Callback::UseMlCalculator)],
        vec![Button::new("🧮 Basic Calculator", Callback::UseCalculator)],
        back_to_menu_row(),
    ]);
    Transition::to(
        ChatState::MainMenu,
        Reply::with_keyboard(
            "🥕 Food & Water Input Guide\n\n\
             Choose your recommendation method:\n\n\
             🧠 ML Smart: crop-specific recommendations based on historical data\n\
             🧮 Basic: simple ratio-based calculations",
            keyboard,
        ),
    )
}

/// Scan-type selection page.
pub(super) fn scan_type_transition(session: &mut ConversationSession) -> Transition {
    session.flags.scan_type = None;
    session.flags.awaiting_image = false;
    let keyboard = Keyboard(vec![
        vec![Button::new("🪣 Analyze Compost Tank", Callback::ScanCompost)],
        vec![Button::new("🌱 Analyze Plant", Callback::ScanPlant)],
        back_to_menu_row(),
    ]);
    Transition::to(
        ChatState::AwaitingScanTypeSelection,
        Reply::with_keyboard(
            "📸 Image Analysis\n\n\
             What would you like to analyze?\n\n\
             🪣 Compost Tank: composition and quality\n\
             🌱 Plant: health and visible issues",
            keyboard,
        ),
    )
}

pub(super) fn on_scan_type(
    session: &mut ConversationSession,
    callback: Callback,
) -> Result<Transition, BotError> {
    let scan_type = match callback {
        Callback::ScanCompost => ScanType::CompostTank,
        Callback::ScanPlant => ScanType::Plant,
        Callback::BackToMenu => return Ok(main_menu_transition(session, false)),
        other => {
            return Err(BotError::InvalidStateTransition(format!(
                "callback {other:?} during scan selection"
            )))
        }
    };
    session.flags.scan_type = Some(scan_type);
    session.flags.awaiting_image = true;
    Ok(Transition::to(
        ChatState::MainMenu,
        Reply::text(format!(
            "Send me a photo of your {} — good lighting and focus help!",
            scan_type.label()
        )),
    ))
}

/// Photo events: only analysed when a scan was requested first.
pub(super) async fn handle_photo(
    machine: &Machine,
    session: &mut ConversationSession,
    image: &[u8],
) -> Result<Transition, BotError> {
    if !session.is_authenticated() {
        return Ok(Transition::stay(
            session.state,
            Reply::text("Please /start to login first."),
        ));
    }
    if !session.flags.awaiting_image {
        return Ok(Transition::stay(
            session.state,
            Reply::text("Use the Image Scan option from the menu first."),
        ));
    }

    let scan_type = session.flags.scan_type.unwrap_or(ScanType::CompostTank);
    session.flags.awaiting_image = false;

    let text = match machine.vision.classify_image(image, scan_type).await {
        Ok(concepts) => {
            let mut text = format!(
                "🔍 Image Analysis Results ({})\n\nTop elements:\n",
                scan_type.label()
            );
            for (i, concept) in concepts.iter().take(5).enumerate() {
                text.push_str(&format!(
                    "{}. {}: {:.1}%\n",
                    i + 1,
                    concept.name,
                    concept.confidence * 100.0
                ));
            }
            text.push_str("\n💡 Ask me questions about what you see!");
            text
        }
        Err(e) => {
            error!(user_id = session.user_id, error = %e, "Vision analysis failed");
            "⚠️ Could not analyse the image. Try a clearer photo.".to_string()
        }
    };

    Ok(Transition {
        replies: vec![Reply::with_keyboard(text, Keyboard(vec![back_to_menu_row()]))],
        next: ChatState::MainMenu,
    })
}

/// CO₂ tracker page with current savings.
pub(super) async fn co2_tracker_transition(
    machine: &Machine,
    session: &mut ConversationSession,
) -> Result<Transition, BotError> {
    let profile = match &session.profile {
        Some(profile) => profile.clone(),
        None => machine
            .store
            .get_profile(session.user_id)
            .await?
            .ok_or(BotError::MissingProfileData("profile"))?,
    };
    let (tank, soil) = match (profile.tank_volume_l, profile.soil_volume_l) {
        (Some(tank), Some(soil)) => (tank, soil),
        _ => return Err(BotError::MissingProfileData("tank_volume")),
    };

    let total = machine.store.total_food_waste(session.user_id).await?;
    let text = if total > 0.0 {
        let savings = machine
            .estimators
            .emissions
            .co2_saved_from_food_waste(total, tank, soil);
        let impact = machine.estimators.emissions.impact_summary(savings.total_saved_kg);
        format!(
            "🌍 CO₂ Savings Calculator\n\n\
             📈 Your Impact So Far:\n\
             • Food waste composted: {total:.1} kg\n\
             • CO₂ saved: {:.1} kg\n\
             • Equivalent to planting {:.1} trees 🌳\n\
             • Or saving {:.1} litres of petrol ⛽\n\n\
             What would you like to do?",
            savings.total_saved_kg, impact.trees_equivalent, impact.petrol_litres_equivalent
        )
    } else {
        "🌍 CO₂ Savings Calculator\n\n\
         Start tracking your environmental impact!\n\
         Calculate how much CO₂ you save by composting food waste.\n\n\
         What would you like to do?"
            .to_string()
    };

    let keyboard = Keyboard(vec![
        vec![Button::new("🧮 Calculate New Savings", Callback::Co2Calculate)],
        vec![Button::new("📊 View Total Impact", Callback::Co2ViewTotal)],
        vec![Button::new("🔄 Reset Counter", Callback::Co2Reset)],
        back_to_menu_row(),
    ]);
    Ok(Transition::to(
        ChatState::MainMenu,
        Reply::with_keyboard(text, keyboard),
    ))
}

/// Profile summary with update options.
pub(super) async fn profile_transition(
    machine: &Machine,
    session: &mut ConversationSession,
) -> Result<Transition, BotError> {
    let profile = match &session.profile {
        Some(profile) => profile.clone(),
        None => {
            let fetched = machine.store.get_profile(session.user_id).await?;
            session.profile = fetched.clone();
            fetched.ok_or(BotError::MissingProfileData("profile"))?
        }
    };

    let tank = profile
        .tank_volume_l
        .map(|v| format!("{v:.0} L"))
        .unwrap_or_else(|| "not set".to_string());
    let soil = profile
        .soil_volume_l
        .map(|v| format!("{v:.0} L"))
        .unwrap_or_else(|| "not set".to_string());
    let crop = profile
        .selected_crop
        .map(|c| c.label().to_string())
        .unwrap_or_else(|| "not selected".to_string());

    let text = format!(
        "👤 Your Profile\n\n\
         🙋 Username: {}\n\
         🪣 Tank volume: {tank}\n\
         🪴 Soil volume: {soil}\n\
         🌾 Crop: {crop}\n\
         ♻️ Food waste composted: {:.1} kg\n\n\
         What would you like to update?",
        profile.username, profile.total_food_waste_kg
    );
    let keyboard = Keyboard(vec![
        vec![Button::new("Change Volumes", Callback::ChangeVolumes)],
        back_to_menu_row(),
    ]);
    Ok(Transition::to(
        ChatState::MainMenu,
        Reply::with_keyboard(text, keyboard),
    ))
}

/// Main-menu callback branching.
pub(super) async fn on_menu_choice(
    machine: &Machine,
    session: &mut ConversationSession,
    callback: Callback,
) -> Result<Transition, BotError> {
    match callback {
        Callback::CompostFeed => Ok(compost_feed_transition()),
        Callback::UseCalculator => Ok(Transition::to(
            ChatState::AwaitingGreensInput,
            Reply::text(
                "🧮 Basic Calculator\n\n\
                 How many kilograms of greens (food scraps) are you adding?\n\
                 Enter a number, e.g. `1.5`.",
            ),
        )),
        Callback::UseMlCalculator => Ok(crop_selection_transition()),
        Callback::CompostExtract => Ok(Transition {
            replies: vec![Reply::with_keyboard(
                "🌱 Compost Estimate Calculator\n\n\
                 Please tell me the amount of greens (kg), browns (kg), and water (L) \
                 you intend to put.\n\n\
                 Enter three numbers separated by semicolons:\n\
                 `greens;browns;water`\n\n\
                 Example: `1.5;0.8;0.4`",
                Keyboard(vec![back_to_menu_row()]),
            )],
            next: ChatState::AwaitingCompostMixInput,
        }),
        Callback::FeedingLog => Ok(Transition::to(
            ChatState::AwaitingFeedingLogInput,
            Reply::text(
                "🥕 Feeding Log\n\n\
                 Log what you just fed: greens (g), browns (g) and water (g), \
                 separated by semicolons.\n\n\
                 Example: `300;600;250`",
            ),
        )),
        Callback::MoistureCheck => Ok(Transition::to(
            ChatState::AwaitingMoistureInput,
            Reply::text(
                "💧 Moisture Forecast\n\n\
                 What's the current soil moisture? Enter a percentage 0-100, \
                 e.g. `45` or `45%`.",
            ),
        )),
        Callback::EcForecast => {
            // Refuse the whole flow up front when the model never loaded.
            if !machine.estimators.ec.is_available() {
                return Err(BotError::ModelUnavailable(
                    "EC model not loaded".to_string(),
                ));
            }
            Ok(Transition::to(
                ChatState::AwaitingEcInput,
                Reply::text(
                    "🧪 EC Forecast\n\n\
                     Enter your current EC reading (mS/cm) and moisture (%), \
                     separated by a semicolon.\n\n\
                     Example: `2.4;55`",
                ),
            ))
        }
        Callback::Co2Tracker => co2_tracker_transition(machine, session).await,
        Callback::Co2Calculate => Ok(Transition::to(
            ChatState::AwaitingCo2FoodWasteInput,
            Reply::text(
                "🧮 How many kilograms of food waste did you compost? \
                 Enter a number, e.g. `2.5`.",
            ),
        )),
        Callback::Co2ViewTotal => co2_view_total(machine, session).await,
        Callback::Co2Reset => {
            machine.store.reset_food_waste(session.user_id).await?;
            session.invalidate_profile_cache();
            info!(user_id = session.user_id, "Food waste counter reset");
            Ok(Transition::to(
                ChatState::MainMenu,
                Reply::text("🔄 Counter reset. Your CO₂ tracking starts fresh."),
            ))
        }
        Callback::ImageScan => Ok(scan_type_transition(session)),
        Callback::ScanCompost | Callback::ScanPlant => on_scan_type(session, callback),
        Callback::StartChat => Ok(Transition::to(
            ChatState::AskAnythingChat,
            Reply::text(
                "I'm here to help you with your plants!\n\n\
                 You can now type or speak your question. \
                 Say \"back\" or \"menu\" to return.",
            ),
        )),
        Callback::HelpCommands => Ok(Transition {
            replies: vec![Reply::with_keyboard(
                HELP_MESSAGE,
                Keyboard(vec![back_to_menu_row()]),
            )],
            next: ChatState::MainMenu,
        }),
        Callback::ChangeVolumes => Ok(Transition::to(
            ChatState::SettingTankVolume,
            Reply::text("Enter your new compost tank volume (litres):"),
        )),
        Callback::BackToMenu => Ok(main_menu_transition(session, false)),
        other => Err(BotError::InvalidStateTransition(format!(
            "callback {other:?} in main menu"
        ))),
    }
}

pub(super) fn crop_selection_transition() -> Transition {
    use crate::estimators::feed_model::CropType;
    let mut rows: Vec<Vec<Button>> = CropType::ALL
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|crop| Button::new(crop.label(), Callback::Crop(*crop)))
                .collect()
        })
        .collect();
    rows.push(back_to_menu_row());
    Transition::to(
        ChatState::AwaitingCropSelection,
        Reply::with_keyboard(
            "🧠 ML Smart Recommendations\n\nWhich crop is this compost for?",
            Keyboard(rows),
        ),
    )
}

async fn co2_view_total(
    machine: &Machine,
    session: &mut ConversationSession,
) -> Result<Transition, BotError> {
    let total = machine.store.total_food_waste(session.user_id).await?;
    let text = if total > 0.0 {
        format!(
            "📊 Total food waste composted: {total:.1} kg. \
             Open the CO₂ Tracker for the full impact breakdown."
        )
    } else {
        "📊 Nothing logged yet — calculate your first savings to get started.".to_string()
    };
    Ok(Transition {
        replies: vec![Reply::with_keyboard(text, Keyboard(vec![back_to_menu_row()]))],
        next: ChatState::MainMenu,
    })
}

/// Ask-Anything containment: only the exit phrase leaves; everything else is
/// either forwarded to the chat model or blocked.
pub(super) async fn handle_chat_mode(
    machine: &Machine,
    session: &mut ConversationSession,
    event: Event,
) -> Result<Transition, BotError> {
    match event {
        Event::Command(Command::Menu) | Event::Callback(Callback::BackToMenu) => {
            machine.chat.clear_history(session.user_id).await;
            Ok(main_menu_transition(session, false))
        }
        Event::Text(text) => match intent::resolve(&text.to_lowercase(), true) {
            intent::Resolution::Exit => {
                machine.chat.clear_history(session.user_id).await;
                Ok(main_menu_transition(session, false))
            }
            // Forward the original text, not the lowercased matching copy
            intent::Resolution::ChatMessage(_) => {
                match machine.chat.complete(session.user_id, &text).await {
                    Ok(answer) => Ok(Transition::stay(
                        ChatState::AskAnythingChat,
                        Reply::text(answer),
                    )),
                    Err(e) => {
                        error!(user_id = session.user_id, error = %e, "Chat completion failed");
                        Ok(Transition::stay(
                            ChatState::AskAnythingChat,
                            Reply::text(
                                "Sorry, I'm having trouble processing your request. Please try again.",
                            ),
                        ))
                    }
                }
            }
            _ => Ok(Transition::stay(
                ChatState::AskAnythingChat,
                Reply::text("❌ You're in Ask-Anything mode right now. Say \"back\" or \"menu\" to exit."),
            )),
        },
        _ => Ok(Transition::stay(
            ChatState::AskAnythingChat,
            Reply::text(
                "❌ You're in Ask-Anything mode right now. Say \"back\" or \"menu\" to exit.",
            ),
        )),
    }
}
