//! Registration, login and profile-setup chain.

use tracing::info;

use crate::errors::BotError;
use crate::session::{ChatState, ConversationSession};
use crate::store::{hash_password, UserProfile};
use crate::validators::{parse_bounded_positive, MAX_VOLUME_L};

use super::{menu, Button, Callback, Keyboard, Machine, Reply, Transition};

const WELCOME_MESSAGE: &str = "👋 Hi there! I'm your composting and plant care assistant 🌱♻️\n\n\
You don't need to be a gardening expert — just ask me anything!";

/// `/start`: greet and offer register/login, or jump straight to the menu
/// for an already authenticated session.
pub(super) async fn on_start(
    machine: &Machine,
    session: &mut ConversationSession,
) -> Result<Transition, BotError> {
    if session.is_authenticated() {
        return Ok(menu::main_menu_transition(session, false));
    }

    // Refresh the profile cache in case this chat logged in earlier.
    if let Some(profile) = machine.store.get_profile(session.user_id).await? {
        if profile.is_complete() {
            session.profile = Some(profile);
            return Ok(menu::main_menu_transition(session, false));
        }
    }

    let keyboard = Keyboard(vec![vec![
        Button::new("Register", Callback::Register),
        Button::new("Login", Callback::Login),
    ]]);
    Ok(Transition {
        replies: vec![
            Reply::text(WELCOME_MESSAGE),
            Reply::with_keyboard("Please select an option to get started:", keyboard),
        ],
        next: ChatState::AwaitingAuthChoice,
    })
}

pub(super) fn on_auth_choice(
    session: &mut ConversationSession,
    callback: Callback,
) -> Result<Transition, BotError> {
    match callback {
        Callback::Register => Ok(Transition::to(
            ChatState::RegisteringUsername,
            Reply::text("You selected registration. Please enter a username:"),
        )),
        Callback::Login => Ok(Transition::to(
            ChatState::LoggingInUsername,
            Reply::text("You selected login. Please enter your username:"),
        )),
        other => Err(BotError::InvalidStateTransition(format!(
            "callback {other:?} during auth choice for user {}",
            session.user_id
        ))),
    }
}

pub(super) async fn on_register_username(
    machine: &Machine,
    session: &mut ConversationSession,
    text: &str,
) -> Result<Transition, BotError> {
    let username = text.trim();
    if username.is_empty() || username.len() > 64 {
        return Ok(Transition::stay(
            ChatState::RegisteringUsername,
            Reply::text("Please enter a username between 1 and 64 characters."),
        ));
    }
    if machine
        .store
        .get_profile_by_username(username)
        .await?
        .is_some()
    {
        return Ok(Transition::stay(
            ChatState::RegisteringUsername,
            Reply::text("Username exists — try a different one."),
        ));
    }

    session.flags.pending_username = Some(username.to_string());
    Ok(Transition::to(
        ChatState::RegisteringPassword,
        Reply::text("Now please create a password:"),
    ))
}

pub(super) async fn on_register_password(
    machine: &Machine,
    session: &mut ConversationSession,
    text: &str,
) -> Result<Transition, BotError> {
    let username = match session.flags.pending_username.take() {
        Some(username) => username,
        None => {
            return Ok(Transition::to(
                ChatState::RegisteringUsername,
                Reply::text("Let's start over — please enter a username:"),
            ))
        }
    };

    let profile = UserProfile {
        user_id: session.user_id,
        username: username.clone(),
        password_hash: hash_password(text.trim()),
        tank_volume_l: None,
        soil_volume_l: None,
        total_food_waste_kg: 0.0,
        selected_crop: None,
    };
    machine.store.create_profile(&profile).await?;
    session.profile = Some(profile);
    info!(user_id = session.user_id, "User registered");

    Ok(Transition::to(
        ChatState::SettingTankVolume,
        Reply::text(format!(
            "Registration successful, {username}! Enter your compost tank volume (litres):"
        )),
    ))
}

pub(super) fn on_login_username(session: &mut ConversationSession, text: &str) -> Transition {
    session.flags.pending_username = Some(text.trim().to_string());
    Transition::to(
        ChatState::LoggingInPassword,
        Reply::text("Now please enter your password:"),
    )
}

pub(super) async fn on_login_password(
    machine: &Machine,
    session: &mut ConversationSession,
    text: &str,
) -> Result<Transition, BotError> {
    let username = session.flags.pending_username.take().unwrap_or_default();
    let profile = machine.store.get_profile_by_username(&username).await?;

    match profile {
        Some(profile) if profile.password_hash == hash_password(text.trim()) => {
            info!(user_id = session.user_id, "User logged in");
            let complete = profile.is_complete();
            session.profile = Some(profile);
            if complete {
                Ok(menu::main_menu_transition(session, true))
            } else {
                Ok(Transition::to(
                    ChatState::SettingTankVolume,
                    Reply::text(format!(
                        "Welcome back, {username}! Complete setup — enter your compost tank volume (litres):"
                    )),
                ))
            }
        }
        _ => Ok(Transition::to(
            ChatState::LoggingInUsername,
            Reply::text("Invalid credentials, try again. Please enter your username:"),
        )),
    }
}

pub(super) async fn on_tank_volume(
    machine: &Machine,
    session: &mut ConversationSession,
    text: &str,
) -> Result<Transition, BotError> {
    let volume = match parse_bounded_positive(text, MAX_VOLUME_L) {
        Ok(volume) => volume,
        Err(e) => {
            return Ok(Transition::stay(
                ChatState::SettingTankVolume,
                Reply::text(format!(
                    "That doesn't look like a valid volume ({e}). Enter a positive number of litres, e.g. `120`."
                )),
            ))
        }
    };

    machine
        .store
        .update_volumes(session.user_id, Some(volume), None)
        .await?;
    session.invalidate_profile_cache();
    session.profile = machine.store.get_profile(session.user_id).await?;
    Ok(Transition::to(
        ChatState::SettingSoilVolume,
        Reply::text("Got it. Now enter your soil volume (litres):"),
    ))
}

pub(super) async fn on_soil_volume(
    machine: &Machine,
    session: &mut ConversationSession,
    text: &str,
) -> Result<Transition, BotError> {
    let volume = match parse_bounded_positive(text, MAX_VOLUME_L) {
        Ok(volume) => volume,
        Err(e) => {
            return Ok(Transition::stay(
                ChatState::SettingSoilVolume,
                Reply::text(format!(
                    "That doesn't look like a valid volume ({e}). Enter a positive number of litres, e.g. `40`."
                )),
            ))
        }
    };

    machine
        .store
        .update_volumes(session.user_id, None, Some(volume))
        .await?;
    session.profile = machine.store.get_profile(session.user_id).await?;
    Ok(menu::main_menu_transition(session, true))
}
