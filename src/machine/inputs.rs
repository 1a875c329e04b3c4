//! Handlers for the `Awaiting*` numeric-input states. Each one validates,
//! calls its estimator, and returns to the main menu; invalid input
//! re-enters the same state with an example.

use chrono::Utc;
use tracing::info;

use crate::errors::{BotError, ValidationError};
use crate::estimators::ec::EcGuidance;
use crate::estimators::moisture::ForecastSource;
use crate::session::{ChatState, ConversationSession};
use crate::store::{FeedingLogEntry, MoistureLogEntry};
use crate::validators::{
    parse_bounded_positive, parse_ec_pair, parse_mix_triple, parse_percentage,
    MAX_FOOD_WASTE_KG, MAX_GREENS_GRAMS, MAX_MATERIAL_KG,
};

use super::{menu, Callback, Machine, Reply, Transition};

/// Re-enter the same state with the validation tag and a valid example.
fn reprompt(state: ChatState, error: ValidationError, example: &str) -> Transition {
    Transition::stay(
        state,
        Reply::text(format!("❌ Invalid input: {error}.\n\nExample: `{example}`")),
    )
}

/// Basic calculator: greens mass in kg.
pub(super) fn on_greens_input(
    machine: &Machine,
    session: &mut ConversationSession,
    text: &str,
) -> Result<Transition, BotError> {
    let greens_kg = match parse_bounded_positive(text, MAX_MATERIAL_KG) {
        Ok(value) => value,
        Err(e) => return Ok(reprompt(ChatState::AwaitingGreensInput, e, "1.5")),
    };

    let recipe = machine.estimators.recipe.recipe_for_greens(greens_kg);
    let yield_kg = machine.estimators.recipe.estimate_yield(greens_kg);
    let time = machine.estimators.recipe.estimate_time_range(greens_kg);

    let text = format!(
        "🧮 Feed Calculator Results\n\n\
         For {greens_kg:.2} kg of greens, you need:\n\n\
         🍂 Browns: {:.2} kg (dry leaves, paper, cardboard)\n\
         💧 Additional water: {:.2} L\n\
         📦 Total starting mass: {:.2} kg\n\n\
         🌱 Expected yield: {yield_kg:.2} kg of finished compost\n\
         ⏳ Time to ready: {:.1} days ({:.1}-{:.1} days)\n\n\
         💡 Mix thoroughly and turn weekly for best results.",
        recipe.browns_kg,
        recipe.water_l,
        recipe.total_start_mass_kg,
        time.estimate_days,
        time.lower_days,
        time.upper_days
    );

    let mut transition = menu::main_menu_transition(session, false);
    transition.replies.insert(0, Reply::text(text));
    Ok(transition)
}

/// Crop picked on the ML path; remember it and ask for the greens mass.
pub(super) async fn on_crop_selected(
    machine: &Machine,
    session: &mut ConversationSession,
    callback: Callback,
) -> Result<Transition, BotError> {
    let crop = match callback {
        Callback::Crop(crop) => crop,
        Callback::BackToMenu => return Ok(menu::main_menu_transition(session, false)),
        other => {
            return Err(BotError::InvalidStateTransition(format!(
                "callback {other:?} during crop selection"
            )))
        }
    };

    machine.store.set_selected_crop(session.user_id, crop).await?;
    session.invalidate_profile_cache();
    session.flags.selected_crop = Some(crop);
    Ok(Transition::to(
        ChatState::AwaitingMlGreensInput,
        Reply::text(format!(
            "You picked {}. How many grams of greens are you adding? E.g. `30`.",
            crop.label()
        )),
    ))
}

/// ML recommender: greens mass in grams for the previously chosen crop.
pub(super) async fn on_ml_greens_input(
    machine: &Machine,
    session: &mut ConversationSession,
    text: &str,
) -> Result<Transition, BotError> {
    let crop = match session.flags.selected_crop {
        Some(crop) => crop,
        None => return Ok(menu::crop_selection_transition()),
    };
    let greens_g = match parse_bounded_positive(text, MAX_GREENS_GRAMS) {
        Ok(value) => value,
        Err(e) => return Ok(reprompt(ChatState::AwaitingMlGreensInput, e, "30")),
    };

    let soil_volume_l = match &session.profile {
        Some(profile) => profile.soil_volume_l,
        None => {
            let profile = machine.store.get_profile(session.user_id).await?;
            session.profile = profile.clone();
            profile.and_then(|p| p.soil_volume_l)
        }
    };

    let rec = machine
        .estimators
        .feed
        .recommend(greens_g, crop, soil_volume_l)?;

    let text = format!(
        "🧠 ML Smart Recommendation\n\n\
         For {}:\n\n\
         🥬 Greens: {:.0} g\n\
         🍂 Browns: {:.0} g\n\
         💧 Water: {:.0} ml\n\n\
         📊 Details:\n\
         • Expected C:N ratio: {:.0}:1\n\
         • Soil volume: {:.0} L\n\
         • Browns per greens ratio: {:.1}:1\n\n\
         💧 Water is calculated as 50% of your soil volume.",
        rec.crop.label(),
        rec.greens_g,
        rec.browns_g,
        rec.water_g,
        rec.expected_cn,
        rec.soil_volume_l,
        rec.browns_per_green
    );

    let mut transition = menu::main_menu_transition(session, false);
    transition.replies.insert(0, Reply::text(text));
    Ok(transition)
}

/// Extraction calculator: the actual `greens;browns;water` mix.
pub(super) fn on_mix_input(
    machine: &Machine,
    session: &mut ConversationSession,
    text: &str,
) -> Result<Transition, BotError> {
    let (greens_kg, browns_kg, water_l) = match parse_mix_triple(text) {
        Ok(values) => values,
        Err(e) => return Ok(reprompt(ChatState::AwaitingCompostMixInput, e, "1.5;0.8;0.4")),
    };
    if greens_kg > MAX_MATERIAL_KG || browns_kg > MAX_MATERIAL_KG || water_l > MAX_MATERIAL_KG {
        return Ok(reprompt(
            ChatState::AwaitingCompostMixInput,
            ValidationError::OutOfRange {
                min: 0.0,
                max: MAX_MATERIAL_KG,
            },
            "1.5;0.8;0.4",
        ));
    }

    let analysis = machine
        .estimators
        .recipe
        .analyze_actual_mix(greens_kg, browns_kg, water_l);

    let text = format!(
        "🌱 Compost Estimate\n\n\
         For {greens_kg:.1} kg greens, {browns_kg:.1} kg browns, {water_l:.1} L water:\n\n\
         📦 Total start mass: {:.2} kg\n\
         🌱 Expected yield: {:.2} kg\n\
         ⏳ Est. time to ready: {:.1} days\n\
         📅 Time range: {:.1}-{:.1} days",
        analysis.total_start_mass_kg,
        analysis.expected_yield_kg,
        analysis.time.estimate_days,
        analysis.time.lower_days,
        analysis.time.upper_days
    );

    let mut transition = menu::main_menu_transition(session, false);
    transition.replies.insert(0, Reply::text(text));
    Ok(transition)
}

/// Feeding log: record the batch and roll greens into the food-waste total.
pub(super) async fn on_feeding_log_input(
    machine: &Machine,
    session: &mut ConversationSession,
    text: &str,
) -> Result<Transition, BotError> {
    let (greens_g, browns_g, water_g) = match parse_mix_triple(text) {
        Ok(values) => values,
        Err(e) => return Ok(reprompt(ChatState::AwaitingFeedingLogInput, e, "300;600;250")),
    };
    if greens_g > MAX_GREENS_GRAMS || browns_g > MAX_GREENS_GRAMS || water_g > MAX_GREENS_GRAMS {
        return Ok(reprompt(
            ChatState::AwaitingFeedingLogInput,
            ValidationError::OutOfRange {
                min: 0.0,
                max: MAX_GREENS_GRAMS,
            },
            "300;600;250",
        ));
    }

    machine
        .store
        .append_feeding_log(&FeedingLogEntry {
            user_id: session.user_id,
            greens_g,
            browns_g,
            water_g,
            logged_at: Utc::now(),
        })
        .await?;
    let total_kg = machine
        .store
        .add_food_waste(session.user_id, greens_g / 1000.0)
        .await?;
    session.invalidate_profile_cache();
    info!(user_id = session.user_id, greens_g, browns_g, water_g, "Feeding logged");

    let text = format!(
        "✅ Feeding logged: {greens_g:.0} g greens, {browns_g:.0} g browns, {water_g:.0} g water.\n\n\
         📈 Total food waste composted so far: {total_kg:.2} kg."
    );

    let mut transition = menu::main_menu_transition(session, false);
    transition.replies.insert(0, Reply::text(text));
    Ok(transition)
}

/// Moisture reading: log it and project the next 30 days.
pub(super) async fn on_moisture_input(
    machine: &Machine,
    session: &mut ConversationSession,
    text: &str,
) -> Result<Transition, BotError> {
    let moisture = match parse_percentage(text) {
        Ok(value) => value,
        Err(e) => return Ok(reprompt(ChatState::AwaitingMoistureInput, e, "45%")),
    };

    // Prior readings first, then append today's so it never feeds itself.
    let prior = machine.store.recent_moisture(session.user_id, 4).await?;
    let now = Utc::now();
    let days_since_water = prior
        .first()
        .map(|entry| (now - entry.logged_at).num_days().max(0) as u32)
        .unwrap_or(0);
    let history: Vec<f64> = prior.iter().map(|e| e.moisture_pct).collect();

    machine
        .store
        .append_moisture_log(&MoistureLogEntry {
            user_id: session.user_id,
            moisture_pct: moisture,
            logged_at: now,
        })
        .await?;

    let forecast = machine.estimators.moisture.forecast(
        moisture,
        &history,
        days_since_water,
        now.date_naive(),
    );

    let source_note = match forecast.source {
        ForecastSource::Model => "trend model over your recent readings",
        ForecastSource::Fallback => "typical drying-out estimate (log more readings for a personalised trend)",
    };
    let mut text = format!(
        "💧 30-Day Moisture Forecast\n\n\
         Current moisture: {moisture:.1}%\n\
         Based on: {source_note}\n\n\
         Next 7 days:\n"
    );
    for day in forecast.days.iter().take(7) {
        text.push_str(&format!(
            "• {}: {:.1}% ({})\n",
            day.date.format("%b %d"),
            day.moisture_pct,
            day.status.label()
        ));
    }
    match forecast.alert_date {
        Some(date) => text.push_str(&format!(
            "\n🚨 Watering recommended by {} — moisture drops too low after that.",
            date.format("%A, %b %d")
        )),
        None => text.push_str("\n✅ Moisture levels look healthy for the month ahead."),
    }

    let mut transition = menu::main_menu_transition(session, false);
    transition.replies.insert(0, Reply::text(text));
    Ok(transition)
}

/// EC reading: 90-day projection and readiness estimate.
pub(super) async fn on_ec_input(
    machine: &Machine,
    session: &mut ConversationSession,
    text: &str,
) -> Result<Transition, BotError> {
    let (ec, moisture) = match parse_ec_pair(text) {
        Ok(values) => values,
        Err(e) => return Ok(reprompt(ChatState::AwaitingEcInput, e, "2.4;55")),
    };

    let forecast = machine
        .estimators
        .ec
        .forecast(ec, moisture, Utc::now().date_naive())?;

    let key = |day: usize| forecast.days[day - 1].ec;
    let mut text = format!(
        "🧪 90-Day EC Forecast\n\n\
         📊 Current: EC {ec:.2} mS/cm at {moisture:.0}% moisture\n\n\
         🔮 Key predictions:\n\
         • Week 1: {:.2} mS/cm\n\
         • Week 2: {:.2} mS/cm\n\
         • Month 1: {:.2} mS/cm\n\
         • Month 2: {:.2} mS/cm\n\
         • Month 3: {:.2} mS/cm\n\n\
         📈 Range: {:.2}-{:.2} mS/cm (avg {:.2})\n\n",
        key(7),
        key(14),
        key(30),
        key(60),
        key(90),
        forecast.min_ec,
        forecast.max_ec,
        forecast.average_ec
    );

    match (forecast.readiness_day, forecast.readiness_date, forecast.guidance) {
        (Some(day), Some(date), _) => text.push_str(&format!(
            "🎯 Compost readiness: ~{day} days ({})\n\
             EC stabilises in the optimal 1.5-3.0 mS/cm band.",
            date.format("%B %d")
        )),
        (_, _, Some(EcGuidance::AboveOptimal)) => text.push_str(
            "🎯 High EC — allow it to stabilize. Avoid adding more nutrients and \
             let the current materials decompose.",
        ),
        (_, _, Some(EcGuidance::BelowOptimal)) => text.push_str(
            "🎯 EC below the optimal band — add nitrogen-rich material to \
             accelerate maturation.",
        ),
        (_, _, Some(EcGuidance::NearlyReady)) => text.push_str(
            "🎯 Nearly ready: EC is in the optimal band but needs a stable week. \
             Continue current management.",
        ),
        _ => {}
    }

    let mut transition = menu::main_menu_transition(session, false);
    transition.replies.insert(0, Reply::text(text));
    Ok(transition)
}

/// CO₂ flow: add a composted amount and report the updated savings.
pub(super) async fn on_co2_food_waste_input(
    machine: &Machine,
    session: &mut ConversationSession,
    text: &str,
) -> Result<Transition, BotError> {
    let kg = match parse_bounded_positive(text, MAX_FOOD_WASTE_KG) {
        Ok(value) => value,
        Err(e) => return Ok(reprompt(ChatState::AwaitingCo2FoodWasteInput, e, "2.5")),
    };

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

    let total_kg = machine.store.add_food_waste(session.user_id, kg).await?;
    session.invalidate_profile_cache();

    let savings = machine
        .estimators
        .emissions
        .co2_saved_from_food_waste(total_kg, tank, soil);
    let impact = machine
        .estimators
        .emissions
        .impact_summary(savings.total_saved_kg);

    let text = format!(
        "🌍 Added {kg:.1} kg of composted food waste!\n\n\
         📈 Your impact so far:\n\
         • Food waste composted: {total_kg:.1} kg\n\
         • CO₂ saved: {:.1} kg\n\
         • Equivalent to planting {:.1} trees 🌳\n\
         • Or saving {:.1} litres of petrol ⛽",
        savings.total_saved_kg, impact.trees_equivalent, impact.petrol_litres_equivalent
    );

    let mut transition = menu::main_menu_transition(session, false);
    transition.replies.insert(0, Reply::text(text));
    Ok(transition)
}
