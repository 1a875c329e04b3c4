use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use compostbot::bot::{self, BotDeps};
use compostbot::collaborators::{ChatServiceClient, SpeechServiceClient, VisionServiceClient};
use compostbot::config::Config;
use compostbot::estimators::Estimators;
use compostbot::machine::Machine;
use compostbot::session::SessionManager;
use compostbot::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting Compost Bot");

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&config.database_url)
        .await?;
    let store = PgStore::new(pool);
    store.init_schema().await?;

    // Estimators and collaborators are built once and injected; the machine
    // never constructs its own dependencies.
    let estimators = Estimators::from_config(&config);
    let chat = Arc::new(ChatServiceClient::new(
        config.chat_service_host.clone(),
        config.chat_model.clone(),
        config.recovery.clone(),
    ));
    let vision = Arc::new(VisionServiceClient::new(
        config.vision_service_host.clone(),
        &config.recovery,
    ));
    let speech = Arc::new(SpeechServiceClient::new(
        config.speech_service_host.clone(),
        &config.recovery,
    ));

    let machine = Arc::new(Machine::new(Arc::new(store), estimators, chat, vision));
    let deps = BotDeps {
        machine,
        sessions: SessionManager::new(),
        speech,
        max_voice_secs: config.max_voice_secs,
    };

    let telegram_bot = Bot::new(&config.telegram_token);
    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let deps = deps.clone();
            move |bot: Bot, msg: Message| {
                let deps = deps.clone();
                async move { bot::message_handler(bot, msg, deps).await }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let deps = deps.clone();
            move |bot: Bot, q: teloxide::types::CallbackQuery| {
                let deps = deps.clone();
                async move { bot::callback_handler(bot, q, deps).await }
            }
        }));

    Dispatcher::builder(telegram_bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
