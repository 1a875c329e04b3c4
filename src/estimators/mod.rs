//! # Numeric Estimators
//!
//! Pure estimation engines invoked by the conversation state machine. Each
//! one is constructed once at startup and injected into the machine; none of
//! them performs I/O after construction.

pub mod ec;
pub mod emissions;
pub mod feed_model;
pub mod moisture;
pub mod recipe;

use std::sync::Arc;

use crate::config::Config;

/// The estimator set the state machine depends on.
#[derive(Clone)]
pub struct Estimators {
    pub recipe: Arc<recipe::RecipeCalculator>,
    pub feed: Arc<feed_model::FeedRecommender>,
    pub moisture: Arc<moisture::MoistureForecaster>,
    pub ec: Arc<ec::EcForecaster>,
    pub emissions: Arc<emissions::EmissionsCalculator>,
}

impl Estimators {
    /// Build the full set from configuration, loading trained artifacts.
    ///
    /// A missing moisture artifact degrades to the decay fallback; a missing
    /// EC artifact leaves that estimator refusing requests. Neither aborts
    /// startup.
    pub fn from_config(config: &Config) -> Self {
        let ec = match ec::EcForecaster::load(&config.ec_model_path) {
            Ok(forecaster) => forecaster,
            Err(e) => {
                tracing::error!(error = %e, "EC forecast model failed to load, estimator disabled");
                ec::EcForecaster::unavailable()
            }
        };

        Self {
            recipe: Arc::new(recipe::RecipeCalculator::default()),
            feed: Arc::new(feed_model::FeedRecommender::new()),
            moisture: Arc::new(moisture::MoistureForecaster::load(
                &config.moisture_model_path,
            )),
            ec: Arc::new(ec),
            emissions: Arc::new(emissions::EmissionsCalculator::new()),
        }
    }
}
