//! # EC Forecast
//!
//! 90-day electrical-conductivity projection plus a compost-readiness
//! estimate. The projection constants come from a trained artifact loaded at
//! startup; without it the estimator refuses to forecast. There is no silent
//! fallback here, unlike the moisture forecast.

use std::path::Path;

use chrono::{Duration, NaiveDate};
use serde::Deserialize;

use crate::errors::BotError;

/// Forecast horizon in days
pub const FORECAST_DAYS: usize = 90;
/// Optimal EC band for mature compost (mS/cm)
pub const OPTIMAL_EC_MIN: f64 = 1.5;
pub const OPTIMAL_EC_MAX: f64 = 3.0;
/// Consecutive in-band days required before compost counts as ready
pub const STABLE_DAYS_NEEDED: usize = 7;

/// Trained projection constants.
#[derive(Debug, Clone, Deserialize)]
pub struct EcModelArtifact {
    /// Per-step decay base applied as `decay_rate ^ (day * decay_scale)`
    pub decay_rate: f64,
    pub decay_scale: f64,
    /// Seasonal modulation `1 + amplitude * sin(day * frequency)`
    pub seasonal_amplitude: f64,
    pub seasonal_frequency: f64,
    /// Linear influence of moisture deviation from 50%
    pub moisture_coeff: f64,
    /// Clamp bounds for a projected reading
    pub ec_floor: f64,
    pub ec_ceiling: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EcDay {
    pub date: NaiveDate,
    pub ec: f64,
}

/// Qualitative guidance when no readiness day exists within the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcGuidance {
    /// EC below the optimal band: add nitrogen-rich material
    BelowOptimal,
    /// EC above the optimal band: allow to stabilize
    AboveOptimal,
    /// In band but not yet stable for long enough
    NearlyReady,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EcForecast {
    pub current_ec: f64,
    pub current_moisture: f64,
    pub days: Vec<EcDay>,
    /// 1-based day offset at which the stable run completes, if any
    pub readiness_day: Option<usize>,
    pub readiness_date: Option<NaiveDate>,
    /// Present exactly when `readiness_day` is absent
    pub guidance: Option<EcGuidance>,
    pub average_ec: f64,
    pub min_ec: f64,
    pub max_ec: f64,
}

/// Forecaster over the trained artifact. [`EcForecaster::unavailable`]
/// constructs one that refuses every request, for startups where the
/// artifact failed to load.
#[derive(Debug, Clone)]
pub struct EcForecaster {
    model: Option<EcModelArtifact>,
}

impl EcForecaster {
    pub fn new(model: EcModelArtifact) -> Self {
        Self { model: Some(model) }
    }

    /// A forecaster whose model artifact could not be loaded.
    pub fn unavailable() -> Self {
        Self { model: None }
    }

    /// Load the trained artifact, failing loudly when it is absent.
    pub fn load(path: &Path) -> Result<Self, BotError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BotError::ModelUnavailable(format!("{}: {e}", path.display()))
        })?;
        let model: EcModelArtifact = serde_json::from_str(&raw).map_err(|e| {
            BotError::ModelUnavailable(format!("{}: {e}", path.display()))
        })?;
        Ok(Self::new(model))
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    /// Project EC for the next [`FORECAST_DAYS`] days starting tomorrow and
    /// scan for the first stable in-band run.
    pub fn forecast(
        &self,
        current_ec: f64,
        current_moisture: f64,
        today: NaiveDate,
    ) -> Result<EcForecast, BotError> {
        let model = self.model.as_ref().ok_or_else(|| {
            BotError::ModelUnavailable("EC forecast model not loaded".to_string())
        })?;

        let moisture_factor = 1.0 + (current_moisture - 50.0) * model.moisture_coeff;
        let mut days = Vec::with_capacity(FORECAST_DAYS);
        for day in 0..FORECAST_DAYS {
            let base = current_ec * model.decay_rate.powf(day as f64 * model.decay_scale);
            let seasonal =
                1.0 + model.seasonal_amplitude * (day as f64 * model.seasonal_frequency).sin();
            let ec = (base * seasonal * moisture_factor).clamp(model.ec_floor, model.ec_ceiling);
            days.push(EcDay {
                date: today + Duration::days(day as i64 + 1),
                ec,
            });
        }

        let (readiness_day, readiness_date) = find_stable_run(&days);
        let guidance = match readiness_day {
            Some(_) => None,
            None => Some(if current_ec < OPTIMAL_EC_MIN {
                EcGuidance::BelowOptimal
            } else if current_ec > OPTIMAL_EC_MAX {
                EcGuidance::AboveOptimal
            } else {
                EcGuidance::NearlyReady
            }),
        };

        let sum: f64 = days.iter().map(|d| d.ec).sum();
        let min_ec = days.iter().map(|d| d.ec).fold(f64::INFINITY, f64::min);
        let max_ec = days.iter().map(|d| d.ec).fold(f64::NEG_INFINITY, f64::max);

        Ok(EcForecast {
            current_ec,
            current_moisture,
            average_ec: sum / days.len() as f64,
            min_ec,
            max_ec,
            readiness_day,
            readiness_date,
            guidance,
            days,
        })
    }
}

/// First run of [`STABLE_DAYS_NEEDED`] consecutive in-band days; returns the
/// 1-based offset and date of the day completing the run.
fn find_stable_run(days: &[EcDay]) -> (Option<usize>, Option<NaiveDate>) {
    let mut consecutive = 0;
    for (i, day) in days.iter().enumerate() {
        if (OPTIMAL_EC_MIN..=OPTIMAL_EC_MAX).contains(&day.ec) {
            consecutive += 1;
            if consecutive >= STABLE_DAYS_NEEDED {
                return (Some(i + 1), Some(day.date));
            }
        } else {
            consecutive = 0;
        }
    }
    (None, None)
}
