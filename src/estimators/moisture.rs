//! # Moisture Forecast
//!
//! Projects soil moisture 30 days out. Preferred path is a lagged regression
//! over the last three readings plus days since watering, rolled forward one
//! day at a time; with too little history or no trained weights it degrades
//! to a fixed daily decay, and the result carries a source flag so the two
//! are distinguishable.

use std::path::Path;

use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use tracing::warn;

/// Forecast horizon in days
pub const FORECAST_DAYS: usize = 30;
/// Prior readings required before the lagged model is trusted
pub const MIN_HISTORY_READINGS: usize = 3;
/// Percentage points lost per day in the fallback decay
pub const FALLBACK_DAILY_LOSS: f64 = 3.5;

/// Trained weights for the lagged regression.
#[derive(Debug, Clone, Deserialize)]
pub struct MoistureModelWeights {
    pub intercept: f64,
    pub lag1: f64,
    pub lag2: f64,
    pub lag3: f64,
    pub days_since_water: f64,
}

/// Which path produced the forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastSource {
    Model,
    Fallback,
}

/// Watering status band for a projected day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoistureStatus {
    Critical,
    Low,
    Moderate,
    Good,
}

impl MoistureStatus {
    pub fn from_percentage(moisture: f64) -> Self {
        if moisture < 20.0 {
            MoistureStatus::Critical
        } else if moisture < 40.0 {
            MoistureStatus::Low
        } else if moisture < 60.0 {
            MoistureStatus::Moderate
        } else {
            MoistureStatus::Good
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MoistureStatus::Critical => "critical",
            MoistureStatus::Low => "low",
            MoistureStatus::Moderate => "moderate",
            MoistureStatus::Good => "good",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoistureDay {
    pub date: NaiveDate,
    pub moisture_pct: f64,
    pub status: MoistureStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoistureForecast {
    pub current_moisture: f64,
    pub source: ForecastSource,
    pub days: Vec<MoistureDay>,
    /// First projected date whose status enters critical or low
    pub alert_date: Option<NaiveDate>,
}

/// Forecaster holding the optional trained weights.
#[derive(Debug, Clone, Default)]
pub struct MoistureForecaster {
    model: Option<MoistureModelWeights>,
}

impl MoistureForecaster {
    pub fn new(model: Option<MoistureModelWeights>) -> Self {
        Self { model }
    }

    /// Load trained weights from a JSON artifact. A missing or unreadable
    /// artifact leaves the forecaster on the fallback path; this estimator
    /// is allowed to degrade gracefully.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<MoistureModelWeights>(&raw) {
                Ok(weights) => Self::new(Some(weights)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Moisture model artifact unreadable, using fallback decay");
                    Self::new(None)
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Moisture model artifact missing, using fallback decay");
                Self::new(None)
            }
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Project moisture for the next [`FORECAST_DAYS`] days starting tomorrow.
    ///
    /// `history` holds prior readings, most recent first. `days_since_water`
    /// seeds the watering-age feature and increments per projected day.
    pub fn forecast(
        &self,
        current_moisture: f64,
        history: &[f64],
        days_since_water: u32,
        today: NaiveDate,
    ) -> MoistureForecast {
        let (values, source) = match (&self.model, history.len() >= MIN_HISTORY_READINGS) {
            (Some(weights), true) => (
                roll_lagged_model(weights, current_moisture, history, days_since_water),
                ForecastSource::Model,
            ),
            _ => (fallback_decay(current_moisture), ForecastSource::Fallback),
        };

        let days: Vec<MoistureDay> = values
            .into_iter()
            .enumerate()
            .map(|(i, moisture_pct)| MoistureDay {
                date: today + Duration::days(i as i64 + 1),
                moisture_pct,
                status: MoistureStatus::from_percentage(moisture_pct),
            })
            .collect();

        let alert_date = days
            .iter()
            .find(|d| matches!(d.status, MoistureStatus::Critical | MoistureStatus::Low))
            .map(|d| d.date);

        MoistureForecast {
            current_moisture,
            source,
            days,
            alert_date,
        }
    }
}

/// Roll the lagged regression forward one day at a time. Each predicted
/// value becomes the new lag-1 input and the watering age increments.
fn roll_lagged_model(
    weights: &MoistureModelWeights,
    current: f64,
    history: &[f64],
    days_since_water: u32,
) -> Vec<f64> {
    let mut lag1 = current;
    let mut lag2 = history[0];
    let mut lag3 = history[1];
    let mut age = days_since_water as f64;

    let mut values = Vec::with_capacity(FORECAST_DAYS);
    for _ in 0..FORECAST_DAYS {
        age += 1.0;
        let predicted = (weights.intercept
            + weights.lag1 * lag1
            + weights.lag2 * lag2
            + weights.lag3 * lag3
            + weights.days_since_water * age)
            .clamp(0.0, 100.0);
        values.push(predicted);
        lag3 = lag2;
        lag2 = lag1;
        lag1 = predicted;
    }
    values
}

/// Fixed-loss fallback when no model or history is available.
fn fallback_decay(current: f64) -> Vec<f64> {
    let mut moisture = current;
    let mut values = Vec::with_capacity(FORECAST_DAYS);
    for _ in 0..FORECAST_DAYS {
        moisture = (moisture - FALLBACK_DAILY_LOSS).max(0.0);
        values.push(moisture);
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn weights() -> MoistureModelWeights {
        MoistureModelWeights {
            intercept: 2.0,
            lag1: 0.85,
            lag2: 0.08,
            lag3: 0.02,
            days_since_water: -0.3,
        }
    }

    #[test]
    fn test_no_history_falls_back_and_declines() {
        let forecaster = MoistureForecaster::new(Some(weights()));
        let forecast = forecaster.forecast(45.0, &[], 0, today());
        assert_eq!(forecast.source, ForecastSource::Fallback);
        assert!(forecast.days[0].moisture_pct < 45.0);
        assert_eq!(forecast.days.len(), FORECAST_DAYS);
    }

    #[test]
    fn test_no_model_falls_back() {
        let forecaster = MoistureForecaster::new(None);
        let forecast = forecaster.forecast(45.0, &[48.0, 52.0, 55.0, 58.0], 1, today());
        assert_eq!(forecast.source, ForecastSource::Fallback);
    }

    #[test]
    fn test_model_path_rolls_lags_forward() {
        let forecaster = MoistureForecaster::new(Some(weights()));
        let forecast = forecaster.forecast(60.0, &[63.0, 66.0, 70.0], 2, today());
        assert_eq!(forecast.source, ForecastSource::Model);
        assert_eq!(forecast.days.len(), FORECAST_DAYS);
        // Declining weights and watering age keep the projection in bounds
        for day in &forecast.days {
            assert!((0.0..=100.0).contains(&day.moisture_pct));
        }
    }

    #[test]
    fn test_alert_is_first_low_or_critical_date() {
        let forecaster = MoistureForecaster::new(None);
        let forecast = forecaster.forecast(45.0, &[], 0, today());
        // 45 - 3.5*2 = 38.0 crosses into the low band on day 2
        assert_eq!(forecast.alert_date, Some(today() + Duration::days(2)));
    }

    #[test]
    fn test_status_bands() {
        assert_eq!(
            MoistureStatus::from_percentage(10.0),
            MoistureStatus::Critical
        );
        assert_eq!(MoistureStatus::from_percentage(25.0), MoistureStatus::Low);
        assert_eq!(
            MoistureStatus::from_percentage(50.0),
            MoistureStatus::Moderate
        );
        assert_eq!(MoistureStatus::from_percentage(75.0), MoistureStatus::Good);
    }
}
