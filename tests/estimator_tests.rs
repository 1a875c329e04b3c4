use chrono::NaiveDate;

use compostbot::estimators::ec::{EcForecaster, EcGuidance, EcModelArtifact};
use compostbot::estimators::feed_model::{CropType, FeedRecommender};
use compostbot::estimators::moisture::{ForecastSource, MoistureForecaster};
use compostbot::estimators::recipe::RecipeCalculator;
use compostbot::errors::BotError;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

fn ec_artifact() -> EcModelArtifact {
    EcModelArtifact {
        decay_rate: 0.99,
        decay_scale: 0.1,
        seasonal_amplitude: 0.05,
        seasonal_frequency: 0.05,
        moisture_coeff: 0.001,
        ec_floor: 0.1,
        ec_ceiling: 8.0,
    }
}

/// Scenario: 1.5 kg greens, 0.8 kg browns, 0.4 L water.
#[test]
fn test_actual_mix_analysis_reference_scenario() {
    let calc = RecipeCalculator::default();
    let analysis = calc.analyze_actual_mix(1.5, 0.8, 0.4);

    assert!(close(analysis.total_start_mass_kg, 2.7));
    assert!(close(analysis.expected_yield_kg, 0.75));
    assert!(close(analysis.time.estimate_days, 9.0));
    assert!(close(analysis.time.lower_days, 7.2));
    assert!(close(analysis.time.upper_days, 10.8));
}

#[test]
fn test_recipe_browns_strictly_positive_and_monotonic() {
    let calc = RecipeCalculator::default();
    let mut previous = 0.0;
    for i in 1..=200 {
        let greens = i as f64 * 0.25;
        let browns = calc.recipe_for_greens(greens).browns_kg;
        assert!(browns > 0.0, "browns must stay positive for greens={greens}");
        assert!(browns > previous, "browns must grow with greens");
        previous = browns;
    }
}

#[test]
fn test_time_estimate_always_inside_band() {
    let calc = RecipeCalculator::default();
    for i in 1..=100 {
        let range = calc.estimate_time_range(i as f64 * 0.1);
        assert!(range.lower_days <= range.estimate_days);
        assert!(range.estimate_days <= range.upper_days);
    }
}

/// Scenario: 30 g greens of Herbs with a 10 L soil volume.
#[test]
fn test_feed_recommendation_reference_scenario() {
    let recommender = FeedRecommender::new();
    let rec = recommender
        .recommend(30.0, CropType::Herbs, Some(10.0))
        .unwrap();

    assert!(close(rec.browns_g, 30.0 * CropType::Herbs.browns_multiplier()));
    assert!(close(rec.water_g, 5000.0));

    // Water depends on the tank, not the batch
    let bigger_batch = recommender
        .recommend(900.0, CropType::Herbs, Some(10.0))
        .unwrap();
    assert!(close(bigger_batch.water_g, 5000.0));
}

#[test]
fn test_feed_recommendation_failure_tags() {
    let recommender = FeedRecommender::new();
    assert!(matches!(
        recommender.recommend(30.0, CropType::Herbs, None),
        Err(BotError::MissingProfileData("soil_volume"))
    ));
    assert!(matches!(
        CropType::parse("bonsai"),
        Err(BotError::InvalidCropType(_))
    ));
}

/// Scenario: 45% moisture with no history falls back to the decay model.
#[test]
fn test_moisture_forecast_fallback_scenario() {
    let forecaster = MoistureForecaster::new(None);
    let forecast = forecaster.forecast(45.0, &[], 0, today());

    assert_eq!(forecast.source, ForecastSource::Fallback);
    assert!(forecast.days[0].moisture_pct < 45.0);
    assert_eq!(forecast.days.len(), 30);
}

#[test]
fn test_moisture_model_requires_enough_history() {
    let forecaster = MoistureForecaster::load(std::path::Path::new("models/moisture_lag.json"));
    assert!(forecaster.has_model());

    let short = forecaster.forecast(50.0, &[52.0], 1, today());
    assert_eq!(short.source, ForecastSource::Fallback);

    let full = forecaster.forecast(50.0, &[52.0, 55.0, 58.0], 1, today());
    assert_eq!(full.source, ForecastSource::Model);
}

/// Scenario: EC 4.2 mS/cm sits above the optimal band for the whole horizon.
#[test]
fn test_ec_forecast_high_reading_scenario() {
    let forecaster = EcForecaster::new(ec_artifact());
    let forecast = forecaster.forecast(4.2, 55.0, today()).unwrap();

    assert_eq!(forecast.days.len(), 90);
    assert_eq!(forecast.readiness_day, None);
    assert_eq!(forecast.guidance, Some(EcGuidance::AboveOptimal));
}

#[test]
fn test_ec_forecast_loads_checked_in_artifact() {
    let forecaster = EcForecaster::load(std::path::Path::new("models/ec_forecast.json")).unwrap();
    let forecast = forecaster.forecast(2.0, 50.0, today()).unwrap();
    assert_eq!(forecast.readiness_day, Some(7));
}

#[test]
fn test_ec_forecast_missing_artifact_fails_loudly() {
    let result = EcForecaster::load(std::path::Path::new("models/does_not_exist.json"));
    assert!(matches!(result, Err(BotError::ModelUnavailable(_))));

    let unavailable = EcForecaster::unavailable();
    assert!(matches!(
        unavailable.forecast(2.0, 50.0, today()),
        Err(BotError::ModelUnavailable(_))
    ));
}
