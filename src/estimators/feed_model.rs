//! # Crop Feed Recommender
//!
//! Crop-specific browns/water recommendations derived from the trained
//! historical ratios. Water is sized to the registered soil volume, never to
//! the feed batch.

use serde::{Deserialize, Serialize};

use crate::errors::BotError;

/// The enumerated crop set the recommender was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CropType {
    LeafyGreens,
    FruitVeggies,
    RootVegetables,
    Herbs,
    FloweringPlants,
    WoodyPlants,
}

impl CropType {
    pub const ALL: [CropType; 6] = [
        CropType::LeafyGreens,
        CropType::FruitVeggies,
        CropType::RootVegetables,
        CropType::Herbs,
        CropType::FloweringPlants,
        CropType::WoodyPlants,
    ];

    /// Parse a free-form crop name, tolerating spacing and hyphens.
    pub fn parse(raw: &str) -> Result<CropType, BotError> {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect();
        match normalized.as_str() {
            "leafygreens" => Ok(CropType::LeafyGreens),
            "fruitveggies" => Ok(CropType::FruitVeggies),
            "rootvegetables" => Ok(CropType::RootVegetables),
            "herbs" => Ok(CropType::Herbs),
            "floweringplants" => Ok(CropType::FloweringPlants),
            "woodyplants" => Ok(CropType::WoodyPlants),
            _ => Err(BotError::InvalidCropType(raw.trim().to_string())),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CropType::LeafyGreens => "Leafy Greens",
            CropType::FruitVeggies => "Fruit Veggies",
            CropType::RootVegetables => "Root Vegetables",
            CropType::Herbs => "Herbs",
            CropType::FloweringPlants => "Flowering Plants",
            CropType::WoodyPlants => "Woody Plants",
        }
    }

    /// Target C:N range for the crop.
    pub fn cn_range(&self) -> (f64, f64) {
        match self {
            CropType::LeafyGreens => (12.5, 17.5),
            CropType::FruitVeggies => (21.5, 26.5),
            CropType::RootVegetables => (15.5, 20.5),
            CropType::Herbs => (21.5, 26.5),
            CropType::FloweringPlants => (18.5, 23.5),
            CropType::WoodyPlants => (24.5, 29.5),
        }
    }

    /// Browns-per-green multiplier from the historical reference data.
    pub fn browns_multiplier(&self) -> f64 {
        match self {
            CropType::LeafyGreens => 1.8,
            CropType::FruitVeggies => 2.1,
            CropType::RootVegetables => 1.8,
            CropType::Herbs => 2.0,
            CropType::FloweringPlants => 1.9,
            CropType::WoodyPlants => 2.2,
        }
    }
}

/// Recommendation returned for a greens batch and crop.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRecommendation {
    pub crop: CropType,
    pub greens_g: f64,
    pub browns_g: f64,
    /// Water in grams (equivalently millilitres)
    pub water_g: f64,
    pub browns_per_green: f64,
    /// Midpoint of the crop's target C:N range
    pub expected_cn: f64,
    pub soil_volume_l: f64,
}

/// Fraction of the soil volume used as the water requirement.
const WATER_SOIL_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct FeedRecommender;

impl FeedRecommender {
    pub fn new() -> Self {
        Self
    }

    /// Compute the recommendation for a greens mass (g) and target crop.
    ///
    /// Water is a fixed fraction of the registered soil volume; a missing or
    /// non-positive soil volume is a profile-setup problem, not a default.
    pub fn recommend(
        &self,
        greens_g: f64,
        crop: CropType,
        soil_volume_l: Option<f64>,
    ) -> Result<FeedRecommendation, BotError> {
        let soil_volume_l = match soil_volume_l {
            Some(v) if v > 0.0 => v,
            _ => return Err(BotError::MissingProfileData("soil_volume")),
        };

        let browns_per_green = crop.browns_multiplier();
        let (cn_min, cn_max) = crop.cn_range();

        Ok(FeedRecommendation {
            crop,
            greens_g,
            browns_g: greens_g * browns_per_green,
            water_g: soil_volume_l * 1000.0 * WATER_SOIL_FRACTION,
            browns_per_green,
            expected_cn: (cn_min + cn_max) / 2.0,
            soil_volume_l,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_parse_tolerates_formatting() {
        assert_eq!(CropType::parse("Herbs").unwrap(), CropType::Herbs);
        assert_eq!(
            CropType::parse("leafy greens").unwrap(),
            CropType::LeafyGreens
        );
        assert_eq!(
            CropType::parse("Fruit-Veggies").unwrap(),
            CropType::FruitVeggies
        );
        assert!(matches!(
            CropType::parse("cactus"),
            Err(BotError::InvalidCropType(_))
        ));
    }

    #[test]
    fn test_water_sized_to_soil_volume_not_batch() {
        let recommender = FeedRecommender::new();
        let small = recommender
            .recommend(30.0, CropType::Herbs, Some(10.0))
            .unwrap();
        let large = recommender
            .recommend(3000.0, CropType::Herbs, Some(10.0))
            .unwrap();
        assert_eq!(small.water_g, 5000.0);
        assert_eq!(large.water_g, 5000.0);
        assert_eq!(small.browns_g, 60.0);
    }

    #[test]
    fn test_missing_soil_volume_is_profile_error() {
        let recommender = FeedRecommender::new();
        assert!(matches!(
            recommender.recommend(30.0, CropType::Herbs, None),
            Err(BotError::MissingProfileData("soil_volume"))
        ));
        assert!(matches!(
            recommender.recommend(30.0, CropType::Herbs, Some(0.0)),
            Err(BotError::MissingProfileData("soil_volume"))
        ));
    }
}
