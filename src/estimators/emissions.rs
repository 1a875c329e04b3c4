//! # CO₂ Savings Estimator
//!
//! Converts composted food waste into avoided-emission figures and
//! relatable equivalents.

/// Air concentration of oxygen at STP, percent
const STP_AIR_CONCENTRATION_PERCENT: f64 = 21.0;
/// Atmospheric CO₂ at STP, ppm
const STP_CO2_PPM: f64 = 415.0;
/// CO₂ released per kg of landfilled food waste (kg)
const CO2_PER_KG_FOOD_WASTE: f64 = 2.5;
/// Fraction of landfill emissions composting avoids
const COMPOSTING_REDUCTION: f64 = 0.8;

#[derive(Debug, Clone, PartialEq)]
pub struct Co2Savings {
    pub food_waste_kg: f64,
    pub tank_volume_l: f64,
    pub soil_volume_l: f64,
    pub effective_volume_l: f64,
    pub baseline_emissions_g: f64,
    pub saved_from_landfill_kg: f64,
    pub total_saved_kg: f64,
}

/// Relatable equivalents for a CO₂ savings figure.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactSummary {
    pub trees_equivalent: f64,
    pub petrol_litres_equivalent: f64,
    pub car_miles_equivalent: f64,
}

#[derive(Debug, Clone, Default)]
pub struct EmissionsCalculator;

impl EmissionsCalculator {
    pub fn new() -> Self {
        Self
    }

    /// CO₂ emissions saved by composting `food_waste_kg` in the given setup.
    pub fn co2_saved_from_food_waste(
        &self,
        food_waste_kg: f64,
        tank_volume_l: f64,
        soil_volume_l: f64,
    ) -> Co2Savings {
        let air_concentration = STP_AIR_CONCENTRATION_PERCENT / 100.0;
        let effective_volume_l = tank_volume_l - soil_volume_l * air_concentration;
        let baseline_emissions_g = (STP_CO2_PPM / 1_000_000.0) * effective_volume_l * 1.8;

        let saved_from_landfill_kg =
            food_waste_kg * CO2_PER_KG_FOOD_WASTE * COMPOSTING_REDUCTION;
        let total_saved_kg = baseline_emissions_g / 1000.0 + saved_from_landfill_kg;

        Co2Savings {
            food_waste_kg,
            tank_volume_l,
            soil_volume_l,
            effective_volume_l,
            baseline_emissions_g,
            saved_from_landfill_kg,
            total_saved_kg,
        }
    }

    /// Convert a savings figure into tree/petrol/mileage equivalents.
    pub fn impact_summary(&self, co2_saved_kg: f64) -> ImpactSummary {
        ImpactSummary {
            trees_equivalent: co2_saved_kg / 25.0,
            petrol_litres_equivalent: co2_saved_kg / 2.3,
            car_miles_equivalent: co2_saved_kg / 0.4,
        }
    }
}
