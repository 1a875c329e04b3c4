//! # Compost Recipe Calculator
//!
//! Pure recipe, yield and timing estimates for a compost feed. All functions
//! are deterministic given their inputs and the fixed reference constants;
//! rounding happens at render time, not here.

/// Reference carbon:nitrogen ratios and moisture targets for the blend.
#[derive(Debug, Clone)]
pub struct CompostConstants {
    /// Typical C:N ratio for nitrogen-rich greens
    pub cn_greens: f64,
    /// Typical C:N ratio for carbon-rich browns
    pub cn_browns: f64,
    /// Target blended C:N ratio
    pub target_cn: f64,
    /// Target moisture fraction of the total mass
    pub target_moisture: f64,
    /// Water fraction carried by greens
    pub greens_water_content: f64,
    /// Water fraction carried by browns
    pub browns_water_content: f64,
    /// Finished-compost yield as a fraction of input greens
    pub yield_factor: f64,
    /// Rule-of-thumb days to maturity per kg of greens
    pub days_per_kg_greens: f64,
    /// Symmetric uncertainty applied to the time estimate
    pub timing_variability: f64,
}

impl Default for CompostConstants {
    fn default() -> Self {
        Self {
            cn_greens: 17.0,
            cn_browns: 70.0,
            target_cn: 30.0,
            target_moisture: 0.55,
            greens_water_content: 0.8,
            browns_water_content: 0.15,
            yield_factor: 0.5,
            days_per_kg_greens: 6.0,
            timing_variability: 0.2,
        }
    }
}

/// Required complements for a given greens mass.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeEstimate {
    pub greens_kg: f64,
    pub browns_kg: f64,
    pub water_l: f64,
    pub total_start_mass_kg: f64,
}

/// Days-to-ready estimate with its uncertainty band.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRange {
    pub lower_days: f64,
    pub estimate_days: f64,
    pub upper_days: f64,
}

/// Analysis of an actual `greens;browns;water` mix the user entered.
#[derive(Debug, Clone, PartialEq)]
pub struct MixAnalysis {
    pub total_start_mass_kg: f64,
    pub expected_yield_kg: f64,
    pub time: TimeRange,
}

/// Calculator over a fixed constant set. Constructed once at startup and
/// shared by reference.
#[derive(Debug, Clone, Default)]
pub struct RecipeCalculator {
    constants: CompostConstants,
}

impl RecipeCalculator {
    pub fn new(constants: CompostConstants) -> Self {
        Self { constants }
    }

    /// Required browns mass and additional water for a given greens mass.
    ///
    /// Browns balance the blend to the target C:N ratio; water tops the mix
    /// up to the target moisture fraction after accounting for the water the
    /// materials already carry. Both are clamped to zero.
    pub fn recipe_for_greens(&self, greens_kg: f64) -> RecipeEstimate {
        let c = &self.constants;
        let browns_kg = (greens_kg * (c.target_cn - c.cn_greens)
            / (c.cn_browns - c.target_cn))
            .max(0.0);
        let total_mass = greens_kg + browns_kg;
        let existing_water =
            greens_kg * c.greens_water_content + browns_kg * c.browns_water_content;
        let water_l = (c.target_moisture * total_mass - existing_water).max(0.0);

        RecipeEstimate {
            greens_kg,
            browns_kg,
            water_l,
            total_start_mass_kg: total_mass,
        }
    }

    /// Finished-compost yield for a greens mass, assuming the fixed mass loss.
    pub fn estimate_yield(&self, greens_kg: f64) -> f64 {
        greens_kg * self.constants.yield_factor
    }

    /// Days until ready, with the symmetric uncertainty band.
    pub fn estimate_time_range(&self, greens_kg: f64) -> TimeRange {
        let estimate = greens_kg * self.constants.days_per_kg_greens;
        TimeRange {
            lower_days: estimate * (1.0 - self.constants.timing_variability),
            estimate_days: estimate,
            upper_days: estimate * (1.0 + self.constants.timing_variability),
        }
    }

    /// Analyse the mix the user actually intends to load.
    pub fn analyze_actual_mix(&self, greens_kg: f64, browns_kg: f64, water_l: f64) -> MixAnalysis {
        MixAnalysis {
            total_start_mass_kg: greens_kg + browns_kg + water_l,
            expected_yield_kg: self.estimate_yield(greens_kg),
            time: self.estimate_time_range(greens_kg),
        }
    }
}
