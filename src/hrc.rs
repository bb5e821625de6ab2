//! Column names and defaults for the HRC steel deployments.

use crate::scenario::{Adjustment, CombinationPolicy, ScenarioAdjustments};
use crate::types::{ForecastConfig, ForecastRequest};

pub const TARGET: &str = "HRC (FOB, $/t)";

pub const IRON_ORE: &str = "Iron Ore (CFR, $/t)";
pub const COKING_COAL: &str = "HCC (Aus FOB, $/t)";
pub const SCRAP: &str = "Domestic Scrap (DDP Jiangsu incl. VAT $/t)";
pub const EXPORT_SHARE: &str = "Monthly Export of Semis & Finished Steel as % of Production";
pub const REAL_ESTATE_FAI: &str = "FAI in urban real estate development (y-o-y) Growth";
pub const AUTO_PRODUCTION: &str = "Automobile Production (y-o-y)";
pub const STEEL_SHIPS: &str = "Civil Metal-Vessels/Steel Ships (y-o-y)";
pub const FRIDGES: &str = "Household Fridges (y-o-y)";
pub const AIR_CONDITIONERS: &str = "Air Conditioner (y-o-y)";

/// Drivers modelled alongside the target in the main deployment.
pub const DRIVERS: [&str; 9] = [
    IRON_ORE,
    COKING_COAL,
    SCRAP,
    EXPORT_SHARE,
    REAL_ESTATE_FAI,
    AUTO_PRODUCTION,
    STEEL_SHIPS,
    FRIDGES,
    AIR_CONDITIONERS,
];

/// Drivers exposed as scenario sliders.
pub const SCENARIO_DRIVERS: [&str; 5] = [IRON_ORE, COKING_COAL, SCRAP, EXPORT_SHARE, REAL_ESTATE_FAI];

pub const MAIN_LAG_ORDER: usize = 4;
pub const LIGHT_LAG_ORDER: usize = 2;

/// Horizon range offered to dashboard users.
pub const MIN_DASHBOARD_HORIZON: usize = 3;
pub const MAX_DASHBOARD_HORIZON: usize = 18;

/// Scenario adjustments over the five slider drivers, in `SCENARIO_DRIVERS` order.
pub fn driver_adjustments(
    up_pct: [f64; 5],
    down_pct: [f64; 5],
    policy: CombinationPolicy,
) -> ScenarioAdjustments {
    let components = SCENARIO_DRIVERS
        .iter()
        .zip(up_pct.iter().zip(down_pct.iter()))
        .map(|(name, (&up, &down))| Adjustment::new(*name, up, down))
        .collect();
    ScenarioAdjustments::named(components, policy)
}

/// Request over the full driver set with the main lag order.
pub fn default_request(horizon: usize) -> ForecastRequest {
    ForecastRequest::new(
        TARGET,
        DRIVERS.iter().map(|s| s.to_string()).collect(),
        horizon,
    )
    .with_config(ForecastConfig::new(MAIN_LAG_ORDER).with_max_horizon(MAX_DASHBOARD_HORIZON))
}
