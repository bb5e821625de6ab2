//! VAR forecasting core for hot-rolled coil (HRC) steel prices.
//!
//! A monthly multivariate level table is differenced, a VAR(p) with intercept
//! is fitted by least squares, the differenced series is projected forward
//! recursively and integrated back to levels. The target column's path is
//! then widened into scenario bands and, optionally, converted into a landed
//! local-currency price.

pub mod error;
pub mod types;
pub mod dataset;
pub mod difference;
pub mod var;
pub mod forecast;
pub mod scenario;
pub mod landed;
pub mod batch;
pub mod hrc;

#[cfg(feature = "python")]
mod python;

pub use batch::{batch_forecast, batch_forecast_datasets};
pub use dataset::{HistoricalDataset, LevelTable, Observation};
pub use error::{ForecastError, Result};
pub use forecast::{forecast_levels, forecast_path, forecast_pipeline, LagWindow, LevelForecast};
pub use landed::{LandedBand, LandedCostBreakdown, LandedCostParams};
pub use scenario::{scenario_bands, Adjustment, CombinationPolicy, ScenarioAdjustments, ScenarioBand};
pub use types::{
    FitSummary, ForecastConfig, ForecastRequest, ForecastRow, ForecastTable, MissingPolicy,
};
pub use var::{fit_var, VarCoefficients};
