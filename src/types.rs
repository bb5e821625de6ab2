use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::landed::{LandedBand, LandedCostParams};
use crate::scenario::ScenarioAdjustments;

/// Lag order used by the main deployment.
pub const DEFAULT_LAG_ORDER: usize = 4;

/// Upper bound on the number of forecast steps.
pub const DEFAULT_MAX_HORIZON: usize = 24;

/// Largest design-matrix condition number accepted by the fitter.
pub const DEFAULT_MAX_CONDITION_NUMBER: f64 = 1e10;

/// What to do with historical rows that have a missing value in a selected column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Drop the whole row before differencing.
    #[default]
    DropRows,
    /// Fail with `MissingData`.
    Reject,
}

/// Model configuration shared by every request in a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub lag_order: usize,
    pub max_horizon: usize,
    pub max_condition_number: f64,
    pub missing_policy: MissingPolicy,
}

impl ForecastConfig {
    pub fn new(lag_order: usize) -> Self {
        Self {
            lag_order,
            ..Self::default()
        }
    }

    pub fn with_max_horizon(mut self, max_horizon: usize) -> Self {
        self.max_horizon = max_horizon;
        self
    }

    pub fn with_missing_policy(mut self, policy: MissingPolicy) -> Self {
        self.missing_policy = policy;
        self
    }

    pub fn with_max_condition_number(mut self, max_condition_number: f64) -> Self {
        self.max_condition_number = max_condition_number;
        self
    }

    /// Check a caller-supplied horizon against `1..=max_horizon`.
    pub fn validate_horizon(&self, requested: i64) -> Result<usize> {
        validate_horizon(requested, self.max_horizon)
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lag_order: DEFAULT_LAG_ORDER,
            max_horizon: DEFAULT_MAX_HORIZON,
            max_condition_number: DEFAULT_MAX_CONDITION_NUMBER,
            missing_policy: MissingPolicy::DropRows,
        }
    }
}

pub(crate) fn validate_horizon(requested: i64, max: usize) -> Result<usize> {
    match usize::try_from(requested) {
        Ok(h) if h >= 1 && h <= max => Ok(h),
        _ => Err(ForecastError::InvalidHorizon { requested, max }),
    }
}

/// One forecast call: which columns to model, how far ahead, and the
/// post-processing to apply to the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub target: String,
    pub drivers: Vec<String>,
    #[serde(default)]
    pub config: ForecastConfig,
    pub horizon: usize,
    #[serde(default)]
    pub adjustments: ScenarioAdjustments,
    #[serde(default)]
    pub landed: Option<LandedCostParams>,
}

impl ForecastRequest {
    pub fn new(target: impl Into<String>, drivers: Vec<String>, horizon: usize) -> Self {
        Self {
            target: target.into(),
            drivers,
            config: ForecastConfig::default(),
            horizon,
            adjustments: ScenarioAdjustments::default(),
            landed: None,
        }
    }

    pub fn with_config(mut self, config: ForecastConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_adjustments(mut self, adjustments: ScenarioAdjustments) -> Self {
        self.adjustments = adjustments;
        self
    }

    pub fn with_landed_cost(mut self, params: LandedCostParams) -> Self {
        self.landed = Some(params);
        self
    }

    /// Modelled columns, target first.
    pub fn columns(&self) -> Vec<String> {
        std::iter::once(self.target.clone())
            .chain(self.drivers.iter().cloned())
            .collect()
    }
}

/// Diagnostics of the fit behind a forecast table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub lag_order: usize,
    pub n_vars: usize,
    /// Regression rows used by OLS (differenced rows minus the lag order).
    pub n_obs: usize,
    pub condition_number: f64,
    /// Historical rows with a missing value under `MissingPolicy::DropRows`.
    pub rows_dropped: usize,
    /// Differences excluded from the fit because they touch such a row.
    pub differences_dropped: usize,
}

/// One forecast month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub central: f64,
    pub upper: f64,
    pub lower: f64,
    pub landed: Option<LandedBand>,
    /// Reconstructed levels of every modelled column, target first.
    pub levels: Vec<f64>,
}

/// Output of the forecasting pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastTable {
    pub target: String,
    pub columns: Vec<String>,
    pub rows: Vec<ForecastRow>,
    pub fit: FitSummary,
}

impl ForecastTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    pub fn central(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.central).collect()
    }

    pub fn upper(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.upper).collect()
    }

    pub fn lower(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.lower).collect()
    }

    /// Reconstructed level path of a modelled column, if present.
    pub fn column_levels(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r.levels[idx]).collect())
    }
}
