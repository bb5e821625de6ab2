//! Upside/downside scenario bands around a central forecast.
//!
//! Adjustments are percentages, either a single up/down pair or a list of
//! named driver components. How several components combine into one band is
//! an explicit [`CombinationPolicy`]:
//!
//! - `SumThenScale { denominator }`: each side is summed, divided by the
//!   denominator, and applied once: `c * (1 + total/100)`.
//! - `SequentialCompound`: each nonzero component is applied on top of the
//!   previous result: `c * Π(1 + up_i/100)`, `c * Π(1 - down_i/100)`.

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::hrc;

/// Largest accepted single percentage.
pub const DEFAULT_MAX_ADJUSTMENT_PCT: f64 = 100.0;

/// Rule for combining several named percentages into one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum CombinationPolicy {
    SumThenScale { denominator: f64 },
    SequentialCompound,
}

impl Default for CombinationPolicy {
    /// Equal-weight average over the standard scenario drivers.
    fn default() -> Self {
        CombinationPolicy::SumThenScale {
            denominator: hrc::SCENARIO_DRIVERS.len() as f64,
        }
    }
}

/// One named driver's upside and downside percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub name: String,
    pub up_pct: f64,
    pub down_pct: f64,
}

impl Adjustment {
    pub fn new(name: impl Into<String>, up_pct: f64, down_pct: f64) -> Self {
        Self {
            name: name.into(),
            up_pct,
            down_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioAdjustments {
    pub components: Vec<Adjustment>,
    pub policy: CombinationPolicy,
    pub max_pct: f64,
}

impl Default for ScenarioAdjustments {
    /// No adjustment: bands collapse onto the central forecast.
    fn default() -> Self {
        Self {
            components: Vec::new(),
            policy: CombinationPolicy::default(),
            max_pct: DEFAULT_MAX_ADJUSTMENT_PCT,
        }
    }
}

impl ScenarioAdjustments {
    /// A single up/down pair applied as-is.
    pub fn uniform(up_pct: f64, down_pct: f64) -> Self {
        Self {
            components: vec![Adjustment::new("total", up_pct, down_pct)],
            policy: CombinationPolicy::SumThenScale { denominator: 1.0 },
            max_pct: DEFAULT_MAX_ADJUSTMENT_PCT,
        }
    }

    pub fn named(components: Vec<Adjustment>, policy: CombinationPolicy) -> Self {
        Self {
            components,
            policy,
            max_pct: DEFAULT_MAX_ADJUSTMENT_PCT,
        }
    }

    pub fn with_max_pct(mut self, max_pct: f64) -> Self {
        self.max_pct = max_pct;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.multipliers().map(|_| ())
    }

    /// (upper, lower) multipliers applied to every central value.
    pub fn multipliers(&self) -> Result<(f64, f64)> {
        if !(self.max_pct.is_finite() && self.max_pct >= 0.0) {
            return Err(ForecastError::InvalidAdjustment {
                name: "max_pct".into(),
                value: self.max_pct,
                reason: "must be finite and non-negative".into(),
            });
        }
        for c in &self.components {
            check_pct(&c.name, "up", c.up_pct, self.max_pct)?;
            check_pct(&c.name, "down", c.down_pct, self.max_pct)?;
        }

        let (upper, lower) = match self.policy {
            CombinationPolicy::SumThenScale { denominator } => {
                if !(denominator.is_finite() && denominator > 0.0) {
                    return Err(ForecastError::InvalidAdjustment {
                        name: "denominator".into(),
                        value: denominator,
                        reason: "must be finite and positive".into(),
                    });
                }
                let up: f64 = self.components.iter().map(|c| c.up_pct).sum();
                let down: f64 = self.components.iter().map(|c| c.down_pct).sum();
                (
                    1.0 + up / denominator / 100.0,
                    1.0 - down / denominator / 100.0,
                )
            }
            CombinationPolicy::SequentialCompound => self
                .components
                .iter()
                .fold((1.0, 1.0), |(upper, lower), c| {
                    let upper = if c.up_pct != 0.0 {
                        upper * (1.0 + c.up_pct / 100.0)
                    } else {
                        upper
                    };
                    let lower = if c.down_pct != 0.0 {
                        lower * (1.0 - c.down_pct / 100.0)
                    } else {
                        lower
                    };
                    (upper, lower)
                }),
        };

        if lower < 0.0 {
            return Err(ForecastError::InvalidAdjustment {
                name: "total_down".into(),
                value: (1.0 - lower) * 100.0,
                reason: "combined downside exceeds 100%".into(),
            });
        }
        Ok((upper, lower))
    }
}

fn check_pct(name: &str, side: &str, value: f64, max: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 || value > max {
        return Err(ForecastError::InvalidAdjustment {
            name: format!("{} ({})", name, side),
            value,
            reason: format!("must be within [0, {}]", max),
        });
    }
    Ok(())
}

/// Central forecast with its upper and lower scenario bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioBand {
    pub central: f64,
    pub upper: f64,
    pub lower: f64,
}

/// Apply the adjustments to every central value.
pub fn scenario_bands(central: &[f64], adjustments: &ScenarioAdjustments) -> Result<Vec<ScenarioBand>> {
    let (up, down) = adjustments.multipliers()?;
    Ok(central
        .iter()
        .map(|&c| ScenarioBand {
            central: c,
            upper: c * up,
            lower: c * down,
        })
        .collect())
}
