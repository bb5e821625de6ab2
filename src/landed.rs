//! FOB to landed local-currency price conversion.
//!
//! The chain is order-sensitive: each step compounds on the cumulative value
//! of the previous one, not on the original FOB price.

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::scenario::ScenarioBand;

/// Per-call cost constants. Rates are in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandedCostParams {
    /// Sea freight per unit, in the FOB currency.
    pub sea_freight: f64,
    /// Percent of CFR.
    pub insurance_pct: f64,
    /// Percent of CIF.
    pub customs_duty_pct: f64,
    /// Percent of the customs amount.
    pub surcharge_pct: f64,
    /// Flat per-unit charge added at port, in the FOB currency.
    pub flat_charge: f64,
    /// Percent of the pre-safeguard landed value.
    pub safeguard_duty_pct: f64,
    /// Local currency per unit of FOB currency.
    pub exchange_rate: f64,
    /// Flat inland freight, in local currency.
    pub inland_freight: f64,
}

impl Default for LandedCostParams {
    fn default() -> Self {
        Self {
            sea_freight: 30.0,
            insurance_pct: 1.0,
            customs_duty_pct: 7.5,
            surcharge_pct: 10.0,
            flat_charge: 0.0,
            safeguard_duty_pct: 0.0,
            exchange_rate: 86.0,
            inland_freight: 0.0,
        }
    }
}

/// Every intermediate of the conversion for one FOB price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandedCostBreakdown {
    pub fob: f64,
    pub cfr: f64,
    pub insurance: f64,
    pub cif: f64,
    pub customs: f64,
    pub surcharge: f64,
    pub landed_value: f64,
    pub safeguard: f64,
    pub port_price: f64,
    pub local_price: f64,
}

/// Landed local prices for a scenario band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandedBand {
    pub central: f64,
    pub upper: f64,
    pub lower: f64,
}

impl LandedCostParams {
    pub fn with_exchange_rate(mut self, exchange_rate: f64) -> Self {
        self.exchange_rate = exchange_rate;
        self
    }

    pub fn with_sea_freight(mut self, sea_freight: f64) -> Self {
        self.sea_freight = sea_freight;
        self
    }

    pub fn with_safeguard_duty(mut self, pct: f64) -> Self {
        self.safeguard_duty_pct = pct;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("sea_freight", self.sea_freight),
            ("insurance_pct", self.insurance_pct),
            ("customs_duty_pct", self.customs_duty_pct),
            ("surcharge_pct", self.surcharge_pct),
            ("flat_charge", self.flat_charge),
            ("safeguard_duty_pct", self.safeguard_duty_pct),
            ("inland_freight", self.inland_freight),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ForecastError::InvalidAdjustment {
                    name: name.into(),
                    value,
                    reason: "must be finite and non-negative".into(),
                });
            }
        }
        if !(self.exchange_rate.is_finite() && self.exchange_rate > 0.0) {
            return Err(ForecastError::InvalidAdjustment {
                name: "exchange_rate".into(),
                value: self.exchange_rate,
                reason: "must be finite and positive".into(),
            });
        }
        Ok(())
    }

    /// Run the full chain for one FOB price.
    pub fn convert(&self, fob: f64) -> Result<LandedCostBreakdown> {
        self.validate()?;
        if !fob.is_finite() {
            return Err(ForecastError::DataError(format!(
                "FOB price must be finite, got {}",
                fob
            )));
        }
        Ok(self.chain(fob))
    }

    /// Local price for one FOB price.
    pub fn local_price(&self, fob: f64) -> Result<f64> {
        self.convert(fob).map(|b| b.local_price)
    }

    /// Local prices for a whole FOB series.
    pub fn convert_series(&self, fob: &[f64]) -> Result<Vec<f64>> {
        fob.iter().map(|&p| self.local_price(p)).collect()
    }

    pub fn convert_band(&self, band: &ScenarioBand) -> Result<LandedBand> {
        Ok(LandedBand {
            central: self.local_price(band.central)?,
            upper: self.local_price(band.upper)?,
            lower: self.local_price(band.lower)?,
        })
    }

    fn chain(&self, fob: f64) -> LandedCostBreakdown {
        let cfr = fob + self.sea_freight;
        let insurance = self.insurance_pct / 100.0 * cfr;
        let cif = cfr + insurance;
        let customs = self.customs_duty_pct / 100.0 * cif;
        let surcharge = self.surcharge_pct / 100.0 * customs;
        let landed_value = cif + customs + surcharge;
        let safeguard = self.safeguard_duty_pct / 100.0 * landed_value;
        let port_price = landed_value + self.flat_charge + safeguard;
        let local_price = port_price * self.exchange_rate + self.inland_freight;

        LandedCostBreakdown {
            fob,
            cfr,
            insurance,
            cif,
            customs,
            surcharge,
            landed_value,
            safeguard,
            port_price,
            local_price,
        }
    }
}
