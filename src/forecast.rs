use std::collections::VecDeque;

use chrono::Months;
use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, warn};

use crate::dataset::HistoricalDataset;
use crate::difference::{difference_complete, reconstruct};
use crate::error::{ForecastError, Result};
use crate::scenario::scenario_bands;
use crate::types::{
    validate_horizon, FitSummary, ForecastConfig, ForecastRequest, ForecastRow, ForecastTable,
};
use crate::var::{fit_var, VarCoefficients};

/// The p most recent differenced vectors, oldest first.
///
/// Pushing a new vector drops the oldest one, so the window always holds
/// exactly `lag_order` vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct LagWindow {
    slots: VecDeque<DVector<f64>>,
}

impl LagWindow {
    /// Seed from the last `lag_order` rows of a differenced table.
    pub fn from_history(diffs: &DMatrix<f64>, lag_order: usize) -> Result<Self> {
        if lag_order == 0 {
            return Err(ForecastError::InvalidLagOrder(lag_order));
        }
        let n = diffs.nrows();
        if n < lag_order {
            return Err(ForecastError::DataError(format!(
                "seeding a lag-{} window needs {} differenced rows, got {}",
                lag_order, lag_order, n
            )));
        }
        let slots = (n - lag_order..n).map(|t| diffs.row(t).transpose()).collect();
        Ok(Self { slots })
    }

    pub fn lag_order(&self) -> usize {
        self.slots.len()
    }

    /// Vector `lag` steps back; 1 is the most recent.
    pub fn lag(&self, lag: usize) -> Option<&DVector<f64>> {
        if lag == 0 {
            return None;
        }
        self.slots
            .len()
            .checked_sub(lag)
            .and_then(|i| self.slots.get(i))
    }

    pub fn push(&mut self, next: DVector<f64>) {
        self.slots.pop_front();
        self.slots.push_back(next);
    }
}

/// Next differenced vector: c + Σ A_i * window[i steps back].
fn step(coefficients: &VarCoefficients, window: &LagWindow) -> Result<DVector<f64>> {
    let mut next = coefficients.intercept().clone();
    for (i, a) in coefficients.lags().iter().enumerate() {
        let recent = window.lag(i + 1).ok_or_else(|| {
            ForecastError::DataError(format!(
                "window holds {} vectors, lag {} requested",
                window.lag_order(),
                i + 1
            ))
        })?;
        next += a * recent;
    }
    Ok(next)
}

/// Project the differenced series `steps` months ahead.
///
/// The window is seeded with the last p rows of `history`; every forecast is
/// fed back as the newest lag for the following step. Row h of the output is
/// the forecast difference for month h + 1.
pub fn forecast_path(
    coefficients: &VarCoefficients,
    history: &DMatrix<f64>,
    steps: usize,
    max_horizon: usize,
) -> Result<DMatrix<f64>> {
    let steps = validate_horizon(i64::try_from(steps).unwrap_or(i64::MAX), max_horizon)?;

    let k = coefficients.n_vars();
    if history.ncols() != k {
        return Err(ForecastError::DataError(format!(
            "history has {} columns but the model has {} variables",
            history.ncols(),
            k
        )));
    }

    let mut window = LagWindow::from_history(history, coefficients.lag_order())?;
    let mut path = DMatrix::zeros(steps, k);

    for h in 0..steps {
        let next = step(coefficients, &window)?;
        path.set_row(h, &next.transpose());
        window.push(next);
    }

    Ok(path)
}

/// Fit and forecast on a level table, before any scenario post-processing.
#[derive(Debug, Clone)]
pub struct LevelForecast {
    pub coefficients: VarCoefficients,
    /// h × k forecast differences.
    pub differences: DMatrix<f64>,
    /// h × k reconstructed levels.
    pub levels: DMatrix<f64>,
    /// Input row whose levels seed the reconstruction (the last complete one).
    pub anchor_row: usize,
    /// Difference rows left out of the fit because an endpoint was missing.
    pub differences_dropped: usize,
}

/// Difference, fit, forecast and reconstruct a monthly level table (n × k).
///
/// NaN marks a missing level. Differences touching a missing level are
/// dropped before fitting; the forecast starts from the last complete row.
pub fn forecast_levels(
    levels: &DMatrix<f64>,
    config: &ForecastConfig,
    steps: usize,
) -> Result<LevelForecast> {
    let (diffs, differences_dropped) = difference_complete(levels)?;
    let coefficients = fit_var(&diffs, config.lag_order, config.max_condition_number)?;
    let differences = forecast_path(&coefficients, &diffs, steps, config.max_horizon)?;

    let anchor_row = (0..levels.nrows())
        .rev()
        .find(|&t| levels.row(t).iter().all(|v| v.is_finite()))
        .ok_or_else(|| ForecastError::InsufficientHistory("no complete historical rows".into()))?;
    let reconstructed = reconstruct(&differences, &levels.row(anchor_row).transpose())?;

    Ok(LevelForecast {
        coefficients,
        differences,
        levels: reconstructed,
        anchor_row,
        differences_dropped,
    })
}

/// Run the full pipeline for one request:
/// select → difference → fit → forecast → reconstruct → bands → landed cost.
pub fn forecast_pipeline(
    dataset: &HistoricalDataset,
    request: &ForecastRequest,
) -> Result<ForecastTable> {
    let config = &request.config;
    let horizon = validate_horizon(
        i64::try_from(request.horizon).unwrap_or(i64::MAX),
        config.max_horizon,
    )?;
    request.adjustments.validate()?;
    if let Some(landed) = &request.landed {
        landed.validate()?;
    }

    let columns = request.columns();
    let table = dataset.select(&columns, config.missing_policy)?;

    let fc = forecast_levels(&table.values, config, horizon)?;
    if fc.differences_dropped > 0 {
        warn!(
            incomplete_rows = table.incomplete_rows,
            differences_dropped = fc.differences_dropped,
            "dropped differences touching months with missing values"
        );
    }
    let last_date = table.dates.get(fc.anchor_row).copied().ok_or_else(|| {
        ForecastError::DataError(format!("no date for history row {}", fc.anchor_row))
    })?;
    debug!(
        condition_number = fc.coefficients.condition_number(),
        n_obs = fc.coefficients.n_obs(),
        "VAR fitted"
    );

    let central: Vec<f64> = fc.levels.column(0).iter().copied().collect();
    let bands = scenario_bands(&central, &request.adjustments)?;

    let mut rows = Vec::with_capacity(horizon);
    for (h, band) in bands.iter().enumerate() {
        let date = last_date
            .checked_add_months(Months::new(h as u32 + 1))
            .ok_or_else(|| {
                ForecastError::DataError(format!("forecast date overflow after {}", last_date))
            })?;
        let landed = match &request.landed {
            Some(params) => Some(params.convert_band(band)?),
            None => None,
        };
        rows.push(ForecastRow {
            date,
            central: band.central,
            upper: band.upper,
            lower: band.lower,
            landed,
            levels: fc.levels.row(h).iter().copied().collect(),
        });
    }

    info!(
        target_column = %request.target,
        horizon,
        lag_order = config.lag_order,
        n_vars = columns.len(),
        "forecast complete"
    );

    Ok(ForecastTable {
        target: request.target.clone(),
        columns,
        rows,
        fit: FitSummary {
            lag_order: fc.coefficients.lag_order(),
            n_vars: fc.coefficients.n_vars(),
            n_obs: fc.coefficients.n_obs(),
            condition_number: fc.coefficients.condition_number(),
            rows_dropped: table.incomplete_rows,
            differences_dropped: fc.differences_dropped,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Observation;
    use crate::landed::LandedCostParams;
    use crate::scenario::ScenarioAdjustments;
    use chrono::NaiveDate;

    fn month(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn univariate() -> HistoricalDataset {
        let levels = [100.0, 102.0, 101.0, 105.0];
        HistoricalDataset::new(
            vec!["hrc".into()],
            levels
                .iter()
                .enumerate()
                .map(|(i, &v)| Observation::complete(month(2024, i as u32 + 1), &[v]))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_lag_window_slides() {
        let diffs = DMatrix::from_row_slice(3, 1, &[1.0, 2.0, 3.0]);
        let mut w = LagWindow::from_history(&diffs, 2).unwrap();
        assert_eq!(w.lag_order(), 2);
        assert_eq!(w.lag(1).unwrap()[0], 3.0);
        assert_eq!(w.lag(2).unwrap()[0], 2.0);
        assert!(w.lag(0).is_none());
        assert!(w.lag(3).is_none());

        w.push(DVector::from_vec(vec![4.0]));
        assert_eq!(w.lag_order(), 2);
        assert_eq!(w.lag(1).unwrap()[0], 4.0);
        assert_eq!(w.lag(2).unwrap()[0], 3.0);
    }

    #[test]
    fn test_lag_window_needs_history() {
        let diffs = DMatrix::from_row_slice(1, 1, &[1.0]);
        assert!(matches!(
            LagWindow::from_history(&diffs, 2),
            Err(ForecastError::DataError(_))
        ));
    }

    #[test]
    fn test_recursive_two_steps() {
        // Fit on [2, -1, 4]: c = 7/3, a = -5/3.
        let levels = DMatrix::from_row_slice(4, 1, &[100.0, 102.0, 101.0, 105.0]);
        let fc = forecast_levels(&levels, &ForecastConfig::new(1), 2).unwrap();

        let d1: f64 = 7.0 / 3.0 - 5.0 / 3.0 * 4.0;
        let d2 = 7.0 / 3.0 - 5.0 / 3.0 * d1;
        assert!((d1 + 13.0 / 3.0).abs() < 1e-12);
        assert!((fc.differences[(0, 0)] - d1).abs() < 1e-9);
        assert!((fc.differences[(1, 0)] - d2).abs() < 1e-9);
        assert!((fc.levels[(0, 0)] - (105.0 + d1)).abs() < 1e-9);
        assert!((fc.levels[(1, 0)] - (105.0 + d1 + d2)).abs() < 1e-9);
    }

    #[test]
    fn test_forecast_feeds_back_predictions() {
        // y_t = 1 + 0.5 y_{t-1} + 0.25 y_{t-2}
        let coefs = VarCoefficients::new(
            DVector::from_vec(vec![1.0]),
            vec![
                DMatrix::from_row_slice(1, 1, &[0.5]),
                DMatrix::from_row_slice(1, 1, &[0.25]),
            ],
        )
        .unwrap();
        let history = DMatrix::from_row_slice(3, 1, &[9.0, 2.0, 4.0]);
        let path = forecast_path(&coefs, &history, 3, 24).unwrap();

        let f1 = 1.0 + 0.5 * 4.0 + 0.25 * 2.0;
        let f2 = 1.0 + 0.5 * f1 + 0.25 * 4.0;
        let f3 = 1.0 + 0.5 * f2 + 0.25 * f1;
        assert!((path[(0, 0)] - f1).abs() < 1e-12);
        assert!((path[(1, 0)] - f2).abs() < 1e-12);
        assert!((path[(2, 0)] - f3).abs() < 1e-12);
    }

    #[test]
    fn test_forecast_bivariate_cross_terms() {
        let coefs = VarCoefficients::new(
            DVector::from_vec(vec![0.0, 1.0]),
            vec![DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.5, 0.0])],
        )
        .unwrap();
        let history = DMatrix::from_row_slice(1, 2, &[2.0, 3.0]);
        let path = forecast_path(&coefs, &history, 2, 24).unwrap();
        // step 1: [3, 1 + 1] ; step 2: [2, 1 + 1.5]
        assert_eq!(path.row(0).iter().copied().collect::<Vec<_>>(), vec![3.0, 2.0]);
        assert_eq!(path.row(1).iter().copied().collect::<Vec<_>>(), vec![2.0, 2.5]);
    }

    #[test]
    fn test_forecast_horizon_bounds() {
        let coefs = VarCoefficients::new(
            DVector::from_vec(vec![0.0]),
            vec![DMatrix::from_row_slice(1, 1, &[0.5])],
        )
        .unwrap();
        let history = DMatrix::from_row_slice(2, 1, &[1.0, 2.0]);
        assert!(matches!(
            forecast_path(&coefs, &history, 0, 24),
            Err(ForecastError::InvalidHorizon { requested: 0, max: 24 })
        ));
        assert!(matches!(
            forecast_path(&coefs, &history, 25, 24),
            Err(ForecastError::InvalidHorizon { requested: 25, .. })
        ));
    }

    #[test]
    fn test_forecast_column_mismatch() {
        let coefs = VarCoefficients::new(
            DVector::from_vec(vec![0.0]),
            vec![DMatrix::from_row_slice(1, 1, &[0.5])],
        )
        .unwrap();
        let history = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        assert!(matches!(
            forecast_path(&coefs, &history, 3, 24),
            Err(ForecastError::DataError(_))
        ));
    }

    #[test]
    fn test_pipeline_univariate_dates_and_levels() {
        let request = ForecastRequest::new("hrc", vec![], 2)
            .with_config(ForecastConfig::new(1))
            .with_adjustments(ScenarioAdjustments::uniform(10.0, 10.0));
        let table = forecast_pipeline(&univariate(), &request).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.dates(), vec![month(2024, 5), month(2024, 6)]);
        let l5 = 105.0 - 13.0 / 3.0;
        let l6 = l5 + 86.0 / 9.0;
        assert!((table.rows[0].central - l5).abs() < 1e-9);
        assert!((table.rows[1].central - l6).abs() < 1e-9);
        assert!((table.rows[0].upper - l5 * 1.1).abs() < 1e-9);
        assert!((table.rows[0].lower - l5 * 0.9).abs() < 1e-9);
        assert!(table.rows[0].landed.is_none());
        assert_eq!(table.fit.lag_order, 1);
        assert_eq!(table.fit.n_obs, 2);
        assert_eq!(table.column_levels("hrc").unwrap(), table.central());
    }

    #[test]
    fn test_pipeline_with_landed_cost() {
        let request = ForecastRequest::new("hrc", vec![], 2)
            .with_config(ForecastConfig::new(1))
            .with_landed_cost(LandedCostParams::default());
        let table = forecast_pipeline(&univariate(), &request).unwrap();
        let landed = table.rows[0].landed.unwrap();
        let expected = LandedCostParams::default()
            .local_price(table.rows[0].central)
            .unwrap();
        assert_eq!(landed.central, expected);
    }

    #[test]
    fn test_pipeline_rejects_zero_horizon() {
        let request = ForecastRequest::new("hrc", vec![], 0).with_config(ForecastConfig::new(1));
        assert!(matches!(
            forecast_pipeline(&univariate(), &request),
            Err(ForecastError::InvalidHorizon { requested: 0, .. })
        ));
    }

    #[test]
    fn test_pipeline_lag_order_exceeds_rows() {
        let request = ForecastRequest::new("hrc", vec![], 3).with_config(ForecastConfig::new(4));
        assert!(matches!(
            forecast_pipeline(&univariate(), &request),
            Err(ForecastError::InsufficientHistory(_))
        ));
    }

    #[test]
    fn test_pipeline_rejects_bad_adjustment_before_fitting() {
        // Lag order 9 would fail the fit; the adjustment error must surface first.
        let request = ForecastRequest::new("hrc", vec![], 3)
            .with_config(ForecastConfig::new(9))
            .with_adjustments(ScenarioAdjustments::uniform(-5.0, 0.0));
        assert!(matches!(
            forecast_pipeline(&univariate(), &request),
            Err(ForecastError::InvalidAdjustment { .. })
        ));
    }

    #[test]
    fn test_pipeline_year_rollover() {
        let levels = [500.0, 510.0, 505.0, 515.0, 512.0];
        let ds = HistoricalDataset::new(
            vec!["hrc".into()],
            levels
                .iter()
                .enumerate()
                .map(|(i, &v)| Observation::complete(month(2024, 8 + i as u32), &[v]))
                .collect(),
        )
        .unwrap();
        let request = ForecastRequest::new("hrc", vec![], 3).with_config(ForecastConfig::new(1));
        let table = forecast_pipeline(&ds, &request).unwrap();
        assert_eq!(
            table.dates(),
            vec![month(2025, 1), month(2025, 2), month(2025, 3)]
        );
    }

    fn with_missing_driver() -> HistoricalDataset {
        let hrc = [500.0, 508.0, 503.0, 515.0, 512.0, 520.0, 531.0, 526.0, 538.0, 545.0];
        let ore = [100.0, 103.0, 0.0, 104.0, 107.0, 105.0, 110.0, 108.0, 113.0, 116.0];
        HistoricalDataset::new(
            vec!["hrc".into(), "ore".into()],
            (0..10)
                .map(|i| {
                    let ore = if i == 2 { None } else { Some(ore[i]) };
                    Observation::new(month(2024, i as u32 + 1), vec![Some(hrc[i]), ore])
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_month_is_not_bridged() {
        let ds = with_missing_driver();
        let request = ForecastRequest::new("hrc", vec!["ore".into()], 2)
            .with_config(ForecastConfig::new(1));
        let table = forecast_pipeline(&ds, &request).unwrap();

        // 9 adjacent pairs, the two touching March are dropped, 1 lag.
        assert_eq!(table.fit.rows_dropped, 1);
        assert_eq!(table.fit.differences_dropped, 2);
        assert_eq!(table.fit.n_obs, 6);
        assert_eq!(table.dates()[0], month(2024, 11));

        // Same fit as on the differences of adjacent complete months only.
        let adjacent = DMatrix::from_row_slice(
            7,
            2,
            &[
                8.0, 3.0, // Feb - Jan
                -3.0, 3.0, // May - Apr
                8.0, -2.0, // Jun - May
                11.0, 5.0, // Jul - Jun
                -5.0, -2.0, // Aug - Jul
                12.0, 5.0, // Sep - Aug
                7.0, 3.0, // Oct - Sep
            ],
        );
        let expected = fit_var(&adjacent, 1, 1e10).unwrap();
        let path = forecast_path(&expected, &adjacent, 2, 24).unwrap();
        assert!((table.rows[0].central - (545.0 + path[(0, 0)])).abs() < 1e-9);
        assert!((table.rows[1].central - (545.0 + path[(0, 0)] + path[(1, 0)])).abs() < 1e-9);
    }

    #[test]
    fn test_trailing_missing_month_anchors_on_last_complete_row() {
        let levels = DMatrix::from_row_slice(
            6,
            1,
            &[100.0, 102.0, 101.0, 105.0, 104.0, f64::NAN],
        );
        let fc = forecast_levels(&levels, &ForecastConfig::new(1), 1).unwrap();
        assert_eq!(fc.anchor_row, 4);
        assert_eq!(fc.differences_dropped, 1);
        assert!((fc.levels[(0, 0)] - (104.0 + fc.differences[(0, 0)])).abs() < 1e-12);
    }

    #[test]
    fn test_pipeline_deterministic() {
        let request = ForecastRequest::new("hrc", vec![], 4)
            .with_config(ForecastConfig::new(1))
            .with_adjustments(ScenarioAdjustments::uniform(3.0, 2.0));
        let a = forecast_pipeline(&univariate(), &request).unwrap();
        let b = forecast_pipeline(&univariate(), &request).unwrap();
        assert_eq!(a, b);
    }
}
