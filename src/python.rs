use chrono::NaiveDate;
use numpy::PyReadonlyArray2;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::dataset::{HistoricalDataset, Observation};
use crate::error::ForecastError;
use crate::forecast::forecast_pipeline;
use crate::landed::LandedCostParams;
use crate::scenario::{Adjustment, CombinationPolicy, ScenarioAdjustments};
use crate::types::{ForecastConfig, ForecastRequest, MissingPolicy};

fn value_error(e: ForecastError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_policy(policy: &str, denominator: Option<f64>) -> PyResult<CombinationPolicy> {
    match policy {
        "average" => Ok(denominator
            .map(|denominator| CombinationPolicy::SumThenScale { denominator })
            .unwrap_or_default()),
        "compound" => Ok(CombinationPolicy::SequentialCompound),
        other => Err(PyValueError::new_err(format!(
            "unknown combination policy '{}', expected 'average' or 'compound'",
            other
        ))),
    }
}

/// Smoke-test function: returns the version string.
#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Fit a VAR on the history and forecast the target column.
///
/// `values` is a (rows × columns) float array aligned with `dates`
/// ("YYYY-MM-DD") and `columns`; NaN marks a missing value. `adjustments`
/// is a list of (name, up_pct, down_pct). Landed prices are added when
/// `exchange_rate` is given.
///
/// Returns a dict of lists: date, central, upper, lower and, with landed
/// cost, landed_central, landed_upper, landed_lower.
#[pyfunction]
#[pyo3(signature = (dates, columns, values, target, drivers, lag_order=4, steps=6,
                    max_horizon=24, adjustments=None, policy="average", denominator=None,
                    drop_missing=true, exchange_rate=None, sea_freight=30.0,
                    insurance_pct=1.0, customs_duty_pct=7.5, surcharge_pct=10.0,
                    flat_charge=0.0, safeguard_duty_pct=0.0, inland_freight=0.0))]
fn var_forecast<'py>(
    py: Python<'py>,
    dates: Vec<String>,
    columns: Vec<String>,
    values: PyReadonlyArray2<'py, f64>,
    target: String,
    drivers: Vec<String>,
    lag_order: usize,
    steps: i64,
    max_horizon: usize,
    adjustments: Option<Vec<(String, f64, f64)>>,
    policy: &str,
    denominator: Option<f64>,
    drop_missing: bool,
    exchange_rate: Option<f64>,
    sea_freight: f64,
    insurance_pct: f64,
    customs_duty_pct: f64,
    surcharge_pct: f64,
    flat_charge: f64,
    safeguard_duty_pct: f64,
    inland_freight: f64,
) -> PyResult<Py<PyDict>> {
    let missing_policy = if drop_missing {
        MissingPolicy::DropRows
    } else {
        MissingPolicy::Reject
    };
    let config = ForecastConfig::new(lag_order)
        .with_max_horizon(max_horizon)
        .with_missing_policy(missing_policy);
    let horizon = config.validate_horizon(steps).map_err(value_error)?;

    let array = values.as_array();
    let (n_rows, n_cols) = array.dim();
    if n_rows != dates.len() || n_cols != columns.len() {
        return Err(PyValueError::new_err(format!(
            "values has shape ({}, {}) but there are {} dates and {} columns",
            n_rows,
            n_cols,
            dates.len(),
            columns.len()
        )));
    }

    let mut observations = Vec::with_capacity(n_rows);
    for (t, raw) in dates.iter().enumerate() {
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
            PyValueError::new_err(format!("invalid date '{}': {}", raw, e))
        })?;
        let row = (0..n_cols)
            .map(|j| Some(array[[t, j]]).filter(|v| v.is_finite()))
            .collect();
        observations.push(Observation::new(date, row));
    }
    let dataset = HistoricalDataset::new(columns, observations).map_err(value_error)?;

    let mut request = ForecastRequest::new(target, drivers, horizon).with_config(config);
    if let Some(adjustments) = adjustments {
        let components = adjustments
            .into_iter()
            .map(|(name, up, down)| Adjustment::new(name, up, down))
            .collect();
        request = request.with_adjustments(ScenarioAdjustments::named(
            components,
            parse_policy(policy, denominator)?,
        ));
    }
    if let Some(exchange_rate) = exchange_rate {
        request = request.with_landed_cost(LandedCostParams {
            sea_freight,
            insurance_pct,
            customs_duty_pct,
            surcharge_pct,
            flat_charge,
            safeguard_duty_pct,
            exchange_rate,
            inland_freight,
        });
    }

    let table = py
        .allow_threads(|| forecast_pipeline(&dataset, &request))
        .map_err(value_error)?;

    let dict = PyDict::new(py);
    let date_strings: Vec<String> = table.dates().iter().map(|d| d.to_string()).collect();
    dict.set_item("date", date_strings)?;
    dict.set_item("central", table.central())?;
    dict.set_item("upper", table.upper())?;
    dict.set_item("lower", table.lower())?;
    if request.landed.is_some() {
        let landed: Vec<_> = table.rows.iter().filter_map(|r| r.landed).collect();
        dict.set_item("landed_central", landed.iter().map(|b| b.central).collect::<Vec<_>>())?;
        dict.set_item("landed_upper", landed.iter().map(|b| b.upper).collect::<Vec<_>>())?;
        dict.set_item("landed_lower", landed.iter().map(|b| b.lower).collect::<Vec<_>>())?;
    }
    dict.set_item("lag_order", table.fit.lag_order)?;
    dict.set_item("n_obs", table.fit.n_obs)?;
    dict.set_item("condition_number", table.fit.condition_number)?;
    dict.set_item("rows_dropped", table.fit.rows_dropped)?;
    dict.set_item("differences_dropped", table.fit.differences_dropped)?;

    Ok(dict.into())
}

/// Convert one FOB price into a landed local price.
///
/// Returns a dict with every intermediate of the chain.
#[pyfunction]
#[pyo3(signature = (fob, exchange_rate=86.0, sea_freight=30.0, insurance_pct=1.0,
                    customs_duty_pct=7.5, surcharge_pct=10.0, flat_charge=0.0,
                    safeguard_duty_pct=0.0, inland_freight=0.0))]
fn landed_cost<'py>(
    py: Python<'py>,
    fob: f64,
    exchange_rate: f64,
    sea_freight: f64,
    insurance_pct: f64,
    customs_duty_pct: f64,
    surcharge_pct: f64,
    flat_charge: f64,
    safeguard_duty_pct: f64,
    inland_freight: f64,
) -> PyResult<Py<PyDict>> {
    let params = LandedCostParams {
        sea_freight,
        insurance_pct,
        customs_duty_pct,
        surcharge_pct,
        flat_charge,
        safeguard_duty_pct,
        exchange_rate,
        inland_freight,
    };
    let b = params.convert(fob).map_err(value_error)?;

    let dict = PyDict::new(py);
    dict.set_item("fob", b.fob)?;
    dict.set_item("cfr", b.cfr)?;
    dict.set_item("insurance", b.insurance)?;
    dict.set_item("cif", b.cif)?;
    dict.set_item("customs", b.customs)?;
    dict.set_item("surcharge", b.surcharge)?;
    dict.set_item("landed_value", b.landed_value)?;
    dict.set_item("safeguard", b.safeguard)?;
    dict.set_item("port_price", b.port_price)?;
    dict.set_item("local_price", b.local_price)?;

    Ok(dict.into())
}

/// Python module definition.
#[pymodule]
fn hrc_var_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_function(wrap_pyfunction!(var_forecast, m)?)?;
    m.add_function(wrap_pyfunction!(landed_cost, m)?)?;
    Ok(())
}
