//! Vector autoregression of fixed lag order, estimated by OLS.
//!
//! Model for the differenced k-variate series:
//!
//!   y_t = c + A_1 * y_{t-1} + ... + A_p * y_{t-p} + e_t
//!
//! All k equations share the stacked-lag design matrix
//!
//!   X row for time t: [1, y_{t-1}', y_{t-2}', ..., y_{t-p}']
//!
//! so the coefficient block B = [c'; A_1'; ...; A_p'] solves X * B = Y in the
//! least-squares sense. The solve goes through the SVD of X, which also gives
//! the condition number used to reject near-collinear drivers.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::{ForecastError, Result};

/// Fitted VAR(p) coefficients. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct VarCoefficients {
    intercept: DVector<f64>,
    /// `lags[i]` is A_{i+1}, k × k. Entry (j, l) is the weight of variable l
    /// at lag i+1 in the equation for variable j.
    lags: Vec<DMatrix<f64>>,
    /// Residual covariance (k × k).
    sigma_u: DMatrix<f64>,
    n_obs: usize,
    condition_number: f64,
}

impl VarCoefficients {
    /// Assemble coefficients directly, e.g. from a previously exported fit.
    pub fn new(intercept: DVector<f64>, lags: Vec<DMatrix<f64>>) -> Result<Self> {
        let k = intercept.len();
        if lags.is_empty() {
            return Err(ForecastError::InvalidLagOrder(0));
        }
        for (i, a) in lags.iter().enumerate() {
            if a.nrows() != k || a.ncols() != k {
                return Err(ForecastError::DataError(format!(
                    "lag {} matrix is {}×{}, expected {}×{}",
                    i + 1,
                    a.nrows(),
                    a.ncols(),
                    k,
                    k
                )));
            }
        }
        Ok(Self {
            intercept,
            lags,
            sigma_u: DMatrix::zeros(k, k),
            n_obs: 0,
            condition_number: f64::NAN,
        })
    }

    pub fn lag_order(&self) -> usize {
        self.lags.len()
    }

    pub fn n_vars(&self) -> usize {
        self.intercept.len()
    }

    pub fn intercept(&self) -> &DVector<f64> {
        &self.intercept
    }

    /// A_lag for `lag` in 1..=p.
    pub fn lag_matrix(&self, lag: usize) -> Option<&DMatrix<f64>> {
        lag.checked_sub(1).and_then(|i| self.lags.get(i))
    }

    pub fn sigma_u(&self) -> &DMatrix<f64> {
        &self.sigma_u
    }

    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    pub fn condition_number(&self) -> f64 {
        self.condition_number
    }

    /// Lag matrices A_1..A_p in lag order.
    pub fn lags(&self) -> &[DMatrix<f64>] {
        &self.lags
    }
}

/// Number of regressors per equation: intercept plus k*p lagged values.
pub fn params_per_equation(n_vars: usize, lag_order: usize) -> usize {
    n_vars * lag_order + 1
}

/// Build the stacked-lag design matrix X and response Y.
fn design(diffs: &DMatrix<f64>, p: usize) -> (DMatrix<f64>, DMatrix<f64>) {
    let n = diffs.nrows();
    let k = diffs.ncols();
    let m = n - p;

    let x = DMatrix::from_fn(m, params_per_equation(k, p), |r, c| {
        if c == 0 {
            1.0
        } else {
            let lag = (c - 1) / k + 1;
            let var = (c - 1) % k;
            diffs[(p + r - lag, var)]
        }
    });
    let y = diffs.rows(p, m).into_owned();
    (x, y)
}

/// Fit a VAR(`lag_order`) with intercept to a differenced table (n × k).
///
/// Fails with `InvalidLagOrder` for p = 0, `InsufficientHistory` when the lag
/// order is not smaller than the row count, `InsufficientData` when there are
/// fewer regression rows than parameters per equation, and `DegenerateFit`
/// when the design matrix is rank-deficient or its condition number exceeds
/// `max_condition_number`.
pub fn fit_var(
    diffs: &DMatrix<f64>,
    lag_order: usize,
    max_condition_number: f64,
) -> Result<VarCoefficients> {
    let p = lag_order;
    let n = diffs.nrows();
    let k = diffs.ncols();

    if p == 0 {
        return Err(ForecastError::InvalidLagOrder(p));
    }
    if k == 0 {
        return Err(ForecastError::DataError("no variables to fit".into()));
    }
    if p >= n {
        return Err(ForecastError::InsufficientHistory(format!(
            "lag order {} needs more than {} differenced rows",
            p, n
        )));
    }
    if diffs.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::MissingData(
            "differenced table contains non-finite values".into(),
        ));
    }

    let m = n - p;
    let n_params = params_per_equation(k, p);
    if m < n_params {
        return Err(ForecastError::InsufficientData {
            rows: m,
            params: n_params,
        });
    }

    let (x, y) = design(diffs, p);

    let svd = x.clone().svd(true, true);
    let sv = &svd.singular_values;
    let s_max = sv.max();
    let s_min = sv.min();
    let condition_number = if s_min > 0.0 && s_max.is_finite() {
        s_max / s_min
    } else {
        f64::INFINITY
    };

    debug!(
        n_vars = k,
        lag_order = p,
        n_obs = m,
        condition_number,
        "fitting VAR design matrix"
    );

    if !(condition_number <= max_condition_number) {
        return Err(ForecastError::DegenerateFit { condition_number });
    }

    let b = svd
        .solve(&y, 0.0)
        .map_err(|e| ForecastError::DataError(e.to_string()))?;
    if b.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::DegenerateFit { condition_number });
    }

    let intercept = b.row(0).transpose();
    let lags = (0..p)
        .map(|i| b.rows(1 + i * k, k).transpose())
        .collect();

    // Residual covariance with OLS degrees of freedom.
    let resid = &y - &x * &b;
    let dof = if m > n_params { m - n_params } else { m };
    let sigma_u = (resid.transpose() * &resid) / dof as f64;

    Ok(VarCoefficients {
        intercept,
        lags,
        sigma_u,
        n_obs: m,
        condition_number,
    })
}
