//! First-order differencing of a level table and its inverse.

use nalgebra::{DMatrix, DVector};

use crate::error::{ForecastError, Result};

/// Row t of the output is `levels[t + 1] - levels[t]`.
pub fn difference(levels: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let n = levels.nrows();
    if n < 2 {
        return Err(ForecastError::InsufficientHistory(format!(
            "differencing needs at least 2 rows, got {}",
            n
        )));
    }
    Ok(levels.rows(1, n - 1).into_owned() - levels.rows(0, n - 1))
}

/// Differences of adjacent rows, keeping only pairs whose endpoints are
/// both complete (all values finite).
///
/// A missing level removes the two differences that touch it; surviving
/// rows are returned in order with the count of removed rows. No difference
/// is ever taken across a gap.
pub fn difference_complete(levels: &DMatrix<f64>) -> Result<(DMatrix<f64>, usize)> {
    let all = difference(levels)?;
    let kept: Vec<usize> = (0..all.nrows())
        .filter(|&t| all.row(t).iter().all(|v| v.is_finite()))
        .collect();
    let dropped = all.nrows() - kept.len();
    Ok((all.select_rows(kept.iter()), dropped))
}

/// Cumulative sum of `diffs` on top of `seed` (the last known level).
///
/// Row t of the output is `seed + diffs[0] + ... + diffs[t]`.
pub fn reconstruct(diffs: &DMatrix<f64>, seed: &DVector<f64>) -> Result<DMatrix<f64>> {
    if diffs.ncols() != seed.len() {
        return Err(ForecastError::DataError(format!(
            "seed has {} values but differences have {} columns",
            seed.len(),
            diffs.ncols()
        )));
    }

    let mut out = DMatrix::zeros(diffs.nrows(), diffs.ncols());
    let mut level = seed.transpose();
    for t in 0..diffs.nrows() {
        level += diffs.row(t);
        out.set_row(t, &level);
    }
    Ok(out)
}
