//! Historical monthly dataset passed explicitly into every forecast call.
//!
//! The dataset is loaded once by the caller and treated as immutable for the
//! duration of a request. Selection turns it into a dense level table over
//! the modelled columns, applying the configured missing-value policy.

use chrono::{Datelike, Months, NaiveDate};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::types::MissingPolicy;

/// One month of history. `None` marks a missing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub values: Vec<Option<f64>>,
}

impl Observation {
    pub fn new(date: NaiveDate, values: Vec<Option<f64>>) -> Self {
        Self { date, values }
    }

    /// Observation with every value present.
    pub fn complete(date: NaiveDate, values: &[f64]) -> Self {
        Self {
            date,
            values: values.iter().copied().map(Some).collect(),
        }
    }
}

/// Named numeric columns over consecutive first-of-month dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalDataset {
    columns: Vec<String>,
    observations: Vec<Observation>,
}

impl HistoricalDataset {
    pub fn new(columns: Vec<String>, observations: Vec<Observation>) -> Result<Self> {
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(ForecastError::DataError(format!(
                    "duplicate column '{}'",
                    name
                )));
            }
        }

        for (i, obs) in observations.iter().enumerate() {
            if obs.values.len() != columns.len() {
                return Err(ForecastError::DataError(format!(
                    "row {} ({}) has {} values but dataset has {} columns",
                    i,
                    obs.date,
                    obs.values.len(),
                    columns.len()
                )));
            }
            if obs.date.day() != 1 {
                return Err(ForecastError::DataError(format!(
                    "row {} ({}) is not dated on the first of a month",
                    i, obs.date
                )));
            }
            if i > 0 {
                let prev = observations[i - 1].date;
                if obs.date <= prev {
                    return Err(ForecastError::UnorderedHistory {
                        index: i,
                        date: obs.date.to_string(),
                    });
                }
                if prev.checked_add_months(Months::new(1)) != Some(obs.date) {
                    return Err(ForecastError::DataError(format!(
                        "calendar gap between {} and {}: months must be consecutive, \
                         mark absent values as missing instead",
                        prev, obs.date
                    )));
                }
            }
        }

        Ok(Self {
            columns,
            observations,
        })
    }

    /// Build from column-major data, as handed over by a dataframe.
    pub fn from_columns(
        dates: Vec<NaiveDate>,
        columns: Vec<(String, Vec<Option<f64>>)>,
    ) -> Result<Self> {
        let n = dates.len();
        for (name, col) in &columns {
            if col.len() != n {
                return Err(ForecastError::DataError(format!(
                    "column '{}' has {} rows but there are {} dates",
                    name,
                    col.len(),
                    n
                )));
            }
        }

        let observations = dates
            .into_iter()
            .enumerate()
            .map(|(t, date)| Observation {
                date,
                values: columns.iter().map(|(_, col)| col[t]).collect(),
            })
            .collect();
        let names = columns.into_iter().map(|(name, _)| name).collect();

        Self::new(names, observations)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Dense level table over `names` (in that order), one row per month.
    ///
    /// Fails with `MissingData` if a name is not a column. A missing or
    /// non-finite value in a selected column is stored as NaN under
    /// `DropRows`, keeping the row so that no difference spans a gap, and
    /// fails the call under `Reject`.
    pub fn select(&self, names: &[String], policy: MissingPolicy) -> Result<LevelTable> {
        if names.is_empty() {
            return Err(ForecastError::DataError("no columns selected".into()));
        }

        let mut indices = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(ForecastError::DataError(format!(
                    "column '{}' selected more than once",
                    name
                )));
            }
            let idx = self.column_index(name).ok_or_else(|| {
                ForecastError::MissingData(format!("column '{}' not present in dataset", name))
            })?;
            indices.push(idx);
        }

        let k = indices.len();
        let n = self.observations.len();
        let mut data = Vec::with_capacity(n * k);
        let mut incomplete_rows = 0;

        for obs in &self.observations {
            let missing = indices
                .iter()
                .position(|&j| !obs.values[j].is_some_and(f64::is_finite));

            match (missing, policy) {
                (Some(pos), MissingPolicy::Reject) => {
                    return Err(ForecastError::MissingData(format!(
                        "column '{}' has no value at {}",
                        names[pos], obs.date
                    )));
                }
                (Some(_), MissingPolicy::DropRows) => incomplete_rows += 1,
                (None, _) => {}
            }
            data.extend(indices.iter().map(|&j| {
                obs.values[j].filter(|v| v.is_finite()).unwrap_or(f64::NAN)
            }));
        }

        Ok(LevelTable {
            dates: self.observations.iter().map(|o| o.date).collect(),
            columns: names.to_vec(),
            values: DMatrix::from_row_slice(n, k, &data),
            incomplete_rows,
        })
    }
}

/// Levels of the modelled columns, one row per month. NaN marks a missing value.
#[derive(Debug, Clone)]
pub struct LevelTable {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<String>,
    /// n × k, row t is the observation at `dates[t]`.
    pub values: DMatrix<f64>,
    /// Rows holding at least one missing value.
    pub incomplete_rows: usize,
}

impl LevelTable {
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_complete(&self, row: usize) -> bool {
        row < self.nrows() && self.values.row(row).iter().all(|v| v.is_finite())
    }

    /// Index of the most recent row with every value present.
    pub fn last_complete_row(&self) -> Option<usize> {
        (0..self.nrows()).rev().find(|&t| self.is_complete(t))
    }
}
