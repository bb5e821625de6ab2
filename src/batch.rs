//! Rayon-based parallel batch forecasting.
//!
//! Every request is a pure function of its inputs, so independent requests
//! run on Rayon's work-stealing pool with no locking. Results come back in
//! input order, one `Result` per request.

use rayon::prelude::*;

use crate::dataset::HistoricalDataset;
use crate::error::Result;
use crate::forecast::forecast_pipeline;
use crate::types::{ForecastRequest, ForecastTable};

/// Run several requests (e.g. scenario variants) against one dataset.
pub fn batch_forecast(
    dataset: &HistoricalDataset,
    requests: &[ForecastRequest],
) -> Vec<Result<ForecastTable>> {
    requests
        .par_iter()
        .map(|request| forecast_pipeline(dataset, request))
        .collect()
}

/// Run one request against several datasets (e.g. regional price histories).
pub fn batch_forecast_datasets(
    datasets: &[HistoricalDataset],
    request: &ForecastRequest,
) -> Vec<Result<ForecastTable>> {
    datasets
        .par_iter()
        .map(|dataset| forecast_pipeline(dataset, request))
        .collect()
}
