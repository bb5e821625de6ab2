use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("insufficient data: {rows} regression rows for {params} parameters per equation")]
    InsufficientData { rows: usize, params: usize },

    #[error("missing data: {0}")]
    MissingData(String),

    #[error("degenerate fit: design matrix is ill-conditioned (condition number {condition_number:e})")]
    DegenerateFit { condition_number: f64 },

    #[error("invalid horizon: {requested} (must be in 1..={max})")]
    InvalidHorizon { requested: i64, max: usize },

    #[error("invalid adjustment for {name}: {value} ({reason})")]
    InvalidAdjustment {
        name: String,
        value: f64,
        reason: String,
    },

    #[error("invalid lag order: {0} (must be >= 1)")]
    InvalidLagOrder(usize),

    #[error("history dates must be strictly increasing: row {index} ({date}) does not follow its predecessor")]
    UnorderedHistory { index: usize, date: String },

    #[error("data error: {0}")]
    DataError(String),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
