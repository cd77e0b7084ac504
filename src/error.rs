//! Error types for the analysis toolkit.

use thiserror::Error;

/// Main error type for analysis operations.
///
/// A metric whose sample-size or denominator precondition fails is *not* an
/// error: such metrics come back as `None` inside an otherwise successful
/// result, so a single degenerate statistic never aborts a run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Data error: {0}")]
    Data(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown timeframe label: {0}")]
    UnknownTimeframe(String),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("No data loaded")]
    NoData,

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
