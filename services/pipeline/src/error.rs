use chrono::NaiveDate;
use thiserror::Error;

/// Failure to obtain the source CSV. Callers absorb this into an empty table.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("response is not a readable CSV: {0}")]
    Format(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A field that could not be converted to the type a stage needs.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("required column '{0}' is not present")]
    MissingColumn(String),
    #[error("line {line}: invalid date '{value}'")]
    InvalidDate { line: u64, value: String },
    #[error("line {line}: column '{column}' has non-numeric value '{value}'")]
    InvalidNumber {
        line: u64,
        column: String,
        value: String,
    },
    #[error("line {line}: second row for ({date}, {group})")]
    DuplicateEntry {
        line: u64,
        date: NaiveDate,
        group: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("drawing failed: {0}")]
    Draw(String),
    #[error("invalid color '{0}', expected #rrggbb")]
    Color(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl<E: std::error::Error + Send + Sync> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for RenderError
{
    fn from(err: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        Self::Draw(err.to_string())
    }
}
