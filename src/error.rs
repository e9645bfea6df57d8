use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashError {
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Data source unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Date parse error: column label '{0}' is not a %m/%d/%y date")]
    DateParse(String),

    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
