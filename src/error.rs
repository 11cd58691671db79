//! Error handling for the DVF data preparation pipeline.
//!
//! Provides error types with context for transaction fetching,
//! schema mapping, cleaning, and summary-table processing failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No data available for department {department} in {year}: {reason}")]
    FetchUnavailable {
        department: String,
        year: i32,
        reason: String,
    },

    #[error("Every transaction for department {department} in {year} was incomplete or invalid")]
    AllRowsInvalid { department: String, year: i32 },

    #[error("Required column '{column}' not found in source data")]
    MissingColumn { column: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ExplorerError {
    /// Create a fetch-unavailable error for a department/year key
    pub fn fetch_unavailable(department: &str, year: i32, reason: impl Into<String>) -> Self {
        Self::FetchUnavailable {
            department: department.to_string(),
            year,
            reason: reason.into(),
        }
    }

    /// Whether the error means "nothing to show for this configuration"
    /// rather than a programming or environment failure
    pub fn is_no_data(&self) -> bool {
        matches!(
            self,
            Self::FetchUnavailable { .. } | Self::AllRowsInvalid { .. } | Self::MissingColumn { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ExplorerError>;
