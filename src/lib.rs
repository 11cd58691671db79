//! DVF Explorer Library
//!
//! Data preparation core for exploring French property transaction prices
//! (DVF open data) by department and year.
//!
//! This library provides tools for:
//! - Fetching per-department transaction files over HTTP or from a local mirror
//! - Memoizing fetched datasets in a bounded LRU cache
//! - Cleaning, de-duplicating and normalizing transactions
//! - Pruning high outliers with an interquartile-range fence for map views
//! - Grouped statistics by postal code, commune and property type
//! - Year-over-year trend metrics from a multi-year summary table

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod session;
pub mod source;

pub use config::ExplorerConfig;
pub use error::{ExplorerError, Result};
pub use models::{
    AggregateRow, DatasetKey, DepartmentCode, GroupingKey, HistoryPoint, PercentageChange,
    ValueMode, YearlyDifferential,
};
pub use session::{ExplorerRequest, ExplorerSession, ExplorerView, ViewState};
