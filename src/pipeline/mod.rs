//! Data preparation pipeline with typed stage outputs.
//!
//! Each stage is one bulk polars transform over the full in-memory table:
//! raw → cleaned → normalized → {filtered (map), aggregated, differential}.
//! Stage outputs are distinct types so a dataset can only move forward
//! through the pipeline; in particular a normalized dataset cannot be
//! normalized again.

pub mod aggregator;
pub mod cleaner;
pub mod map;
pub mod normalizer;
pub mod outliers;
pub mod temporal;

#[cfg(test)]
pub mod tests;

use crate::constants::columns::{POSTAL_CODE, PROPERTY_TYPE};
use crate::error::Result;
use crate::models::{CleaningStats, DatasetKey, Fence, ValueMode};
use crate::schema::TRANSACTIONS;
use polars::prelude::*;

pub use aggregator::{aggregate, aggregate_frame, postal_codes, property_types};
pub use cleaner::clean;
pub use map::{MapOptions, prepare_map};
pub use normalizer::normalize;
pub use outliers::{compute_fence, filter_outliers};
pub use temporal::SummaryTable;

/// Transactions for one department and year, mapped onto the internal schema
#[derive(Debug, Clone)]
pub struct RawDataset {
    key: DatasetKey,
    frame: DataFrame,
}

impl RawDataset {
    /// Wrap a frame using either source or internal column names
    pub fn new(key: DatasetKey, frame: DataFrame) -> Result<Self> {
        let frame = TRANSACTIONS.apply(frame)?.collect()?;
        Ok(Self { key, frame })
    }

    /// Decode a fetched CSV payload (plain or gzip)
    pub fn from_payload(key: DatasetKey, payload: Vec<u8>) -> Result<Self> {
        let frame = TRANSACTIONS.load(payload)?;
        Ok(Self { key, frame })
    }

    pub fn key(&self) -> &DatasetKey {
        &self.key
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }
}

/// Complete, de-duplicated transactions sorted by postal code
#[derive(Debug, Clone)]
pub struct CleanedDataset {
    key: DatasetKey,
    frame: DataFrame,
    stats: CleaningStats,
}

impl CleanedDataset {
    pub fn key(&self) -> &DatasetKey {
        &self.key
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn stats(&self) -> &CleaningStats {
        &self.stats
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }
}

/// Cleaned transactions with the `value` column in effect
#[derive(Debug, Clone)]
pub struct NormalizedDataset {
    key: DatasetKey,
    frame: DataFrame,
    mode: ValueMode,
}

impl NormalizedDataset {
    pub fn key(&self) -> &DatasetKey {
        &self.key
    }

    /// Restrict to a single property type, keeping the value mode
    pub fn for_property_type(&self, property_type: &str) -> Result<Self> {
        self.restrict(col(PROPERTY_TYPE).eq(lit(property_type)))
    }

    /// Restrict to a single postal code, across every property type
    pub fn for_postal_code(&self, postal_code: &str) -> Result<Self> {
        self.restrict(col(POSTAL_CODE).eq(lit(postal_code)))
    }

    fn restrict(&self, predicate: Expr) -> Result<Self> {
        let frame = self.frame.clone().lazy().filter(predicate).collect()?;

        Ok(Self {
            key: self.key.clone(),
            frame,
            mode: self.mode,
        })
    }
}

/// Map-only view of a normalized dataset with high outliers removed
#[derive(Debug, Clone)]
pub struct FilteredDataset {
    frame: DataFrame,
    mode: ValueMode,
    fence: Option<Fence>,
    removed_rows: usize,
}

impl FilteredDataset {
    /// Fence applied, or `None` when the source had no values
    pub fn fence(&self) -> Option<&Fence> {
        self.fence.as_ref()
    }

    pub fn removed_rows(&self) -> usize {
        self.removed_rows
    }
}

/// Row-level dataset carrying a `value` column
pub trait ValueFrame {
    fn frame(&self) -> &DataFrame;

    fn mode(&self) -> ValueMode;

    fn height(&self) -> usize {
        self.frame().height()
    }
}

impl ValueFrame for NormalizedDataset {
    fn frame(&self) -> &DataFrame {
        &self.frame
    }

    fn mode(&self) -> ValueMode {
        self.mode
    }
}

impl ValueFrame for FilteredDataset {
    fn frame(&self) -> &DataFrame {
        &self.frame
    }

    fn mode(&self) -> ValueMode {
        self.mode
    }
}
