//! Configuration management and validation.
//!
//! Provides the configuration structure for data sources, the fetch
//! cache, outlier filtering and map preparation. All values are opaque
//! constants to the pipeline; they are supplied by the caller, a JSON
//! file, or command-line overrides.

use crate::constants::{
    AVAILABLE_YEARS, DATA_DIR_NAME, DEFAULT_CACHE_CAPACITY, DEFAULT_FENCE_MULTIPLIER,
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_JITTER_DEGREES, DEFAULT_PROPERTY_TYPE,
    DEFAULT_TRANSACTIONS_URL, SUMMARY_FILE_NAME,
};
use crate::error::{ExplorerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Global configuration for DVF exploration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Base URL of the per-department transaction files
    pub transactions_url: String,

    /// URL of the multi-year summary table (None disables trend metrics)
    pub summary_url: Option<String>,

    /// Local data root; when set, transactions are read from disk instead of HTTP
    pub data_dir: Option<PathBuf>,

    /// Years that may be requested
    pub available_years: Vec<i32>,

    /// Maximum number of raw datasets kept in the fetch cache
    pub cache_capacity: usize,

    /// Interquartile-range multiplier of the upper outlier fence
    pub fence_multiplier: f64,

    /// Apply the outlier fence to aggregations as well as the map
    pub filter_outliers_in_aggregates: bool,

    /// Map marker jitter amplitude in degrees
    pub jitter_degrees: f64,

    /// Seed for reproducible jitter
    pub jitter_seed: Option<u64>,

    /// Property type selected when a request does not name one
    pub default_property_type: String,

    /// Timeout for a single HTTP fetch
    pub http_timeout_secs: u64,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            transactions_url: DEFAULT_TRANSACTIONS_URL.to_string(),
            summary_url: None,
            data_dir: None,
            available_years: AVAILABLE_YEARS.to_vec(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            fence_multiplier: DEFAULT_FENCE_MULTIPLIER,
            filter_outliers_in_aggregates: false,
            jitter_degrees: DEFAULT_JITTER_DEGREES,
            jitter_seed: None,
            default_property_type: DEFAULT_PROPERTY_TYPE.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl ExplorerConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ExplorerConfig = serde_json::from_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.available_years.is_empty() {
            return Err(ExplorerError::Configuration {
                message: "available_years must not be empty".to_string(),
            });
        }

        if self.cache_capacity == 0 {
            return Err(ExplorerError::Configuration {
                message: "cache_capacity must be at least 1".to_string(),
            });
        }

        if !self.fence_multiplier.is_finite() || self.fence_multiplier < 0.0 {
            return Err(ExplorerError::Configuration {
                message: format!(
                    "fence_multiplier must be a non-negative number, got {}",
                    self.fence_multiplier
                ),
            });
        }

        if !self.jitter_degrees.is_finite() || self.jitter_degrees < 0.0 {
            return Err(ExplorerError::Configuration {
                message: format!(
                    "jitter_degrees must be a non-negative number, got {}",
                    self.jitter_degrees
                ),
            });
        }

        Ok(())
    }

    /// Check that a year is within the published range
    pub fn check_year(&self, year: i32) -> Result<()> {
        if self.available_years.contains(&year) {
            Ok(())
        } else {
            Err(ExplorerError::InvalidRequest {
                message: format!(
                    "year {} is not available (available: {:?})",
                    year, self.available_years
                ),
            })
        }
    }

    /// Most recent available year
    pub fn latest_year(&self) -> Option<i32> {
        self.available_years.iter().copied().max()
    }

    /// Default local data root under the user data directory
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(DATA_DIR_NAME))
    }

    /// Where to load the summary table from: the configured URL or path,
    /// else the summary file in the data root when one has been downloaded
    pub fn summary_location(&self) -> Option<String> {
        if let Some(url) = &self.summary_url {
            return Some(url.clone());
        }

        let root = self.data_dir.clone().or_else(Self::default_data_dir)?;
        let path = root.join(SUMMARY_FILE_NAME);
        path.is_file().then(|| path.display().to_string())
    }
}
