//! Core data structures and types for DVF price exploration.
//!
//! Defines request keys, value modes, grouping keys, aggregate rows,
//! yearly differentials and the statistics reported by each stage.

use crate::error::{ExplorerError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static DEPARTMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(0[1-9]|1[0-9]|2[1-9AB]|[3-8][0-9]|9[0-5]|97[1-6])$").expect("valid department regex")
});

/// French department code ("01".."95", "2A", "2B", "971".."976")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DepartmentCode(String);

impl DepartmentCode {
    /// Parse a department code, accepting lower-case Corsican codes and
    /// single-digit metropolitan codes ("6" becomes "06")
    pub fn parse(code: &str) -> Result<Self> {
        let trimmed = code.trim().to_uppercase();
        let candidate = if trimmed.len() == 1 && trimmed.chars().all(|c| c.is_ascii_digit()) {
            format!("0{}", trimmed)
        } else {
            trimmed
        };

        if DEPARTMENT_PATTERN.is_match(&candidate) {
            Ok(Self(candidate))
        } else {
            Err(ExplorerError::InvalidRequest {
                message: format!("'{}' is not a French department code", code),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DepartmentCode {
    type Error = ExplorerError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DepartmentCode> for String {
    fn from(code: DepartmentCode) -> Self {
        code.0
    }
}

impl fmt::Display for DepartmentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache and fetch key: one raw dataset per department and year
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetKey {
    pub department: DepartmentCode,
    pub year: i32,
}

impl DatasetKey {
    pub fn new(department: DepartmentCode, year: i32) -> Self {
        Self { department, year }
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.department, self.year)
    }
}

/// Which quantity the `value` column holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueMode {
    /// Absolute transaction price
    Absolute,
    /// Price divided by built surface, rounded to the nearest unit
    PerArea,
}

impl ValueMode {
    pub fn from_flag(normalize_by_area: bool) -> Self {
        if normalize_by_area {
            ValueMode::PerArea
        } else {
            ValueMode::Absolute
        }
    }

    /// Axis label used by the presentation layer
    pub fn unit_label(&self) -> &'static str {
        match self {
            ValueMode::Absolute => "€",
            ValueMode::PerArea => "€/m²",
        }
    }
}

/// Grouping keys supported by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupingKey {
    PostalCode,
    PostalCodeAndType,
    CommuneAndType,
}

impl GroupingKey {
    /// Columns to group by, primary key first
    pub fn columns(&self) -> &'static [&'static str] {
        use crate::constants::columns::{COMMUNE_NAME, POSTAL_CODE, PROPERTY_TYPE};
        match self {
            GroupingKey::PostalCode => &[POSTAL_CODE],
            GroupingKey::PostalCodeAndType => &[POSTAL_CODE, PROPERTY_TYPE],
            GroupingKey::CommuneAndType => &[COMMUNE_NAME, PROPERTY_TYPE],
        }
    }

    pub fn includes_property_type(&self) -> bool {
        !matches!(self, GroupingKey::PostalCode)
    }
}

/// Descriptive statistics for one grouping key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    /// Postal code or commune name, depending on the grouping key
    pub key: Option<String>,
    pub property_type: Option<String>,
    pub count: u64,
    pub median_value: f64,
    pub mean_value: f64,
    /// Sample standard deviation; `None` for single-transaction groups
    pub std_value: Option<f64>,
    pub median_surface: f64,
    pub mean_surface: f64,
}

/// Percentage change between the target year and the year before it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PercentageChange {
    Value(f64),
    /// One of the two years is absent, or the baseline is zero
    NotApplicable,
}

impl PercentageChange {
    pub fn value(&self) -> Option<f64> {
        match self {
            PercentageChange::Value(v) => Some(*v),
            PercentageChange::NotApplicable => None,
        }
    }
}

impl fmt::Display for PercentageChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PercentageChange::Value(v) => write!(f, "{:+.2}%", v),
            PercentageChange::NotApplicable => f.write_str("NA"),
        }
    }
}

/// Trend metrics for one department and property type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyDifferential {
    pub department: DepartmentCode,
    pub property_type: String,
    pub target_year: i32,
    pub value_mode: ValueMode,
    /// Mean of the year-over-year differences up to the target year
    pub annual_average_diff: Option<f64>,
    pub percentage_diff: PercentageChange,
}

/// One (year, property type) median from the department price history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub year: i32,
    pub property_type: String,
    pub value: Option<f64>,
}

/// Upper fence computed by the outlier filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fence {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub upper: f64,
}

/// Row accounting for one cleaning pass
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningStats {
    pub input_rows: usize,
    pub incomplete_rows: usize,
    pub duplicate_rows: usize,
    pub output_rows: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_department_code_parsing() {
        assert_eq!(DepartmentCode::parse("06").unwrap().as_str(), "06");
        assert_eq!(DepartmentCode::parse("6").unwrap().as_str(), "06");
        assert_eq!(DepartmentCode::parse("2a").unwrap().as_str(), "2A");
        assert_eq!(DepartmentCode::parse("974").unwrap().as_str(), "974");
        assert_eq!(DepartmentCode::parse(" 75 ").unwrap().as_str(), "75");
    }

    #[test]
    fn test_department_code_rejects_invalid() {
        for code in ["00", "96", "20", "2C", "977", "", "abc", "0600"] {
            assert!(DepartmentCode::parse(code).is_err(), "{} should be rejected", code);
        }
    }

    #[test]
    fn test_department_code_serde() {
        let code: DepartmentCode = serde_json::from_str("\"2b\"").unwrap();
        assert_eq!(code.as_str(), "2B");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"2B\"");
        assert!(serde_json::from_str::<DepartmentCode>("\"99\"").is_err());
    }

    #[test]
    fn test_value_mode_from_flag() {
        assert_eq!(ValueMode::from_flag(true), ValueMode::PerArea);
        assert_eq!(ValueMode::from_flag(false), ValueMode::Absolute);
    }

    #[test]
    fn test_grouping_key_columns() {
        assert_eq!(GroupingKey::PostalCode.columns(), &["postal_code"]);
        assert_eq!(
            GroupingKey::CommuneAndType.columns(),
            &["commune_name", "property_type"]
        );
        assert!(!GroupingKey::PostalCode.includes_property_type());
        assert!(GroupingKey::PostalCodeAndType.includes_property_type());
    }

    #[test]
    fn test_percentage_change_display() {
        assert_eq!(PercentageChange::Value(4.1666).to_string(), "+4.17%");
        assert_eq!(PercentageChange::NotApplicable.to_string(), "NA");
        assert_eq!(PercentageChange::NotApplicable.value(), None);
    }
}
