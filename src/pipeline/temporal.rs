//! Year-over-year trend metrics from the multi-year summary table.

use crate::constants::summary_columns::{
    DEPARTMENT_CODE, MEDIAN_VALUE, MEDIAN_VALUE_PER_AREA, PROPERTY_TYPE, YEAR,
};
use crate::error::Result;
use crate::models::{
    DepartmentCode, HistoryPoint, PercentageChange, ValueMode, YearlyDifferential,
};
use crate::schema::SUMMARY;
use polars::prelude::*;
use std::path::Path;
use tracing::debug;

const SELECTED: &str = "selected_value";

/// Long-format summary keyed by (department, property type, year)
#[derive(Debug, Clone)]
pub struct SummaryTable {
    frame: DataFrame,
}

impl SummaryTable {
    /// Wrap a frame using either source or internal column names
    pub fn new(frame: DataFrame) -> Result<Self> {
        let frame = SUMMARY.apply(frame)?.collect()?;
        Ok(Self { frame })
    }

    /// Decode a CSV payload (plain or gzip)
    pub fn from_payload(payload: Vec<u8>) -> Result<Self> {
        let frame = SUMMARY.load(payload)?;
        debug!("Loaded summary table with {} rows", frame.height());
        Ok(Self { frame })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_payload(std::fs::read(path)?)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Trend metrics for one department and property type up to `target_year`.
    ///
    /// The annual average is the mean of the differences between consecutive
    /// rows (sorted by year) at or before the target year. The percentage
    /// change compares the target year with the year before it and is
    /// `NotApplicable` when either value is missing or the baseline is zero.
    /// Returns `None` when the table has no rows for the combination.
    pub fn differential(
        &self,
        department: &DepartmentCode,
        property_type: &str,
        target_year: i32,
        mode: ValueMode,
    ) -> Result<Option<YearlyDifferential>> {
        let history = self
            .frame
            .clone()
            .lazy()
            .filter(
                col(DEPARTMENT_CODE)
                    .eq(lit(department.as_str()))
                    .and(col(PROPERTY_TYPE).eq(lit(property_type)))
                    .and(col(YEAR).lt_eq(lit(target_year))),
            )
            .sort_by_exprs(
                [col(YEAR)],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .select([col(YEAR), col(value_column(mode)).alias(SELECTED)])
            .collect()?;

        if history.height() == 0 {
            debug!(
                "No summary history for department {} / {}",
                department, property_type
            );
            return Ok(None);
        }

        let average = history
            .clone()
            .lazy()
            .select([(col(SELECTED) - col(SELECTED).shift(lit(1)))
                .mean()
                .alias("annual_average_diff")])
            .collect()?;
        let annual_average_diff = average
            .column("annual_average_diff")?
            .as_materialized_series()
            .f64()?
            .get(0);

        let current = value_in_year(&history, target_year)?;
        let baseline = value_in_year(&history, target_year - 1)?;
        let percentage_diff = match (current, baseline) {
            (Some(current), Some(baseline)) if baseline != 0.0 => {
                PercentageChange::Value((current - baseline) / baseline * 100.0)
            }
            _ => PercentageChange::NotApplicable,
        };

        Ok(Some(YearlyDifferential {
            department: department.clone(),
            property_type: property_type.to_string(),
            target_year,
            value_mode: mode,
            annual_average_diff,
            percentage_diff,
        }))
    }

    /// Differentials for every property type the department has history for
    pub fn differentials_for_department(
        &self,
        department: &DepartmentCode,
        target_year: i32,
        mode: ValueMode,
    ) -> Result<Vec<YearlyDifferential>> {
        let types_frame = self
            .frame
            .clone()
            .lazy()
            .filter(col(DEPARTMENT_CODE).eq(lit(department.as_str())))
            .select([col(PROPERTY_TYPE).unique().sort(SortOptions::default())])
            .collect()?;
        let types = types_frame
            .column(PROPERTY_TYPE)?
            .as_materialized_series()
            .str()?
            .clone();

        let mut differentials = Vec::new();
        for property_type in (&types).into_iter().flatten() {
            if let Some(differential) =
                self.differential(department, property_type, target_year, mode)?
            {
                differentials.push(differential);
            }
        }
        Ok(differentials)
    }

    /// Yearly medians of every property type for one department, sorted by
    /// year then property type. Rows without a year or type are skipped.
    pub fn history(
        &self,
        department: &DepartmentCode,
        mode: ValueMode,
    ) -> Result<Vec<HistoryPoint>> {
        let history = self
            .frame
            .clone()
            .lazy()
            .filter(col(DEPARTMENT_CODE).eq(lit(department.as_str())))
            .sort_by_exprs(
                [col(YEAR), col(PROPERTY_TYPE)],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .select([
                col(YEAR).cast(DataType::Int32),
                col(PROPERTY_TYPE),
                col(value_column(mode))
                    .cast(DataType::Float64)
                    .alias(SELECTED),
            ])
            .collect()?;

        let years = history.column(YEAR)?.as_materialized_series().i32()?.clone();
        let types = history
            .column(PROPERTY_TYPE)?
            .as_materialized_series()
            .str()?
            .clone();
        let values = history
            .column(SELECTED)?
            .as_materialized_series()
            .f64()?
            .clone();

        let points: Vec<HistoryPoint> = (&years)
            .into_iter()
            .zip(&types)
            .zip(&values)
            .filter_map(|((year, property_type), value)| {
                Some(HistoryPoint {
                    year: year?,
                    property_type: property_type?.to_string(),
                    value,
                })
            })
            .collect();

        debug!(
            "Summary history for department {}: {} points",
            department,
            points.len()
        );
        Ok(points)
    }
}

fn value_column(mode: ValueMode) -> &'static str {
    match mode {
        ValueMode::Absolute => MEDIAN_VALUE,
        ValueMode::PerArea => MEDIAN_VALUE_PER_AREA,
    }
}

fn value_in_year(history: &DataFrame, year: i32) -> Result<Option<f64>> {
    let row = history
        .clone()
        .lazy()
        .filter(col(YEAR).eq(lit(year)))
        .select([col(SELECTED).first()])
        .collect()?;

    Ok(row
        .column(SELECTED)?
        .as_materialized_series()
        .cast(&DataType::Float64)?
        .f64()?
        .get(0))
}
