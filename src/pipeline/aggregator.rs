//! Grouped descriptive statistics over the value and surface columns.

use super::ValueFrame;
use crate::constants::aggregate_columns::{
    COUNT, MEAN_SURFACE, MEAN_VALUE, MEDIAN_SURFACE, MEDIAN_VALUE, STD_VALUE,
};
use crate::constants::columns::{BUILT_SURFACE, POSTAL_CODE, PROPERTY_TYPE, VALUE};
use crate::error::{ExplorerError, Result};
use crate::models::{AggregateRow, GroupingKey};
use polars::prelude::*;
use tracing::debug;

/// Group a dataset and compute count, median/mean/std of value and
/// median/mean of built surface, ordered by the grouping columns.
///
/// Single-transaction groups get a null standard deviation.
pub fn aggregate_frame<D: ValueFrame>(dataset: &D, key: GroupingKey) -> Result<DataFrame> {
    let keys: Vec<Expr> = key.columns().iter().map(|name| col(*name)).collect();

    let frame = dataset
        .frame()
        .clone()
        .lazy()
        .group_by_stable(keys.clone())
        .agg([
            len().cast(DataType::UInt64).alias(COUNT),
            col(VALUE).median().alias(MEDIAN_VALUE),
            col(VALUE).mean().alias(MEAN_VALUE),
            when(len().gt(lit(1)))
                .then(col(VALUE).std(1))
                .otherwise(lit(NULL).cast(DataType::Float64))
                .alias(STD_VALUE),
            col(BUILT_SURFACE).median().alias(MEDIAN_SURFACE),
            col(BUILT_SURFACE).mean().alias(MEAN_SURFACE),
        ])
        .sort_by_exprs(keys, SortMultipleOptions::default().with_maintain_order(true))
        .collect()?;

    debug!(
        "Aggregated {} rows into {} groups by {:?}",
        dataset.height(),
        frame.height(),
        key
    );
    Ok(frame)
}

/// Aggregate into typed rows for the presentation layer
pub fn aggregate<D: ValueFrame>(dataset: &D, key: GroupingKey) -> Result<Vec<AggregateRow>> {
    let frame = aggregate_frame(dataset, key)?;
    let columns = key.columns();

    let keys = string_column(&frame, columns[0])?;
    let property_types = if key.includes_property_type() {
        Some(string_column(&frame, PROPERTY_TYPE)?)
    } else {
        None
    };
    let counts = frame
        .column(COUNT)?
        .as_materialized_series()
        .u64()?
        .clone();
    let median_value = float_column(&frame, MEDIAN_VALUE)?;
    let mean_value = float_column(&frame, MEAN_VALUE)?;
    let std_value = float_column(&frame, STD_VALUE)?;
    let median_surface = float_column(&frame, MEDIAN_SURFACE)?;
    let mean_surface = float_column(&frame, MEAN_SURFACE)?;

    (0..frame.height())
        .map(|i| {
            Ok(AggregateRow {
                key: keys.get(i).map(str::to_string),
                property_type: property_types
                    .as_ref()
                    .and_then(|types| types.get(i).map(str::to_string)),
                count: counts.get(i).unwrap_or(0),
                median_value: required(&median_value, i, MEDIAN_VALUE)?,
                mean_value: required(&mean_value, i, MEAN_VALUE)?,
                std_value: std_value.get(i).filter(|std| std.is_finite()),
                median_surface: required(&median_surface, i, MEDIAN_SURFACE)?,
                mean_surface: required(&mean_surface, i, MEAN_SURFACE)?,
            })
        })
        .collect()
}

/// Distinct property types present in a dataset, sorted
pub fn property_types<D: ValueFrame>(dataset: &D) -> Result<Vec<String>> {
    distinct_values(dataset, PROPERTY_TYPE)
}

/// Distinct postal codes present in a dataset, sorted
pub fn postal_codes<D: ValueFrame>(dataset: &D) -> Result<Vec<String>> {
    distinct_values(dataset, POSTAL_CODE)
}

fn distinct_values<D: ValueFrame>(dataset: &D, name: &str) -> Result<Vec<String>> {
    let frame = dataset
        .frame()
        .clone()
        .lazy()
        .select([col(name).unique().sort(SortOptions::default())])
        .collect()?;

    let values = string_column(&frame, name)?;
    Ok((&values).into_iter().flatten().map(str::to_string).collect())
}

fn string_column(frame: &DataFrame, name: &str) -> Result<StringChunked> {
    Ok(frame
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?
        .str()?
        .clone())
}

fn float_column(frame: &DataFrame, name: &str) -> Result<Float64Chunked> {
    Ok(frame
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?
        .f64()?
        .clone())
}

fn required(values: &Float64Chunked, index: usize, name: &str) -> Result<f64> {
    values.get(index).ok_or_else(|| {
        ExplorerError::Polars(PolarsError::ComputeError(
            format!("aggregate column '{}' is null at row {}", name, index).into(),
        ))
    })
}
