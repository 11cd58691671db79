//! Upper-fence outlier filtering on the value column.
//!
//! Prices are right-skewed, so only high values are pruned. The filter
//! produces a separate view and never touches the dataset it reads.

use super::{FilteredDataset, ValueFrame};
use crate::constants::columns::VALUE;
use crate::error::Result;
use crate::models::Fence;
use polars::prelude::*;
use tracing::debug;

/// Compute Q1, Q3 (linear interpolation) and the upper fence
/// `Q3 + multiplier × IQR` of the value column.
///
/// Returns `None` when the column holds no values.
pub fn compute_fence(frame: &DataFrame, multiplier: f64) -> Result<Option<Fence>> {
    let quartiles = frame
        .clone()
        .lazy()
        .select([
            col(VALUE)
                .quantile(lit(0.25), QuantileMethod::Linear)
                .cast(DataType::Float64)
                .alias("q1"),
            col(VALUE)
                .quantile(lit(0.75), QuantileMethod::Linear)
                .cast(DataType::Float64)
                .alias("q3"),
        ])
        .collect()?;

    let q1 = quartiles.column("q1")?.as_materialized_series().f64()?.get(0);
    let q3 = quartiles.column("q3")?.as_materialized_series().f64()?.get(0);

    Ok(match (q1, q3) {
        (Some(q1), Some(q3)) => {
            let iqr = q3 - q1;
            Some(Fence {
                q1,
                q3,
                iqr,
                upper: q3 + multiplier * iqr,
            })
        }
        _ => None,
    })
}

/// Keep rows whose value is at or below the upper fence
pub fn filter_outliers<D: ValueFrame>(dataset: &D, multiplier: f64) -> Result<FilteredDataset> {
    let source = dataset.frame();
    let fence = compute_fence(source, multiplier)?;

    let frame = match &fence {
        Some(fence) => source
            .clone()
            .lazy()
            .filter(col(VALUE).lt_eq(lit(fence.upper)))
            .collect()?,
        None => source.clone(),
    };

    let removed_rows = source.height() - frame.height();
    if let Some(fence) = &fence {
        debug!(
            "Outlier fence {:.2} (Q1 {:.2}, Q3 {:.2}) removed {} of {} rows",
            fence.upper,
            fence.q1,
            fence.q3,
            removed_rows,
            source.height()
        );
    }

    Ok(FilteredDataset {
        frame,
        mode: dataset.mode(),
        fence,
        removed_rows,
    })
}
