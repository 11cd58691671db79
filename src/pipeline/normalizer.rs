//! Price normalization by built surface.

use super::{CleanedDataset, NormalizedDataset};
use crate::constants::columns::{BUILT_SURFACE, PRICE, VALUE};
use crate::error::Result;
use crate::models::ValueMode;
use polars::prelude::*;
use tracing::debug;

/// Derive the `value` column for the requested mode.
///
/// `Absolute` copies the price. `PerArea` divides the price by the built
/// surface and rounds to the nearest unit, ties to even; rows without a positive surface
/// are removed first so the division is always defined.
pub fn normalize(cleaned: &CleanedDataset, mode: ValueMode) -> Result<NormalizedDataset> {
    let lazy = cleaned.frame().clone().lazy();

    let frame = match mode {
        ValueMode::Absolute => lazy.with_column(col(PRICE).alias(VALUE)).collect()?,
        ValueMode::PerArea => lazy
            .filter(col(BUILT_SURFACE).gt(lit(0.0)))
            .with_column(rounded_unit_price().alias(VALUE))
            .collect()?,
    };

    let undefined = cleaned.height() - frame.height();
    if undefined > 0 {
        debug!(
            "Dropped {} transactions without a positive built surface",
            undefined
        );
    }

    Ok(NormalizedDataset {
        key: cleaned.key().clone(),
        frame,
        mode,
    })
}

/// price / surface, rounded half to even so exact ties land on the even unit
fn rounded_unit_price() -> Expr {
    let ratio = col(PRICE) / col(BUILT_SURFACE);
    let positive = ratio.clone().gt_eq(lit(0.0));
    let magnitude = when(positive.clone())
        .then(ratio.clone())
        .otherwise(lit(0.0) - ratio);

    // Integer casts truncate, which is a floor on the magnitude
    let whole = magnitude.clone().cast(DataType::Int64);
    let fraction = magnitude - whole.clone().cast(DataType::Float64);
    let odd = (whole.clone() % lit(2i64)).eq(lit(1i64));

    let rounded = when(fraction.clone().gt(lit(0.5)))
        .then(whole.clone() + lit(1i64))
        .when(fraction.eq(lit(0.5)).and(odd))
        .then(whole.clone() + lit(1i64))
        .otherwise(whole)
        .cast(DataType::Float64);

    when(positive)
        .then(rounded.clone())
        .otherwise(lit(0.0) - rounded)
}
