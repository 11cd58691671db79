//! Transaction cleaning: completeness, deduplication, postal codes, ordering.

use super::{CleanedDataset, RawDataset};
use crate::constants::columns::{DEDUP_KEY, POSTAL_CODE, REQUIRED};
use crate::error::{ExplorerError, Result};
use crate::models::CleaningStats;
use crate::schema::TRANSACTIONS;
use polars::prelude::*;
use tracing::{debug, info};

const ROW_INDEX: &str = "__row_index";

/// Clean a raw dataset.
///
/// Rows missing any required field are dropped, postal codes are
/// re-rendered as zero-padded 5-character strings (unparseable codes count
/// as missing), duplicates on (price, longitude, latitude) keep their last
/// occurrence, and the result is stably sorted by postal code.
pub fn clean(raw: &RawDataset) -> Result<CleanedDataset> {
    let input_rows = raw.height();

    let complete = raw
        .frame()
        .clone()
        .lazy()
        .with_column(normalized_postal_code().alias(POSTAL_CODE))
        .filter(all_required_present())
        .collect()?;
    let incomplete_rows = input_rows - complete.height();

    let dedup_key: Vec<Expr> = DEDUP_KEY.iter().map(|name| col(*name)).collect();
    let output_columns: Vec<Expr> = TRANSACTIONS
        .columns
        .iter()
        .map(|spec| col(spec.name))
        .collect();

    let frame = complete
        .lazy()
        .with_row_index(ROW_INDEX, None)
        .filter(col(ROW_INDEX).eq(col(ROW_INDEX).max().over(dedup_key)))
        .select(output_columns)
        .sort_by_exprs(
            [col(POSTAL_CODE)],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?;

    let stats = CleaningStats {
        input_rows,
        incomplete_rows,
        duplicate_rows: input_rows - incomplete_rows - frame.height(),
        output_rows: frame.height(),
    };

    debug!(
        "Cleaning {}: {} incomplete rows, {} duplicates",
        raw.key(),
        stats.incomplete_rows,
        stats.duplicate_rows
    );

    if frame.height() == 0 {
        return Err(ExplorerError::AllRowsInvalid {
            department: raw.key().department.to_string(),
            year: raw.key().year,
        });
    }

    info!(
        "Cleaned {}: {} of {} transactions kept",
        raw.key(),
        stats.output_rows,
        stats.input_rows
    );

    Ok(CleanedDataset {
        key: raw.key().clone(),
        frame,
        stats,
    })
}

/// Postal code parsed as a number and rendered back with leading zeros.
/// Codes outside 0..=99999 become null.
fn normalized_postal_code() -> Expr {
    let numeric = col(POSTAL_CODE).cast(DataType::Float64);
    let in_range = numeric
        .clone()
        .gt_eq(lit(0.0))
        .and(numeric.clone().lt(lit(100_000.0)));

    when(in_range)
        .then(
            numeric
                .cast(DataType::Int64)
                .cast(DataType::String)
                .str()
                .zfill(lit(5)),
        )
        .otherwise(lit(NULL))
}

fn all_required_present() -> Expr {
    REQUIRED
        .iter()
        .fold(lit(true), |acc, name| acc.and(col(*name).is_not_null()))
}
