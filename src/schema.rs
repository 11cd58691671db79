//! Schema mapping for DVF source tables.
//!
//! Maps source column names (`type_local`, `valeur_fonciere`, ...) onto
//! the fixed internal schema and coerces their types in a single bulk
//! projection. Downstream stages only ever see the internal names.

use crate::constants::{GZIP_MAGIC, columns, summary_columns};
use crate::error::{ExplorerError, Result};
use flate2::read::GzDecoder;
use polars::prelude::*;
use std::io::{Cursor, Read};
use tracing::debug;

/// Logical type of a mapped column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Free text; empty strings are treated as missing
    Text,
    /// Text code left-padded with zeros to a minimum width
    Code { width: i32 },
    Float,
    Integer,
}

impl ColumnKind {
    fn data_type(&self) -> DataType {
        match self {
            ColumnKind::Text | ColumnKind::Code { .. } => DataType::String,
            ColumnKind::Float => DataType::Float64,
            ColumnKind::Integer => DataType::Int32,
        }
    }
}

/// One internal column and the source names it may arrive under
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub sources: &'static [&'static str],
    pub kind: ColumnKind,
}

/// Fixed mapping from a source table to the internal schema
#[derive(Debug, Clone, Copy)]
pub struct SchemaMapping {
    pub table: &'static str,
    pub columns: &'static [ColumnSpec],
}

/// Per-department transaction files from the DVF open-data export
pub const TRANSACTIONS: SchemaMapping = SchemaMapping {
    table: "transactions",
    columns: &[
        ColumnSpec {
            name: columns::PROPERTY_TYPE,
            sources: &["type_local", "property_type"],
            kind: ColumnKind::Text,
        },
        ColumnSpec {
            name: columns::PRICE,
            sources: &["valeur_fonciere", "price"],
            kind: ColumnKind::Float,
        },
        ColumnSpec {
            name: columns::POSTAL_CODE,
            sources: &["code_postal", "postal_code"],
            kind: ColumnKind::Text,
        },
        ColumnSpec {
            name: columns::COMMUNE_NAME,
            sources: &["nom_commune", "commune_name"],
            kind: ColumnKind::Text,
        },
        ColumnSpec {
            name: columns::BUILT_SURFACE,
            sources: &["surface_reelle_bati", "built_surface"],
            kind: ColumnKind::Float,
        },
        ColumnSpec {
            name: columns::LONGITUDE,
            sources: &["longitude"],
            kind: ColumnKind::Float,
        },
        ColumnSpec {
            name: columns::LATITUDE,
            sources: &["latitude"],
            kind: ColumnKind::Float,
        },
    ],
};

/// Pre-aggregated multi-year summary table
pub const SUMMARY: SchemaMapping = SchemaMapping {
    table: "summary",
    columns: &[
        ColumnSpec {
            name: summary_columns::DEPARTMENT_CODE,
            sources: &["department_code", "code_departement"],
            kind: ColumnKind::Code { width: 2 },
        },
        ColumnSpec {
            name: summary_columns::PROPERTY_TYPE,
            sources: &["property_type", "type_local"],
            kind: ColumnKind::Text,
        },
        ColumnSpec {
            name: summary_columns::YEAR,
            sources: &["year", "Year"],
            kind: ColumnKind::Integer,
        },
        ColumnSpec {
            name: summary_columns::MEDIAN_VALUE,
            sources: &["median_value", "Median Value"],
            kind: ColumnKind::Float,
        },
        ColumnSpec {
            name: summary_columns::MEDIAN_VALUE_PER_AREA,
            sources: &["median_value_per_area", "Median Value SQM"],
            kind: ColumnKind::Float,
        },
    ],
};

impl SchemaMapping {
    /// Source-name schema used to read text columns verbatim, so codes
    /// with leading zeros are never parsed as numbers
    fn read_overwrite(&self) -> Schema {
        Schema::from_iter(self.columns.iter().flat_map(|spec| {
            spec.sources
                .iter()
                .map(move |source| Field::new((*source).into(), spec.kind.data_type()))
        }))
    }

    /// Decode a CSV payload (plain or gzip-compressed) into a frame with
    /// source column names
    pub fn read_csv(&self, payload: Vec<u8>) -> Result<DataFrame> {
        let bytes = decompress_payload(payload)?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_ignore_errors(true)
            .with_infer_schema_length(Some(10_000))
            .with_schema_overwrite(Some(Arc::new(self.read_overwrite())))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;

        debug!(
            "Read {} table: {} rows, {} columns",
            self.table,
            df.height(),
            df.width()
        );
        Ok(df)
    }

    /// Project a source frame onto the internal schema
    pub fn apply(&self, df: DataFrame) -> Result<LazyFrame> {
        let mut projection = Vec::with_capacity(self.columns.len());

        for spec in self.columns {
            let source = spec
                .sources
                .iter()
                .find(|source| df.get_column_index(source).is_some())
                .ok_or_else(|| ExplorerError::MissingColumn {
                    column: spec.sources[0].to_string(),
                })?;

            let typed = col(*source).cast(spec.kind.data_type());
            let expr = match spec.kind {
                ColumnKind::Text => non_blank(typed),
                // "6" and "06" name the same department
                ColumnKind::Code { width } => non_blank(typed).str().zfill(lit(width)),
                ColumnKind::Float | ColumnKind::Integer => typed,
            };
            projection.push(expr.alias(spec.name));
        }

        Ok(df.lazy().select(projection))
    }

    /// Read and map a payload in one step
    pub fn load(&self, payload: Vec<u8>) -> Result<DataFrame> {
        let df = self.read_csv(payload)?;
        Ok(self.apply(df)?.collect()?)
    }
}

/// Trimmed text with empty strings turned into nulls
fn non_blank(text: Expr) -> Expr {
    let trimmed = text.str().strip_chars(lit(NULL));
    when(trimmed.clone().neq(lit("")))
        .then(trimmed)
        .otherwise(lit(NULL))
}

/// Inflate gzip payloads; plain payloads pass through untouched
pub fn decompress_payload(payload: Vec<u8>) -> Result<Vec<u8>> {
    if payload.len() < GZIP_MAGIC.len() || payload[..2] != GZIP_MAGIC {
        return Ok(payload);
    }

    let mut decoder = GzDecoder::new(payload.as_slice());
    let mut inflated = Vec::with_capacity(payload.len() * 4);
    decoder.read_to_end(&mut inflated)?;
    debug!(
        "Decompressed payload: {} -> {} bytes",
        payload.len(),
        inflated.len()
    );
    Ok(inflated)
}
