//! Map preparation: marker coordinates and hover labels.

use super::ValueFrame;
use crate::constants::columns::{
    COMMUNE_NAME, LABEL, LATITUDE, LONGITUDE, MAP_LATITUDE, MAP_LONGITUDE, POSTAL_CODE,
};
use crate::error::Result;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const LATITUDE_JITTER: &str = "__latitude_jitter";
const LONGITUDE_JITTER: &str = "__longitude_jitter";

/// Marker placement options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapOptions {
    /// Uniform jitter amplitude in degrees; 0 disables jitter
    pub jitter_degrees: f64,
    pub seed: Option<u64>,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            jitter_degrees: 0.0,
            seed: None,
        }
    }
}

/// Add `map_latitude`, `map_longitude` and `label` columns.
///
/// Jitter spreads transactions sharing an address so their markers do not
/// overlap. The source coordinates are left untouched.
pub fn prepare_map<D: ValueFrame>(dataset: &D, options: &MapOptions) -> Result<DataFrame> {
    let mut frame = dataset.frame().clone();
    let mut output: Vec<Expr> = frame
        .get_column_names()
        .iter()
        .map(|name| col(name.as_str()))
        .collect();

    let label = concat_str([col(POSTAL_CODE), col(COMMUNE_NAME)], " ", true).alias(LABEL);

    if options.jitter_degrees > 0.0 {
        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let amplitude = options.jitter_degrees;
        let height = frame.height();
        let latitude_offsets: Vec<f64> = (0..height)
            .map(|_| rng.random_range(-amplitude..=amplitude))
            .collect();
        let longitude_offsets: Vec<f64> = (0..height)
            .map(|_| rng.random_range(-amplitude..=amplitude))
            .collect();

        frame.with_column(Column::new(LATITUDE_JITTER.into(), latitude_offsets))?;
        frame.with_column(Column::new(LONGITUDE_JITTER.into(), longitude_offsets))?;

        output.push((col(LATITUDE) + col(LATITUDE_JITTER)).alias(MAP_LATITUDE));
        output.push((col(LONGITUDE) + col(LONGITUDE_JITTER)).alias(MAP_LONGITUDE));
    } else {
        output.push(col(LATITUDE).alias(MAP_LATITUDE));
        output.push(col(LONGITUDE).alias(MAP_LONGITUDE));
    }
    output.push(label);

    Ok(frame.lazy().select(output).collect()?)
}
