//! Tests for the data preparation pipeline
//!
//! Shared fixtures build small transaction tables in both the internal
//! schema and the DVF source layout.

pub mod cleaner_tests;

use super::{NormalizedDataset, RawDataset, clean, normalize};
use crate::constants::columns::{
    BUILT_SURFACE, COMMUNE_NAME, LATITUDE, LONGITUDE, POSTAL_CODE, PRICE, PROPERTY_TYPE,
};
use crate::error::{ExplorerError, Result};
use crate::models::{DatasetKey, DepartmentCode, ValueMode};
use crate::source::TransactionSource;
use polars::prelude::*;
use std::cell::Cell;
use std::collections::HashMap;

/// DVF export layout: extra columns, one numeric-looking postal code
/// ("6100"), one duplicate sale, two incomplete rows and a zero surface
pub const TRANSACTIONS_CSV: &str = "id_mutation,date_mutation,type_local,valeur_fonciere,code_postal,nom_commune,surface_reelle_bati,longitude,latitude
2023-1,2023-01-05,Maison,350000,06000,Nice,120,7.2620,43.7031
2023-2,2023-01-09,Appartement,180000,06000,Nice,45,7.2650,43.7000
2023-3,2023-01-09,Appartement,180000,06000,Nice,45,7.2650,43.7000
2023-4,2023-02-11,Maison,520000,6100,Nice,160,7.2510,43.7210
2023-5,2023-02-20,Appartement,240000,06400,Cannes,60,7.0170,43.5510
2023-6,2023-03-02,Maison,,06400,Cannes,140,7.0200,43.5600
2023-7,2023-03-15,Appartement,150000,06400,Cannes,,7.0190,43.5530
2023-8,2023-04-01,\"Local industriel. commercial ou assimilé\",400000,06200,Nice,300,7.2200,43.6800
2023-9,2023-04-18,Maison,610000,06400,Cannes,180,7.0100,43.5550
2023-10,2023-05-03,Appartement,95000,06300,Nice,0,7.2850,43.6990
";

pub fn transactions_csv() -> Vec<u8> {
    TRANSACTIONS_CSV.as_bytes().to_vec()
}

pub fn key(department: &str, year: i32) -> DatasetKey {
    DatasetKey::new(DepartmentCode::parse(department).unwrap(), year)
}

/// One synthetic sale; coordinates are made unique per row unless set
#[derive(Debug, Clone)]
pub struct Sale {
    pub property_type: Option<&'static str>,
    pub price: Option<f64>,
    pub postal_code: Option<&'static str>,
    pub commune: Option<&'static str>,
    pub surface: Option<f64>,
    pub position: Option<(f64, f64)>,
    pub missing_coordinates: bool,
}

impl Sale {
    pub fn new(property_type: &'static str, price: f64, postal_code: &'static str, surface: f64) -> Self {
        Self {
            property_type: Some(property_type),
            price: Some(price),
            postal_code: Some(postal_code),
            commune: Some("Nice"),
            surface: Some(surface),
            position: None,
            missing_coordinates: false,
        }
    }

    pub fn at(mut self, longitude: f64, latitude: f64) -> Self {
        self.position = Some((longitude, latitude));
        self
    }

    pub fn in_commune(mut self, commune: Option<&'static str>) -> Self {
        self.commune = commune;
        self
    }

    pub fn without_coordinates(mut self) -> Self {
        self.missing_coordinates = true;
        self
    }
}

/// Internal-schema frame for a list of sales
pub fn sales_frame(sales: &[Sale]) -> DataFrame {
    let coordinate = |index: usize, sale: &Sale, pick: fn((f64, f64)) -> f64, base: (f64, f64)| {
        if sale.missing_coordinates {
            None
        } else {
            let offset = index as f64 * 0.001;
            Some(pick(sale.position.unwrap_or((base.0 + offset, base.1 + offset))))
        }
    };
    let base = (7.0, 43.5);

    let property_types: Vec<Option<&str>> = sales.iter().map(|s| s.property_type).collect();
    let prices: Vec<Option<f64>> = sales.iter().map(|s| s.price).collect();
    let postal_codes: Vec<Option<&str>> = sales.iter().map(|s| s.postal_code).collect();
    let communes: Vec<Option<&str>> = sales.iter().map(|s| s.commune).collect();
    let surfaces: Vec<Option<f64>> = sales.iter().map(|s| s.surface).collect();
    let longitudes: Vec<Option<f64>> = sales
        .iter()
        .enumerate()
        .map(|(i, s)| coordinate(i, s, |p| p.0, base))
        .collect();
    let latitudes: Vec<Option<f64>> = sales
        .iter()
        .enumerate()
        .map(|(i, s)| coordinate(i, s, |p| p.1, base))
        .collect();

    df!(
        PROPERTY_TYPE => property_types,
        PRICE => prices,
        POSTAL_CODE => postal_codes,
        COMMUNE_NAME => communes,
        BUILT_SURFACE => surfaces,
        LONGITUDE => longitudes,
        LATITUDE => latitudes,
    )
    .unwrap()
}

/// The rows of `TRANSACTIONS_CSV`, already in the internal schema
pub fn transactions_frame() -> DataFrame {
    sales_frame(&[
        Sale::new("Maison", 350_000.0, "06000", 120.0).at(7.2620, 43.7031),
        Sale::new("Appartement", 180_000.0, "06000", 45.0).at(7.2650, 43.7000),
        Sale::new("Appartement", 180_000.0, "06000", 45.0).at(7.2650, 43.7000),
        Sale::new("Maison", 520_000.0, "6100", 160.0).at(7.2510, 43.7210),
        Sale::new("Appartement", 240_000.0, "06400", 60.0)
            .in_commune(Some("Cannes"))
            .at(7.0170, 43.5510),
        Sale {
            price: None,
            ..Sale::new("Maison", 0.0, "06400", 140.0)
                .in_commune(Some("Cannes"))
                .at(7.0200, 43.5600)
        },
        Sale {
            surface: None,
            ..Sale::new("Appartement", 150_000.0, "06400", 0.0)
                .in_commune(Some("Cannes"))
                .at(7.0190, 43.5530)
        },
        Sale::new("Local industriel. commercial ou assimilé", 400_000.0, "06200", 300.0)
            .at(7.2200, 43.6800),
        Sale::new("Maison", 610_000.0, "06400", 180.0)
            .in_commune(Some("Cannes"))
            .at(7.0100, 43.5550),
        Sale::new("Appartement", 95_000.0, "06300", 0.0).at(7.2850, 43.6990),
    ])
}

pub fn raw_dataset(sales: &[Sale]) -> RawDataset {
    RawDataset::new(key("06", 2023), sales_frame(sales)).unwrap()
}

pub fn normalized(sales: &[Sale], mode: ValueMode) -> NormalizedDataset {
    normalize(&clean(&raw_dataset(sales)).unwrap(), mode).unwrap()
}

/// Absolute-mode dataset whose value column holds exactly `values`
pub fn values_dataset(values: &[f64]) -> NormalizedDataset {
    let sales: Vec<Sale> = values
        .iter()
        .map(|value| Sale::new("Maison", *value, "06000", 100.0))
        .collect();
    normalized(&sales, ValueMode::Absolute)
}

pub fn f64_values(frame: &DataFrame, name: &str) -> Vec<Option<f64>> {
    let column = frame.column(name).unwrap().as_materialized_series().clone();
    column.f64().unwrap().into_iter().collect()
}

pub fn str_values(frame: &DataFrame, name: &str) -> Vec<Option<String>> {
    let column = frame.column(name).unwrap().as_materialized_series().clone();
    column
        .str()
        .unwrap()
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect()
}

/// In-memory source that counts fetches
pub struct CountingSource {
    payloads: HashMap<DatasetKey, Vec<u8>>,
    fallback: Option<Vec<u8>>,
    calls: Cell<usize>,
}

impl CountingSource {
    /// Serve the same payload for every key
    pub fn with_payload(payload: Vec<u8>) -> Self {
        Self {
            payloads: HashMap::new(),
            fallback: Some(payload),
            calls: Cell::new(0),
        }
    }

    /// Fail every fetch
    pub fn failing() -> Self {
        Self {
            payloads: HashMap::new(),
            fallback: None,
            calls: Cell::new(0),
        }
    }

    /// Serve a payload for one key only
    pub fn with_dataset(mut self, key: DatasetKey, payload: Vec<u8>) -> Self {
        self.payloads.insert(key, payload);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl TransactionSource for CountingSource {
    fn fetch(&self, key: &DatasetKey) -> Result<Vec<u8>> {
        self.calls.set(self.calls.get() + 1);
        self.payloads
            .get(key)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| {
                ExplorerError::fetch_unavailable(key.department.as_str(), key.year, "offline")
            })
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
