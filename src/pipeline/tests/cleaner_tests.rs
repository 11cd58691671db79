//! Tests for transaction cleaning

use super::*;
use crate::constants::columns::REQUIRED;
use crate::pipeline::CleanedDataset;

fn clean_csv() -> CleanedDataset {
    let raw = RawDataset::from_payload(key("06", 2023), transactions_csv()).unwrap();
    clean(&raw).unwrap()
}

#[test]
fn test_clean_counts_dropped_rows() {
    let cleaned = clean_csv();
    let stats = cleaned.stats();

    assert_eq!(stats.input_rows, 10);
    assert_eq!(stats.incomplete_rows, 2);
    assert_eq!(stats.duplicate_rows, 1);
    assert_eq!(stats.output_rows, 7);
    assert_eq!(cleaned.height(), 7);
}

#[test]
fn test_cleaned_postal_codes_are_five_characters() {
    let cleaned = clean_csv();
    let postal_codes = str_values(cleaned.frame(), POSTAL_CODE);

    for code in &postal_codes {
        let code = code.as_ref().expect("postal code must be present");
        assert_eq!(code.len(), 5, "postal code {:?}", code);
    }
    assert!(postal_codes.contains(&Some("06100".to_string())));
}

#[test]
fn test_cleaned_rows_have_every_required_field() {
    let cleaned = clean_csv();
    for name in REQUIRED {
        assert_eq!(
            cleaned.frame().column(name).unwrap().null_count(),
            0,
            "column {} has nulls",
            name
        );
    }
}

#[test]
fn test_cleaned_rows_are_sorted_by_postal_code() {
    let cleaned = clean_csv();
    let postal_codes: Vec<String> = str_values(cleaned.frame(), POSTAL_CODE)
        .into_iter()
        .flatten()
        .collect();

    let mut sorted = postal_codes.clone();
    sorted.sort();
    assert_eq!(postal_codes, sorted);
}

#[test]
fn test_cleaning_is_idempotent() {
    let once = clean_csv();
    let again = clean(&RawDataset::new(key("06", 2023), once.frame().clone()).unwrap()).unwrap();

    assert!(once.frame().equals_missing(again.frame()));
    assert_eq!(again.stats().incomplete_rows, 0);
    assert_eq!(again.stats().duplicate_rows, 0);
}

#[test]
fn test_duplicates_keep_last_occurrence() {
    let raw = raw_dataset(&[
        Sale::new("Maison", 300_000.0, "06000", 90.0).at(7.1, 43.1),
        Sale::new("Appartement", 150_000.0, "06000", 40.0).at(7.2, 43.2),
        Sale::new("Appartement", 300_000.0, "06000", 95.0).at(7.1, 43.1),
    ]);
    let cleaned = clean(&raw).unwrap();

    assert_eq!(cleaned.height(), 2);
    assert_eq!(cleaned.stats().duplicate_rows, 1);

    let types = str_values(cleaned.frame(), PROPERTY_TYPE);
    let surfaces = f64_values(cleaned.frame(), BUILT_SURFACE);
    let kept = types
        .iter()
        .zip(&surfaces)
        .find(|(_, surface)| **surface == Some(95.0))
        .expect("last duplicate kept");
    assert_eq!(kept.0.as_deref(), Some("Appartement"));
    assert!(!surfaces.contains(&Some(90.0)));
}

#[test]
fn test_same_price_elsewhere_is_not_a_duplicate() {
    let raw = raw_dataset(&[
        Sale::new("Maison", 300_000.0, "06000", 90.0).at(7.1, 43.1),
        Sale::new("Maison", 300_000.0, "06000", 90.0).at(7.1, 43.2),
    ]);
    assert_eq!(clean(&raw).unwrap().height(), 2);
}

#[test]
fn test_unparseable_postal_code_counts_as_missing() {
    let raw = raw_dataset(&[
        Sale::new("Maison", 300_000.0, "NICE1", 90.0),
        Sale::new("Maison", 310_000.0, "6000", 90.0),
        Sale::new("Maison", 320_000.0, "123456", 90.0),
    ]);
    let cleaned = clean(&raw).unwrap();

    assert_eq!(cleaned.height(), 1);
    assert_eq!(cleaned.stats().incomplete_rows, 2);
    assert_eq!(
        str_values(cleaned.frame(), POSTAL_CODE),
        vec![Some("06000".to_string())]
    );
}

#[test]
fn test_missing_commune_is_kept() {
    let raw = raw_dataset(&[Sale::new("Maison", 300_000.0, "06000", 90.0).in_commune(None)]);
    let cleaned = clean(&raw).unwrap();

    assert_eq!(cleaned.height(), 1);
    assert_eq!(str_values(cleaned.frame(), COMMUNE_NAME), vec![None]);
}

#[test]
fn test_missing_coordinates_are_dropped() {
    let raw = raw_dataset(&[
        Sale::new("Maison", 300_000.0, "06000", 90.0).without_coordinates(),
        Sale::new("Maison", 310_000.0, "06000", 90.0),
    ]);
    let cleaned = clean(&raw).unwrap();
    assert_eq!(cleaned.height(), 1);
    assert_eq!(cleaned.stats().incomplete_rows, 1);
}

#[test]
fn test_all_invalid_rows_is_an_error() {
    let raw = raw_dataset(&[Sale {
        price: None,
        ..Sale::new("Maison", 0.0, "06000", 90.0)
    }]);

    match clean(&raw) {
        Err(ExplorerError::AllRowsInvalid { department, year }) => {
            assert_eq!(department, "06");
            assert_eq!(year, 2023);
        }
        other => panic!("Expected AllRowsInvalid, got {:?}", other.map(|c| c.height())),
    }
}
