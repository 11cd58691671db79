//! Application constants for the DVF explorer
//!
//! Column names, source-file conventions, default values and
//! property type mappings used throughout the pipeline.

// =============================================================================
// Internal Column Names
// =============================================================================

/// Columns of the internal transaction schema, after mapping
pub mod columns {
    pub const PROPERTY_TYPE: &str = "property_type";
    pub const PRICE: &str = "price";
    pub const POSTAL_CODE: &str = "postal_code";
    pub const COMMUNE_NAME: &str = "commune_name";
    pub const BUILT_SURFACE: &str = "built_surface";
    pub const LONGITUDE: &str = "longitude";
    pub const LATITUDE: &str = "latitude";

    /// Value column in effect after normalization (absolute or per area)
    pub const VALUE: &str = "value";

    /// Map-only derived columns
    pub const MAP_LATITUDE: &str = "map_latitude";
    pub const MAP_LONGITUDE: &str = "map_longitude";
    pub const LABEL: &str = "label";

    /// Columns that must be non-null for a transaction to be kept
    pub const REQUIRED: &[&str] = &[
        PROPERTY_TYPE,
        PRICE,
        POSTAL_CODE,
        BUILT_SURFACE,
        LONGITUDE,
        LATITUDE,
    ];

    /// Composite key used for deduplication
    pub const DEDUP_KEY: &[&str] = &[PRICE, LONGITUDE, LATITUDE];
}

/// Columns of the internal summary-table schema
pub mod summary_columns {
    pub const DEPARTMENT_CODE: &str = "department_code";
    pub const PROPERTY_TYPE: &str = "property_type";
    pub const YEAR: &str = "year";
    pub const MEDIAN_VALUE: &str = "median_value";
    pub const MEDIAN_VALUE_PER_AREA: &str = "median_value_per_area";
}

// =============================================================================
// Aggregate Output Columns
// =============================================================================

pub mod aggregate_columns {
    pub const COUNT: &str = "count";
    pub const MEDIAN_VALUE: &str = "median_value";
    pub const MEAN_VALUE: &str = "mean_value";
    pub const STD_VALUE: &str = "std_value";
    pub const MEDIAN_SURFACE: &str = "median_surface";
    pub const MEAN_SURFACE: &str = "mean_surface";
}

// =============================================================================
// Data Sources
// =============================================================================

/// Default base URL of the geolocated DVF open-data export
pub const DEFAULT_TRANSACTIONS_URL: &str = "https://files.data.gouv.fr/geo-dvf/latest/csv";

/// Name of the pre-aggregated multi-year summary file
pub const SUMMARY_FILE_NAME: &str = "geo_dvf_summarized_full.csv.gz";

/// Directory name of the local data root under the user data directory
pub const DATA_DIR_NAME: &str = "dvf-explorer";

/// Gzip magic bytes
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Relative path of a department file inside a source root
pub fn department_file_path(department: &str, year: i32) -> String {
    format!("{}/departements/{}.csv.gz", year, department)
}

// =============================================================================
// Request Defaults
// =============================================================================

/// Years published by data.gouv.fr
pub const AVAILABLE_YEARS: &[i32] = &[2020, 2021, 2022, 2023, 2024];

/// Most recent published year
pub const DEFAULT_YEAR: i32 = 2024;

pub const DEFAULT_DEPARTMENT: &str = "06";

pub const DEFAULT_PROPERTY_TYPE: &str = "Maison";

/// Interquartile-range multiplier of the upper fence
pub const DEFAULT_FENCE_MULTIPLIER: f64 = 1.5;

/// Coordinate jitter amplitude for map markers, in degrees
pub const DEFAULT_JITTER_DEGREES: f64 = 0.01;

/// Number of (department, year) payloads kept in the fetch cache
pub const DEFAULT_CACHE_CAPACITY: usize = 8;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// User-facing message shown when a configuration has nothing to display
pub fn no_data_message(department: &str, year: i32) -> String {
    format!(
        "No data available for department {} in {}. Select another configuration.",
        department, year
    )
}

// =============================================================================
// Property Types
// =============================================================================

/// Source property type labels and their short display names
pub const PROPERTY_TYPE_DISPLAY_NAMES: &[(&str, &str)] = &[
    ("Appartement", "Appartement"),
    ("Maison", "Maison"),
    ("Local industriel. commercial ou assimilé", "Local commercial"),
    ("Dépendance", "Dépendance"),
];

/// Short display name for a property type, falling back to the source label
pub fn property_type_display_name(property_type: &str) -> &str {
    PROPERTY_TYPE_DISPLAY_NAMES
        .iter()
        .find(|(source, _)| *source == property_type)
        .map(|(_, display)| *display)
        .unwrap_or(property_type)
}
