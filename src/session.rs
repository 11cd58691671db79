//! Per-interaction orchestration of the pipeline.
//!
//! Each user interaction is one immutable `ExplorerRequest` run through
//! fetch → clean → normalize → {map filter, aggregations, trend}. The
//! department price history comes from the summary table alone. Failures
//! degrade the affected view to `ViewState::Unavailable` and never abort
//! the session; persisting selections between runs is the caller's job.

use crate::config::ExplorerConfig;
use crate::constants::no_data_message;
use crate::error::{ExplorerError, Result};
use crate::models::{
    AggregateRow, CleaningStats, DatasetKey, DepartmentCode, Fence, GroupingKey, HistoryPoint,
    ValueMode, YearlyDifferential,
};
use crate::pipeline::{
    self, MapOptions, NormalizedDataset, SummaryTable, ValueFrame, aggregate, filter_outliers,
    prepare_map, property_types,
};
use crate::source::{FetchCache, TransactionSource};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// User selections for one interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerRequest {
    pub department: DepartmentCode,
    pub year: i32,
    /// Selected property type; the configured default is used when absent
    /// or not present in the data
    pub property_type: Option<String>,
    /// Postal code for the per-type detail view; the first available code
    /// is used when absent or not present in the data
    #[serde(default)]
    pub postal_code: Option<String>,
    pub normalize_by_area: bool,
    pub remove_map_outliers: bool,
    pub jitter: bool,
}

impl ExplorerRequest {
    pub fn new(department: DepartmentCode, year: i32) -> Self {
        Self {
            department,
            year,
            property_type: None,
            postal_code: None,
            normalize_by_area: true,
            remove_map_outliers: true,
            jitter: false,
        }
    }

    pub fn key(&self) -> DatasetKey {
        DatasetKey::new(self.department.clone(), self.year)
    }

    pub fn value_mode(&self) -> ValueMode {
        ValueMode::from_flag(self.normalize_by_area)
    }
}

/// A prepared view, or the reason it cannot be shown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ViewState<T> {
    Ready(T),
    Unavailable(String),
}

impl<T> ViewState<T> {
    fn from_result(result: Result<T>, request: &ExplorerRequest) -> Self {
        match result {
            Ok(value) => ViewState::Ready(value),
            Err(error) => ViewState::Unavailable(user_message(&error, request)),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            ViewState::Ready(value) => Some(value),
            ViewState::Unavailable(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ViewState::Ready(_))
    }
}

/// Map markers for the selected property type
#[derive(Debug, Clone)]
pub struct MapView {
    pub frame: DataFrame,
    pub fence: Option<Fence>,
    pub removed_rows: usize,
}

/// Everything the presentation layer renders for one request
#[derive(Debug, Clone)]
pub struct ExplorerView {
    pub request: ExplorerRequest,
    pub value_mode: ValueMode,
    pub property_types: Vec<String>,
    pub selected_property_type: Option<String>,
    pub cleaning: Option<CleaningStats>,
    /// Row-level data for distribution plots
    pub dataset: ViewState<NormalizedDataset>,
    pub map: ViewState<MapView>,
    /// Median by postal code and property type, for the department line chart
    pub department_medians: ViewState<Vec<AggregateRow>>,
    /// Statistics by postal code for the selected property type
    pub postal_codes: ViewState<Vec<AggregateRow>>,
    /// Statistics by commune and property type
    pub communes: ViewState<Vec<AggregateRow>>,
    pub selected_postal_code: Option<String>,
    /// Every transaction in the selected postal code, across property types
    pub postal_code_dataset: ViewState<NormalizedDataset>,
    /// Statistics by property type within the selected postal code
    pub postal_code_types: ViewState<Vec<AggregateRow>>,
    pub trend: ViewState<YearlyDifferential>,
    /// Yearly medians by property type for the department
    pub history: ViewState<Vec<HistoryPoint>>,
}

impl ExplorerView {
    fn unavailable(
        request: &ExplorerRequest,
        reason: String,
        history: ViewState<Vec<HistoryPoint>>,
    ) -> Self {
        Self {
            request: request.clone(),
            value_mode: request.value_mode(),
            property_types: Vec::new(),
            selected_property_type: None,
            cleaning: None,
            dataset: ViewState::Unavailable(reason.clone()),
            map: ViewState::Unavailable(reason.clone()),
            department_medians: ViewState::Unavailable(reason.clone()),
            postal_codes: ViewState::Unavailable(reason.clone()),
            communes: ViewState::Unavailable(reason.clone()),
            selected_postal_code: None,
            postal_code_dataset: ViewState::Unavailable(reason.clone()),
            postal_code_types: ViewState::Unavailable(reason.clone()),
            trend: ViewState::Unavailable(reason),
            history,
        }
    }
}

/// Single-user exploration session owning the fetch cache
pub struct ExplorerSession<S: TransactionSource> {
    config: ExplorerConfig,
    source: S,
    cache: FetchCache,
    summary: Option<SummaryTable>,
}

impl<S: TransactionSource> ExplorerSession<S> {
    pub fn new(config: ExplorerConfig, source: S) -> Self {
        let cache = FetchCache::new(config.cache_capacity);
        Self {
            config,
            source,
            cache,
            summary: None,
        }
    }

    /// Attach the multi-year summary table used for trend metrics
    pub fn with_summary(mut self, summary: SummaryTable) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Drop the cached dataset for one key
    pub fn invalidate(&mut self, key: &DatasetKey) -> bool {
        self.cache.invalidate(key).is_some()
    }

    /// Run one interaction through the pipeline
    pub fn run(&mut self, request: &ExplorerRequest) -> ExplorerView {
        if let Err(error) = self.config.check_year(request.year) {
            warn!("Rejected request: {}", error);
            let reason = error.to_string();
            return ExplorerView::unavailable(
                request,
                reason.clone(),
                ViewState::Unavailable(reason),
            );
        }

        let history = self.build_history(request);

        let key = request.key();
        let raw = match self.cache.get_or_fetch(&key, &self.source) {
            Ok(raw) => raw,
            Err(error) => {
                warn!("Fetch failed for {}: {}", key, error);
                let reason = user_message(&error, request);
                return ExplorerView::unavailable(request, reason, history);
            }
        };

        let cleaned = match pipeline::clean(&raw) {
            Ok(cleaned) => cleaned,
            Err(error) => {
                warn!("Cleaning failed for {}: {}", key, error);
                let reason = user_message(&error, request);
                return ExplorerView::unavailable(request, reason, history);
            }
        };

        let mode = request.value_mode();
        let normalized = match pipeline::normalize(&cleaned, mode) {
            Ok(normalized) => normalized,
            Err(error) => {
                warn!("Normalization failed for {}: {}", key, error);
                let reason = user_message(&error, request);
                return ExplorerView::unavailable(request, reason, history);
            }
        };

        let available_types = property_types(&normalized).unwrap_or_default();
        let selected = self.select_property_type(request, &available_types);

        let map = ViewState::from_result(
            self.build_map(&normalized, request, selected.as_deref()),
            request,
        );
        let department_medians = ViewState::from_result(
            self.aggregate_view(&normalized, GroupingKey::PostalCodeAndType, None),
            request,
        );
        let postal_codes = ViewState::from_result(
            self.aggregate_view(&normalized, GroupingKey::PostalCode, selected.as_deref()),
            request,
        );
        let communes = ViewState::from_result(
            self.aggregate_view(&normalized, GroupingKey::CommuneAndType, None),
            request,
        );
        let available_postal_codes = pipeline::postal_codes(&normalized).unwrap_or_default();
        let selected_postal_code = select_postal_code(request, &available_postal_codes);
        let (postal_code_dataset, postal_code_types) =
            match self.postal_code_slice(&normalized, request, selected_postal_code.as_deref()) {
                Ok(slice) => {
                    let types = ViewState::from_result(
                        self.aggregate_view(&slice, GroupingKey::PostalCodeAndType, None),
                        request,
                    );
                    (ViewState::Ready(slice), types)
                }
                Err(error) => {
                    let reason = user_message(&error, request);
                    (
                        ViewState::Unavailable(reason.clone()),
                        ViewState::Unavailable(reason),
                    )
                }
            };
        let trend = self.build_trend(request, selected.as_deref(), mode);

        info!(
            "Prepared views for {} ({} transactions, {:?})",
            key,
            normalized.height(),
            mode
        );

        ExplorerView {
            request: request.clone(),
            value_mode: mode,
            property_types: available_types,
            selected_property_type: selected,
            cleaning: Some(cleaned.stats().clone()),
            dataset: ViewState::Ready(normalized),
            map,
            department_medians,
            postal_codes,
            communes,
            selected_postal_code,
            postal_code_dataset,
            postal_code_types,
            trend,
            history,
        }
    }

    fn select_property_type(
        &self,
        request: &ExplorerRequest,
        available: &[String],
    ) -> Option<String> {
        let contains = |candidate: &str| available.iter().any(|t| t == candidate);

        request
            .property_type
            .as_deref()
            .filter(|requested| contains(requested))
            .or_else(|| {
                Some(self.config.default_property_type.as_str())
                    .filter(|default| contains(default))
            })
            .map(str::to_string)
            .or_else(|| available.first().cloned())
    }

    fn build_map(
        &self,
        normalized: &NormalizedDataset,
        request: &ExplorerRequest,
        property_type: Option<&str>,
    ) -> Result<MapView> {
        let property_type = property_type.ok_or_else(|| ExplorerError::AllRowsInvalid {
            department: request.department.to_string(),
            year: request.year,
        })?;
        let selected = normalized.for_property_type(property_type)?;

        let options = MapOptions {
            jitter_degrees: if request.jitter {
                self.config.jitter_degrees
            } else {
                0.0
            },
            seed: self.config.jitter_seed,
        };

        if request.remove_map_outliers {
            let filtered = filter_outliers(&selected, self.config.fence_multiplier)?;
            Ok(MapView {
                frame: prepare_map(&filtered, &options)?,
                fence: filtered.fence().copied(),
                removed_rows: filtered.removed_rows(),
            })
        } else {
            Ok(MapView {
                frame: prepare_map(&selected, &options)?,
                fence: None,
                removed_rows: 0,
            })
        }
    }

    fn aggregate_view(
        &self,
        normalized: &NormalizedDataset,
        key: GroupingKey,
        property_type: Option<&str>,
    ) -> Result<Vec<AggregateRow>> {
        let scoped = match property_type {
            Some(property_type) => normalized.for_property_type(property_type)?,
            None => normalized.clone(),
        };

        if self.config.filter_outliers_in_aggregates {
            let filtered = filter_outliers(&scoped, self.config.fence_multiplier)?;
            aggregate(&filtered, key)
        } else {
            aggregate(&scoped, key)
        }
    }

    fn postal_code_slice(
        &self,
        normalized: &NormalizedDataset,
        request: &ExplorerRequest,
        postal_code: Option<&str>,
    ) -> Result<NormalizedDataset> {
        let postal_code = postal_code.ok_or_else(|| ExplorerError::AllRowsInvalid {
            department: request.department.to_string(),
            year: request.year,
        })?;
        normalized.for_postal_code(postal_code)
    }

    fn build_history(&self, request: &ExplorerRequest) -> ViewState<Vec<HistoryPoint>> {
        let Some(summary) = &self.summary else {
            return ViewState::Unavailable("Summary table not loaded".to_string());
        };

        match summary.history(&request.department, request.value_mode()) {
            Ok(points) if points.is_empty() => ViewState::Unavailable(format!(
                "No price history for department {}",
                request.department
            )),
            Ok(points) => ViewState::Ready(points),
            Err(error) => ViewState::Unavailable(user_message(&error, request)),
        }
    }

    fn build_trend(
        &self,
        request: &ExplorerRequest,
        property_type: Option<&str>,
        mode: ValueMode,
    ) -> ViewState<YearlyDifferential> {
        let Some(summary) = &self.summary else {
            return ViewState::Unavailable("Summary table not loaded".to_string());
        };
        let Some(property_type) = property_type else {
            return ViewState::Unavailable(no_data_message(
                request.department.as_str(),
                request.year,
            ));
        };

        match summary.differential(&request.department, property_type, request.year, mode) {
            Ok(Some(differential)) => ViewState::Ready(differential),
            Ok(None) => ViewState::Unavailable(format!(
                "No price history for {} in department {}",
                property_type, request.department
            )),
            Err(error) => ViewState::Unavailable(user_message(&error, request)),
        }
    }
}

fn select_postal_code(request: &ExplorerRequest, available: &[String]) -> Option<String> {
    request
        .postal_code
        .as_ref()
        .filter(|requested| available.contains(requested))
        .or_else(|| available.first())
        .cloned()
}

/// Message shown to the user for a pipeline error
pub fn user_message(error: &ExplorerError, request: &ExplorerRequest) -> String {
    if error.is_no_data() {
        no_data_message(request.department.as_str(), request.year)
    } else {
        error.to_string()
    }
}
