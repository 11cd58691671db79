//! Command-line interface components.
//!
//! The binary is a terminal stand-in for the presentation layer: it runs a
//! single request through an `ExplorerSession` and prints the prepared views.

use crate::config::ExplorerConfig;
use crate::constants::{DEFAULT_DEPARTMENT, DEFAULT_YEAR};
use crate::error::Result;
use crate::models::DepartmentCode;
use crate::session::ExplorerRequest;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dvf-explorer")]
#[command(about = "Explore French real-estate transaction prices by department and year")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Department code (e.g. 06, 75, 2A, 974)
    #[arg(value_name = "DEPARTMENT", default_value = DEFAULT_DEPARTMENT)]
    pub department: String,

    /// Transaction year
    #[arg(short, long, default_value_t = DEFAULT_YEAR)]
    pub year: i32,

    /// Property type to focus on (defaults to Maison when present)
    #[arg(short = 't', long)]
    pub property_type: Option<String>,

    /// Postal code for the per-type detail table (defaults to the first one)
    #[arg(short = 'p', long)]
    pub postal_code: Option<String>,

    /// Report absolute prices instead of price per m²
    #[arg(long)]
    pub absolute: bool,

    /// Keep high outliers on the map
    #[arg(long)]
    pub keep_outliers: bool,

    /// Also remove high outliers before computing aggregates
    #[arg(long)]
    pub filter_aggregates: bool,

    /// Jitter map coordinates so co-located sales do not overlap
    #[arg(long)]
    pub jitter: bool,

    /// Read transactions from a local mirror instead of downloading them
    #[arg(long, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the per-department transaction files
    #[arg(long, value_name = "URL")]
    pub transactions_url: Option<String>,

    /// Summary table for trend metrics (local path or URL)
    #[arg(long, value_name = "PATH_OR_URL")]
    pub summary: Option<String>,

    /// JSON configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Maximum rows printed per table
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    /// Layer command-line overrides on top of the file (or default) configuration
    pub fn build_config(&self) -> Result<ExplorerConfig> {
        let mut config = match &self.config {
            Some(path) => ExplorerConfig::from_file(path)?,
            None => ExplorerConfig::default(),
        };

        if let Some(data_dir) = &self.data_dir {
            config.data_dir = Some(data_dir.clone());
        }
        if let Some(url) = &self.transactions_url {
            config.transactions_url = url.clone();
        }
        if let Some(summary) = &self.summary {
            config.summary_url = Some(summary.clone());
        }
        if self.filter_aggregates {
            config.filter_outliers_in_aggregates = true;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn to_request(&self) -> Result<ExplorerRequest> {
        Ok(ExplorerRequest {
            department: DepartmentCode::parse(&self.department)?,
            year: self.year,
            property_type: self.property_type.clone(),
            postal_code: self.postal_code.clone(),
            normalize_by_area: !self.absolute,
            remove_map_outliers: !self.keep_outliers,
            jitter: self.jitter,
        })
    }
}

/// Set up structured logging on stderr
pub fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dvf_explorer={}", args.get_log_level())));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Terminal and JSON rendering of an `ExplorerView`
pub mod report {
    use crate::constants::property_type_display_name;
    use crate::models::{
        AggregateRow, CleaningStats, Fence, HistoryPoint, ValueMode, YearlyDifferential,
    };
    use crate::session::{ExplorerRequest, ExplorerView, ViewState};
    use colored::*;
    use serde::Serialize;

    /// Serializable digest of a view (row-level frames are summarized)
    #[derive(Debug, Serialize)]
    pub struct ViewReport<'a> {
        pub request: &'a ExplorerRequest,
        pub value_mode: ValueMode,
        pub property_types: &'a [String],
        pub selected_property_type: Option<&'a str>,
        pub cleaning: Option<&'a CleaningStats>,
        pub map: ViewState<MapSummary>,
        pub department_medians: &'a ViewState<Vec<AggregateRow>>,
        pub postal_codes: &'a ViewState<Vec<AggregateRow>>,
        pub communes: &'a ViewState<Vec<AggregateRow>>,
        pub selected_postal_code: Option<&'a str>,
        pub postal_code_types: &'a ViewState<Vec<AggregateRow>>,
        pub trend: &'a ViewState<YearlyDifferential>,
        pub history: &'a ViewState<Vec<HistoryPoint>>,
    }

    #[derive(Debug, Serialize)]
    pub struct MapSummary {
        pub points: usize,
        pub fence: Option<Fence>,
        pub removed_rows: usize,
    }

    impl<'a> ViewReport<'a> {
        pub fn new(view: &'a ExplorerView) -> Self {
            let map = match &view.map {
                ViewState::Ready(map) => ViewState::Ready(MapSummary {
                    points: map.frame.height(),
                    fence: map.fence,
                    removed_rows: map.removed_rows,
                }),
                ViewState::Unavailable(reason) => ViewState::Unavailable(reason.clone()),
            };

            Self {
                request: &view.request,
                value_mode: view.value_mode,
                property_types: &view.property_types,
                selected_property_type: view.selected_property_type.as_deref(),
                cleaning: view.cleaning.as_ref(),
                map,
                department_medians: &view.department_medians,
                postal_codes: &view.postal_codes,
                communes: &view.communes,
                selected_postal_code: view.selected_postal_code.as_deref(),
                postal_code_types: &view.postal_code_types,
                trend: &view.trend,
                history: &view.history,
            }
        }
    }

    pub fn to_json(view: &ExplorerView) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&ViewReport::new(view))
    }

    /// Print the view as coloured text tables
    pub fn print_text(view: &ExplorerView, limit: usize) {
        let unit = view.value_mode.unit_label();

        println!(
            "{} {} {}",
            "Department".bright_green().bold(),
            view.request.department.to_string().bright_white().bold(),
            view.request.year.to_string().bright_white().bold()
        );

        if let Some(stats) = &view.cleaning {
            println!(
                "  {} {} kept of {} ({} incomplete, {} duplicates)",
                "Transactions:".bright_cyan(),
                stats.output_rows.to_string().bright_white(),
                stats.input_rows,
                stats.incomplete_rows,
                stats.duplicate_rows
            );
        }
        if !view.property_types.is_empty() {
            let names: Vec<&str> = view
                .property_types
                .iter()
                .map(|t| property_type_display_name(t))
                .collect();
            println!("  {} {}", "Property types:".bright_cyan(), names.join(", "));
        }
        if let Some(selected) = &view.selected_property_type {
            println!(
                "  {} {}",
                "Selected:".bright_cyan(),
                property_type_display_name(selected).bright_white()
            );
        }

        println!("\n{}", "Map".bright_yellow());
        match &view.map {
            ViewState::Ready(map) => {
                println!("  {} {}", "Markers:".bright_cyan(), map.frame.height());
                if let Some(fence) = &map.fence {
                    println!(
                        "  {} {:.0} {} (Q1 {:.0}, Q3 {:.0}), {} outliers hidden",
                        "Upper fence:".bright_cyan(),
                        fence.upper,
                        unit,
                        fence.q1,
                        fence.q3,
                        map.removed_rows
                    );
                }
            }
            ViewState::Unavailable(reason) => println!("  {}", reason.bright_red()),
        }

        println!("\n{}", "Trend".bright_yellow());
        match &view.trend {
            ViewState::Ready(trend) => {
                match trend.annual_average_diff {
                    Some(diff) => println!(
                        "  {} {:+.0} {}/year",
                        "Average annual change:".bright_cyan(),
                        diff,
                        unit
                    ),
                    None => println!("  {} NA", "Average annual change:".bright_cyan()),
                }
                println!(
                    "  {} {}",
                    format!("Change since {}:", trend.target_year - 1).bright_cyan(),
                    trend.percentage_diff
                );
            }
            ViewState::Unavailable(reason) => println!("  {}", reason.bright_black()),
        }

        println!("\n{}", "Price history".bright_yellow());
        match &view.history {
            ViewState::Ready(points) => {
                for point in points {
                    let value = point
                        .value
                        .map(|value| format!("{:.0} {}", value, unit))
                        .unwrap_or_else(|| "NA".to_string());
                    println!(
                        "  {} {:<18} {}",
                        point.year,
                        property_type_display_name(&point.property_type),
                        value
                    );
                }
            }
            ViewState::Unavailable(reason) => println!("  {}", reason.bright_black()),
        }

        print_table("Median by postal code and type", &view.department_medians, unit, limit);
        print_table("Postal codes", &view.postal_codes, unit, limit);
        print_table("Communes", &view.communes, unit, limit);

        let detail = match &view.selected_postal_code {
            Some(postal_code) => format!("Postal code {} by type", postal_code),
            None => "Postal code by type".to_string(),
        };
        print_table(&detail, &view.postal_code_types, unit, limit);
    }

    fn print_table(title: &str, rows: &ViewState<Vec<AggregateRow>>, unit: &str, limit: usize) {
        println!("\n{}", title.bright_yellow());
        let rows = match rows {
            ViewState::Ready(rows) => rows,
            ViewState::Unavailable(reason) => {
                println!("  {}", reason.bright_red());
                return;
            }
        };

        println!(
            "  {:<24} {:<18} {:>6} {:>12} {:>12} {:>12} {:>9}",
            "Key", "Type", "Count", "Median", "Mean", "Std", "Surface"
        );
        for row in rows.iter().take(limit) {
            let std = row
                .std_value
                .map(|std| format!("{:.0}", std))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<24} {:<18} {:>6} {:>12.0} {:>12.0} {:>12} {:>9.1}",
                row.key.as_deref().unwrap_or("?"),
                row.property_type
                    .as_deref()
                    .map(property_type_display_name)
                    .unwrap_or(""),
                row.count,
                row.median_value,
                row.mean_value,
                std,
                row.median_surface
            );
        }
        if rows.len() > limit {
            println!(
                "  {} ({} {})",
                format!("... {} more rows", rows.len() - limit).bright_black(),
                "values in",
                unit
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults_map_to_request() {
        let args = Args::parse_from(["dvf-explorer"]);
        let request = args.to_request().unwrap();
        assert_eq!(request.department.as_str(), "06");
        assert_eq!(request.year, DEFAULT_YEAR);
        assert!(request.normalize_by_area);
        assert!(request.remove_map_outliers);
        assert!(!request.jitter);
    }

    #[test]
    fn test_flags_map_to_request_and_config() {
        let args = Args::parse_from([
            "dvf-explorer",
            "2a",
            "--year",
            "2022",
            "--absolute",
            "--keep-outliers",
            "--filter-aggregates",
            "-t",
            "Appartement",
            "--postal-code",
            "20000",
        ]);
        let request = args.to_request().unwrap();
        assert_eq!(request.department.as_str(), "2A");
        assert_eq!(request.property_type.as_deref(), Some("Appartement"));
        assert_eq!(request.postal_code.as_deref(), Some("20000"));
        assert!(!request.normalize_by_area);
        assert!(!request.remove_map_outliers);

        let config = args.build_config().unwrap();
        assert!(config.filter_outliers_in_aggregates);
    }

    #[test]
    fn test_invalid_department_is_rejected() {
        let args = Args::parse_from(["dvf-explorer", "99"]);
        assert!(args.to_request().is_err());
    }

    #[test]
    fn test_log_level() {
        assert_eq!(Args::parse_from(["dvf-explorer", "-v"]).get_log_level(), "debug");
        assert_eq!(Args::parse_from(["dvf-explorer", "-q"]).get_log_level(), "warn");
        assert_eq!(Args::parse_from(["dvf-explorer"]).get_log_level(), "info");
    }
}
