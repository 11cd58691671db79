use anyhow::{Context, Result};
use clap::Parser;
use dvf_explorer::ExplorerSession;
use dvf_explorer::cli::{Args, OutputFormat, report, setup_logging};
use dvf_explorer::config::ExplorerConfig;
use dvf_explorer::pipeline::SummaryTable;
use dvf_explorer::source::{DirectorySource, HttpSource, TransactionSource};
use std::path::Path;
use std::process;
use std::time::Duration;
use tracing::{info, warn};

fn main() {
    let args = Args::parse();
    setup_logging(&args);

    if let Err(error) = run(&args) {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.build_config().context("Invalid configuration")?;
    let request = args.to_request()?;
    let timeout = Duration::from_secs(config.http_timeout_secs);

    let http = HttpSource::new(config.transactions_url.clone(), timeout)
        .context("Failed to build HTTP client")?;
    let source: Box<dyn TransactionSource> = match &config.data_dir {
        Some(dir) => Box::new(DirectorySource::new(dir)),
        None => Box::new(http.clone()),
    };
    info!("Reading transactions from {}", source.describe());

    let summary = load_summary(&config, &http);
    let mut session = ExplorerSession::new(config, source);
    if let Some(summary) = summary {
        session = session.with_summary(summary);
    }

    let view = session.run(&request);
    match args.format {
        OutputFormat::Text => report::print_text(&view, args.limit),
        OutputFormat::Json => println!("{}", report::to_json(&view)?),
    }

    Ok(())
}

/// Load the summary table from a local path or URL; trend metrics are
/// simply omitted when it cannot be read
fn load_summary(config: &ExplorerConfig, http: &HttpSource) -> Option<SummaryTable> {
    let location = config.summary_location()?;

    let result = if location.starts_with("http://") || location.starts_with("https://") {
        http.download(&location).and_then(SummaryTable::from_payload)
    } else {
        SummaryTable::from_path(Path::new(&location))
    };

    match result {
        Ok(summary) => Some(summary),
        Err(error) => {
            warn!("Summary table unavailable ({}): {}", location, error);
            None
        }
    }
}
