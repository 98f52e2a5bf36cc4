//! # Job Scrape
//!
//! Collects public job listings from a paginated guest search endpoint,
//! extracts structured records from each results page, deduplicates them, and
//! exports the result as CSV (and optionally JSON).
//!
//! ## Usage
//!
//! ```sh
//! job_scrape "Rust Engineer" -l Berlin -n 100 -e mid-senior --json
//! ```
//!
//! ## Architecture
//!
//! The run is a strictly sequential pipeline, one page at a time:
//! 1. **Transport**: fetch a results page with retry and failure classification
//! 2. **Extraction**: pull records out of the page's `<li>` cards via fallback rules
//! 3. **Aggregation**: deduplicate by URL, decide whether to fetch another page
//! 4. **Output**: write the trimmed record set to CSV / JSON

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

mod cli;
mod config;
mod dedupe;
mod error;
mod extractor;
mod logging;
mod models;
mod observer;
mod outputs;
mod pager;
mod progress;
mod transport;
mod utils;

use cli::Cli;
use config::load_config;
use error::ScrapeError;
use extractor::Extractor;
use logging::log_filename;
use models::{Record, SearchQuery};
use observer::{ChannelObserver, Observer, Observers, TracingObserver};
use outputs::{Format, write_records};
use pager::{Pager, PagerSettings, format_estimate};
use progress::ProgressObserver;
use transport::{
    ConnectivityProbe, SITE_ORIGIN, TcpProbe, TransportSettings, http_page_source,
};
use utils::{output_filename, resolve_output_dir, truncate_for_log};

const SAMPLE_SIZE: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let log_file = logging::init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = load_config(&args.config);

    // Validation happens before anything touches the network.
    let location = args
        .location
        .clone()
        .unwrap_or_else(|| config.default_location.clone());
    let query = match SearchQuery::new(
        &args.keywords,
        &location,
        args.experience.as_deref(),
        args.count.unwrap_or(config.default_num_jobs),
        config.max_jobs_limit,
    ) {
        Ok(query) => query,
        Err(e) => {
            error!(error = %e, "Rejected search parameters");
            exit_with(&e);
        }
    };
    info!(
        keywords = query.keywords(),
        location = query.location(),
        experience = ?query.experience(),
        target = query.target_count(),
        "Starting scrape"
    );

    let preferred_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output_path());
    let output_dir = resolve_output_dir(&preferred_dir).await;

    let mut log_path = None;
    if config.log_to_file {
        let path = output_dir.join(log_filename(Local::now()));
        match log_file.attach(&path) {
            Ok(()) => {
                info!(path = %path.display(), "Logging to file");
                log_path = Some(path);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Could not create log file"),
        }
    }

    info!("Checking internet connection");
    if !TcpProbe::new(config.probe_timeout()).is_online().await {
        error!("No internet connection detected");
        exit_with(&ScrapeError::NoConnectivity);
    }

    let pager_settings = PagerSettings::from(&config);
    let estimate = pager_settings.estimated_duration(query.target_count());
    println!("Estimated time: {}", format_estimate(estimate));
    info!(?estimate, "Estimated scrape duration");

    // Progress rendering runs on its own task, fed by a channel that never blocks the run.
    let mut observers = Observers::new().with(TracingObserver);
    let mut progress_task = None;
    if config.show_progress_bar && !args.no_progress {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let progress = ProgressObserver::new(query.target_count());
        progress_task = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                progress.on_event(&event);
            }
        }));
        observers = observers.with(ChannelObserver::new(tx));
    }
    let observer: Arc<dyn Observer> = Arc::new(observers);

    let transport_settings = TransportSettings::from(&config);
    let source = http_page_source(
        &transport_settings,
        config.probe_timeout(),
        Arc::clone(&observer),
    )?;
    let extractor = Extractor::new(Url::parse(SITE_ORIGIN)?);
    let pager = Pager::new(
        source,
        extractor,
        pager_settings,
        Arc::clone(&observer),
    );

    let abort = Arc::new(AtomicBool::new(false));
    {
        let abort = Arc::clone(&abort);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping after the current page");
                abort.store(true, Ordering::Relaxed);
            }
        });
    }

    let outcome = pager.run(&query, &abort).await;

    // Dropping every observer handle closes the channel and ends the progress task.
    drop(pager);
    drop(observer);
    if let Some(task) = progress_task {
        let _ = task.await;
    }

    info!(
        count = outcome.records.len(),
        pages = outcome.pages_fetched,
        final_offset = outcome.final_offset,
        reason = %outcome.reason,
        "Scrape complete"
    );

    if let Some(failure) = outcome.failure() {
        if outcome.records.is_empty() {
            exit_with(failure);
        }
        eprintln!("\n{failure}\n{}", failure.advice());
        warn!(
            count = outcome.records.len(),
            "Exporting partial results collected before the failure"
        );
    }

    if outcome.records.is_empty() {
        warn!("No jobs to export");
        return Ok(());
    }

    let mut formats = vec![Format::Csv];
    if args.json || config.export_json {
        formats.push(Format::Json);
    }
    let now = Local::now();
    for format in formats {
        let path = output_dir.join(output_filename(
            query.keywords(),
            query.location(),
            format.extension(),
            now,
        ));
        match write_records(&outcome.records, format, &path).await {
            Ok(()) => println!("Saved {} jobs to {}", outcome.records.len(), path.display()),
            Err(e) => error!(path = %path.display(), error = %e, "Export failed"),
        }
    }

    print_sample(&outcome.records);
    if let Some(path) = &log_path {
        println!("\nLog file saved to: {}", path.display());
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Report a fatal error with its advice and exit with a failure status.
fn exit_with(error: &ScrapeError) -> ! {
    eprintln!("{error}\n{}", error.advice());
    process::exit(1);
}

fn print_sample(records: &[Record]) {
    println!(
        "\nSample of scraped jobs (showing {} of {}):",
        records.len().min(SAMPLE_SIZE),
        records.len()
    );
    for (i, record) in records.iter().take(SAMPLE_SIZE).enumerate() {
        println!("\n{}. {}", i + 1, record.title);
        println!("   Company:  {}", record.organization);
        println!("   Location: {}", record.location);
        println!("   Posted:   {}", record.posted_at);
        println!("   URL:      {}", truncate_for_log(&record.url, 60));
    }
}
