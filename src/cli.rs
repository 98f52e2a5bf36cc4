//! Command-line interface definitions.
//!
//! Search parameters not given here fall back to the values in `config.yaml`.

use clap::Parser;
use std::path::PathBuf;

/// Collect public job listings and export them to CSV (and optionally JSON).
///
/// # Examples
///
/// ```sh
/// # 50 listings (the configured default) for a title in the default location
/// job_scrape "Python Developer"
///
/// # 120 entry-level listings in Berlin, also exported as JSON
/// job_scrape "Rust Engineer" -l Berlin -n 120 -e entry --json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Job title or search keywords
    pub keywords: String,

    /// City, state, or country to search in
    #[arg(short, long)]
    pub location: Option<String>,

    /// Number of unique listings to collect
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Experience level: internship, entry, associate, mid-senior, director, executive
    #[arg(short, long)]
    pub experience: Option<String>,

    /// Path to config.yaml (created with defaults if missing)
    #[arg(short, long, env = "JOB_SCRAPE_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Directory for exported files (overrides `output_folder`)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Also export JSON
    #[arg(long)]
    pub json: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}
