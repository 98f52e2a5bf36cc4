//! Runtime settings loaded from `config.yaml`.
//!
//! Every field has a default, so a partial file only overrides what it names.
//! A missing file is created with the defaults; a malformed one is reported
//! and ignored.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument, warn};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Scraper settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Location used when none is given on the command line.
    pub default_location: String,
    /// Job count used when none is given on the command line.
    pub default_num_jobs: usize,
    /// Upper bound accepted for the job count.
    pub max_jobs_limit: usize,
    /// Directory that receives exported files and the log file.
    pub output_folder: String,
    /// Place `output_folder` under the user's Downloads folder instead of the
    /// working directory.
    pub save_to_downloads: bool,
    /// Also write the run's log to `scraper_log_<timestamp>.txt` in the output folder.
    pub log_to_file: bool,
    /// Seconds to wait between page requests.
    pub delay_between_requests: f64,
    /// Attempts per page before giving up on it.
    pub max_retries: u32,
    /// Per-attempt request timeout in seconds.
    pub timeout_seconds: u64,
    /// Seconds to wait between attempts for the same page.
    pub retry_delay: f64,
    /// Upper bound of random jitter added to `retry_delay`, in milliseconds.
    pub retry_jitter_ms: u64,
    /// Timeout for each reachability probe connection, in seconds.
    pub probe_timeout_seconds: u64,
    /// Also write a JSON file next to the CSV.
    pub export_json: bool,
    pub show_progress_bar: bool,
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        ScraperConfig {
            default_location: "India".to_string(),
            default_num_jobs: 50,
            max_jobs_limit: 500,
            output_folder: "job_results".to_string(),
            save_to_downloads: true,
            log_to_file: true,
            delay_between_requests: 2.5,
            max_retries: 3,
            timeout_seconds: 30,
            retry_delay: 2.0,
            retry_jitter_ms: 0,
            probe_timeout_seconds: 3,
            export_json: false,
            show_progress_bar: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ScraperConfig {
    pub fn request_delay(&self) -> Duration {
        secs_f64(self.delay_between_requests)
    }

    pub fn retry_delay(&self) -> Duration {
        secs_f64(self.retry_delay)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    /// Where exports go unless overridden on the command line.
    pub fn output_path(&self) -> PathBuf {
        if self.save_to_downloads {
            downloads_folder().join(&self.output_folder)
        } else {
            PathBuf::from(&self.output_folder)
        }
    }
}

/// The platform Downloads folder, falling back to the home directory.
///
/// `~/OneDrive/Downloads` is tried when the usual folder is missing, which is
/// where Windows puts it when OneDrive backs up the profile.
pub fn downloads_folder() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    [
        dirs::download_dir(),
        Some(home.join("Downloads")),
        Some(home.join("OneDrive").join("Downloads")),
    ]
    .into_iter()
    .flatten()
    .find(|dir| dir.is_dir())
    .unwrap_or(home)
}

/// Negative or non-finite values collapse to zero.
fn secs_f64(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// Load settings from `path`, falling back to defaults.
///
/// If the file does not exist it is created with the default settings so the
/// user has something to edit. Read or parse failures are logged and the
/// defaults are used.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_config(path: &Path) -> ScraperConfig {
    if !path.exists() {
        let config = ScraperConfig::default();
        match serde_yaml::to_string(&config) {
            Ok(yaml) => match std::fs::write(path, yaml) {
                Ok(()) => info!("Wrote default configuration"),
                Err(e) => warn!(error = %e, "Could not write default configuration"),
            },
            Err(e) => warn!(error = %e, "Could not serialize default configuration"),
        }
        return config;
    }

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Could not read configuration; using defaults");
            return ScraperConfig::default();
        }
    };

    match serde_yaml::from_str::<ScraperConfig>(&raw) {
        Ok(config) => {
            info!("Loaded configuration");
            config
        }
        Err(e) => {
            warn!(error = %e, "Malformed configuration; using defaults");
            ScraperConfig::default()
        }
    }
}
