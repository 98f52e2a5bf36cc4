//! Utility functions for string handling, output naming, and file system checks.
//!
//! This module provides helper functions used by the binary:
//! - String truncation for logs and console samples
//! - Filename sanitization and timestamped export names
//! - Output directory validation

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

static INVALID_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|\x00]"#).expect("static regex"));

const MAX_FILENAME_PART: usize = 50;

/// Truncate a string for logging purposes.
///
/// Strings longer than `max` characters are cut at a character boundary and
/// suffixed with `"…(+N bytes)"`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Make a string safe to use as part of a filename on every platform.
///
/// Replaces `\ / : * ? " < > |` and NUL with `_`, trims spaces and dots from
/// both ends, and keeps at most 50 characters. Blank results become `"untitled"`.
pub fn sanitize_filename(name: &str) -> String {
    let replaced = INVALID_FILENAME_CHARS.replace_all(name, "_");
    let trimmed: String = replaced
        .trim_matches(|c: char| c == ' ' || c == '.')
        .chars()
        .take(MAX_FILENAME_PART)
        .collect();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed
    }
}

/// Timestamped export filename for a search.
///
/// # Examples
///
/// ```ignore
/// // jobs_Rust Developer_Berlin_2025-05-06_14-03-22.csv
/// output_filename("Rust Developer", "Berlin", "csv", Local::now());
/// ```
pub fn output_filename(
    keywords: &str,
    location: &str,
    extension: &str,
    at: DateTime<Local>,
) -> String {
    format!(
        "jobs_{}_{}_{}.{}",
        sanitize_filename(keywords),
        sanitize_filename(location),
        at.format("%Y-%m-%d_%H-%M-%S"),
        extension
    )
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

/// Pick the export directory: `preferred` if writable, else the working directory.
pub async fn resolve_output_dir(preferred: &Path) -> PathBuf {
    match ensure_writable_dir(preferred).await {
        Ok(()) => preferred.to_path_buf(),
        Err(e) => {
            warn!(
                path = %preferred.display(),
                error = %e,
                "Output directory not writable; falling back to current directory"
            );
            PathBuf::from(".")
        }
    }
}
