//! Tracing setup: stderr output plus an optional per-run log file.
//!
//! The log file lives in the output folder, which is only known after the
//! configuration is loaded and the folder is checked. The file layer is
//! therefore installed up front with a [`LogFile`] writer that discards
//! everything until [`LogFile::attach`] opens the file.

use chrono::{DateTime, Local};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Late-bound log file writer shared with the subscriber.
#[derive(Debug, Clone, Default)]
pub struct LogFile {
    file: Arc<OnceLock<File>>,
}

impl LogFile {
    /// Create `path` and send all further log lines to it.
    ///
    /// Only the first successful call takes effect.
    pub fn attach(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let _ = self.file.set(file);
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.file.get().is_some()
    }
}

pub enum LogSink<'a> {
    File(&'a File),
    Discard,
}

impl Write for LogSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match *self {
            LogSink::File(mut file) => file.write(buf),
            LogSink::Discard => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match *self {
            LogSink::File(mut file) => file.flush(),
            LogSink::Discard => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogSink<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match self.file.get() {
            Some(file) => LogSink::File(file),
            None => LogSink::Discard,
        }
    }
}

/// `scraper_log_<YYYYmmdd_HHMMSS>.txt`
pub fn log_filename(at: DateTime<Local>) -> String {
    format!("scraper_log_{}.txt", at.format("%Y%m%d_%H%M%S"))
}

/// Install the global subscriber and return the handle for the file layer.
///
/// `RUST_LOG` controls both outputs; the default level is `info`.
pub fn init() -> LogFile {
    let log_file = LogFile::default();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(io::stderr);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(log_file.clone());

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    log_file
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn discards_until_attached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.txt");
        let log_file = LogFile::default();

        log_file.make_writer().write_all(b"before\n").unwrap();
        assert!(!log_file.is_attached());

        log_file.attach(&path).unwrap();
        log_file.make_writer().write_all(b"after\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "after\n");
    }

    #[test]
    fn clones_share_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.txt");
        let log_file = LogFile::default();
        let layer_side = log_file.clone();

        log_file.attach(&path).unwrap();
        layer_side.make_writer().write_all(b"line\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line\n");
    }

    #[test]
    fn attach_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_file = LogFile::default();
        assert!(log_file.attach(&dir.path().join("nope").join("run.txt")).is_err());
        assert!(!log_file.is_attached());
    }

    #[test]
    fn log_filename_uses_compact_timestamp() {
        let at = Local.with_ymd_and_hms(2025, 5, 6, 14, 3, 22).unwrap();
        assert_eq!(log_filename(at), "scraper_log_20250506_140322.txt");
    }
}
