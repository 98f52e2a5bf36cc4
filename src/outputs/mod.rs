//! Export of the final record set.
//!
//! Both formats preserve record order and write [`SENTINEL`](crate::models::SENTINEL)
//! values through unchanged.
//!
//! # Submodules
//!
//! - [`tabular`]: CSV with a fixed column order
//! - [`json`]: pretty-printed array of objects
//!
//! # Output Structure
//!
//! ```text
//! output_folder/
//! ├── jobs_Rust_Developer_Berlin_2025-05-06_14-03-22.csv
//! └── jobs_Rust_Developer_Berlin_2025-05-06_14-03-22.json
//! ```

pub mod json;
pub mod tabular;

use crate::models::Record;
use std::error::Error;
use std::path::Path;
use tracing::{info, instrument};

/// Field names shared by both formats, in column order.
pub const COLUMNS: [&str; 5] = ["title", "organization", "location", "url", "postedAt"];

/// Supported export encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
        }
    }
}

/// Write `records` to `path` in the given format.
#[instrument(level = "info", skip_all, fields(path = %path.display(), format = ?format))]
pub async fn write_records(
    records: &[Record],
    format: Format,
    path: &Path,
) -> Result<(), Box<dyn Error>> {
    let bytes = match format {
        Format::Csv => tabular::to_csv_bytes(records)?,
        Format::Json => json::to_json_bytes(records)?,
    };
    tokio::fs::write(path, bytes).await?;
    info!(count = records.len(), "Wrote records");
    Ok(())
}
