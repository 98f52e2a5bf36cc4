//! Identity-based deduplication of records.

use crate::models::Record;
use std::collections::HashSet;

/// Drop records whose identity key is already in `seen`.
///
/// Keeps first-seen order, including among duplicates inside `records`
/// itself. Returns the kept records and the updated key set.
pub fn dedupe(mut seen: HashSet<String>, records: Vec<Record>) -> (Vec<Record>, HashSet<String>) {
    let kept = records
        .into_iter()
        .filter(|record| seen.insert(record.identity_key().to_string()))
        .collect();
    (kept, seen)
}
