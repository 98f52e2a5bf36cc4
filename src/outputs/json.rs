//! JSON encoding: a pretty-printed array of record objects.

use crate::models::Record;

pub fn to_json_bytes(records: &[Record]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(records)
}
