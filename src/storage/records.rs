//! Recognition history records

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One completed recognition, as stored in the `OcrResult` table.
///
/// Records are written once and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrRecord {
    /// Auto-generated row id
    pub id: i64,
    /// Display name of the engine that produced the text
    pub engine: String,
    /// Approximate resource footprint of that engine
    pub engine_size: String,
    /// Full recognized text
    pub recognized_text: String,
    /// Completion time, milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Time spent inside the engine call
    pub duration_millis: u64,
}

/// A record about to be inserted (no id yet)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOcrRecord {
    pub engine: String,
    pub engine_size: String,
    pub recognized_text: String,
    pub timestamp: i64,
    pub duration_millis: u64,
}

impl NewOcrRecord {
    /// Attach the id assigned by the database
    pub fn with_id(self, id: i64) -> OcrRecord {
        OcrRecord {
            id,
            engine: self.engine,
            engine_size: self.engine_size,
            recognized_text: self.recognized_text,
            timestamp: self.timestamp,
            duration_millis: self.duration_millis,
        }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Render a millisecond timestamp in local time, or the raw number if it is out of range
pub fn format_timestamp(millis: i64) -> String {
    match DateTime::from_timestamp_millis(millis) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%a %b %d %H:%M:%S %Y")
            .to_string(),
        None => millis.to_string(),
    }
}
