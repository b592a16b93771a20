//! Navigation from a finished recognition to its result view

use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

/// Placeholder for a missing route segment
pub const UNKNOWN: &str = "Unknown";

/// Summary of a run carried by the navigation event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRoute {
    pub engine: String,
    pub duration_ms: u64,
    pub engine_size: String,
}

impl ResultRoute {
    /// `engine/duration/size`, with `/` and `%` escaped inside segments
    pub fn to_path(&self) -> String {
        format!(
            "{}/{}/{}",
            escape_segment(&self.engine),
            self.duration_ms,
            escape_segment(&self.engine_size)
        )
    }

    /// Parse a path from [`ResultRoute::to_path`]. Missing or malformed
    /// segments fall back to "Unknown" and 0.
    pub fn from_path(path: &str) -> Self {
        let mut segments = path.splitn(3, '/');
        let mut text_segment = || {
            segments
                .next()
                .map(unescape_segment)
                .filter(|s| !s.is_empty())
        };

        let engine = text_segment().unwrap_or_else(|| UNKNOWN.to_string());
        let duration_ms = text_segment()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let engine_size = text_segment().unwrap_or_else(|| UNKNOWN.to_string());

        Self {
            engine,
            duration_ms,
            engine_size,
        }
    }
}

fn escape_segment(segment: &str) -> String {
    segment.replace('%', "%25").replace('/', "%2F")
}

fn unescape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let escape = rest.get(pos..pos + 3);
        match escape {
            Some("%25") => out.push('%'),
            Some(e) if e.eq_ignore_ascii_case("%2F") => out.push('/'),
            _ => {
                out.push('%');
                rest = &rest[pos + 1..];
                continue;
            }
        }
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    out
}

/// Emitted once per successful recognition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationEvent {
    /// Key of the run's entry in the result hand-off
    pub request_id: Uuid,
    /// Result view path, see [`ResultRoute::to_path`]
    pub route: String,
}

/// One-shot slot: each event is consumed at most once
#[derive(Debug, Default)]
pub struct NavigationSignal {
    slot: Mutex<Option<NavigationEvent>>,
}

impl NavigationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `event`, replacing an unconsumed one
    pub fn emit(&self, event: NavigationEvent) {
        *self.slot.lock() = Some(event);
    }

    /// Consume the pending event
    pub fn take(&self) -> Option<NavigationEvent> {
        self.slot.lock().take()
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}
