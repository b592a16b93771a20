//! Result hand-off between a recognition run and the result view
//!
//! Each run parks its (image, text) pair under its request id. The reader
//! takes it exactly once; unread entries expire.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::capture::ImageRef;

/// What the result view needs beyond the route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransientResult {
    pub image: ImageRef,
    pub text: String,
}

pub struct ResultHandoff {
    ttl: Duration,
    entries: Mutex<HashMap<Uuid, (Instant, TransientResult)>>,
}

impl ResultHandoff {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Park `result` under `request_id`, dropping anything expired
    pub fn put(&self, request_id: Uuid, result: TransientResult) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, (stored_at, _)| now.duration_since(*stored_at) < self.ttl);
        entries.insert(request_id, (now, result));
    }

    /// Remove and return the result for `request_id` if it has not expired
    pub fn take(&self, request_id: &Uuid) -> Option<TransientResult> {
        let (stored_at, result) = self.entries.lock().remove(request_id)?;
        if stored_at.elapsed() >= self.ttl {
            debug!("Hand-off for {} expired", request_id);
            return None;
        }
        Some(result)
    }

    /// Entries currently held, expired or not
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
