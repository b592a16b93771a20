//! Scripted engine for tests

use async_trait::async_trait;
use image::DynamicImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{EngineError, EngineKind, OcrEngine};

#[derive(Debug, Clone)]
pub(crate) enum MockResponse {
    Text(String),
    NoText,
    Fail(String),
}

pub(crate) struct MockEngine {
    kind: EngineKind,
    delay: Duration,
    response: MockResponse,
    calls: AtomicUsize,
}

impl MockEngine {
    pub(crate) fn new(kind: EngineKind, response: MockResponse) -> Self {
        Self {
            kind,
            delay: Duration::ZERO,
            response,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn text(kind: EngineKind, text: &str) -> Self {
        Self::new(kind, MockResponse::Text(text.to_string()))
    }

    /// Sleep this long inside `recognize`
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl OcrEngine for MockEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn recognize(&self, _image: Arc<DynamicImage>) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.response {
            MockResponse::Text(text) => Ok(text.clone()),
            MockResponse::NoText => Err(EngineError::NoText),
            MockResponse::Fail(msg) => Err(EngineError::Recognition(msg.clone())),
        }
    }
}
