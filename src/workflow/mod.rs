//! Recognition Workflow
//!
//! Takes a selected image through decode, recognition, persistence and
//! hand-off, then signals that the result can be shown. Within one run the
//! record is always written before the hand-off is filled and the
//! navigation signal fires.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::{load_image, DecodeError, ImageRef};
use crate::shared::state::STATUS_COMPLETED;
use crate::shared::{
    CaptureState, NavigationEvent, NavigationSignal, ResultHandoff, ResultRoute, TransientResult,
};
use crate::storage::{now_millis, HistoryStore, NewOcrRecord, OcrRecord, StoreError};
use crate::vision::{EngineError, EngineKind, EngineRegistry};

/// Text stored when an engine finds nothing
pub const NO_TEXT_FOUND: &str = "No text found";

/// Why a run produced no result
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("image selection cancelled")]
    SelectionCancelled,
    #[error("photo capture cancelled or failed")]
    CaptureCancelled,
    #[error(transparent)]
    ImageLoad(#[from] DecodeError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("failed to save result: {0}")]
    Persistence(#[from] StoreError),
}

impl WorkflowError {
    /// Status line shown to the user
    pub fn status_message(&self) -> String {
        match self {
            WorkflowError::SelectionCancelled => "Image selection cancelled".to_string(),
            WorkflowError::CaptureCancelled => "Photo capture cancelled or failed".to_string(),
            WorkflowError::ImageLoad(_) => "Error loading image".to_string(),
            WorkflowError::Engine(e) => format!("Error: {}", e),
            WorkflowError::Persistence(e) => format!("Error saving result: {}", e),
        }
    }
}

/// A successful run
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionOutcome {
    /// Key of the hand-off entry and the navigation event
    pub request_id: Uuid,
    pub text: String,
    pub duration_ms: u64,
    pub engine_size: String,
    pub record: OcrRecord,
}

pub struct RecognitionWorkflow {
    engines: Arc<EngineRegistry>,
    history: HistoryStore,
    handoff: ResultHandoff,
    navigation: NavigationSignal,
    state: RwLock<CaptureState>,
}

impl RecognitionWorkflow {
    pub fn new(engines: Arc<EngineRegistry>, history: HistoryStore, handoff_ttl: Duration) -> Self {
        Self {
            engines,
            history,
            handoff: ResultHandoff::new(handoff_ttl),
            navigation: NavigationSignal::new(),
            state: RwLock::new(CaptureState::default()),
        }
    }

    /// Current loading flag and status
    pub fn state(&self) -> CaptureState {
        self.state.read().clone()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// A picked image, or `None` when the picker was dismissed
    pub async fn on_image_selected(
        &self,
        image: Option<ImageRef>,
        engine: EngineKind,
    ) -> Result<RecognitionOutcome, WorkflowError> {
        match image {
            Some(image) => self.run(image, engine).await,
            None => self.abort(WorkflowError::SelectionCancelled),
        }
    }

    /// A captured photo, or `None` when capture produced nothing
    pub async fn on_photo_captured(
        &self,
        image: Option<ImageRef>,
        engine: EngineKind,
    ) -> Result<RecognitionOutcome, WorkflowError> {
        match image {
            Some(image) => self.run(image, engine).await,
            None => self.abort(WorkflowError::CaptureCancelled),
        }
    }

    fn abort(&self, error: WorkflowError) -> Result<RecognitionOutcome, WorkflowError> {
        self.state.write().finish(error.status_message());
        Err(error)
    }

    /// Recognize `image` with `engine`. Every failure is also reflected in
    /// the status line; the loading flag is always cleared.
    pub async fn run(
        &self,
        image: ImageRef,
        engine: EngineKind,
    ) -> Result<RecognitionOutcome, WorkflowError> {
        self.state
            .write()
            .begin(format!("Processing with {}...", engine));

        let result = self.execute(image, engine).await;
        match &result {
            Ok(outcome) => {
                info!(
                    "{} recognized {} characters in {} ms",
                    engine,
                    outcome.text.chars().count(),
                    outcome.duration_ms
                );
                self.state.write().finish(STATUS_COMPLETED);
            }
            Err(e) => {
                warn!("Recognition with {} failed: {}", engine, e);
                self.state.write().finish(e.status_message());
            }
        }
        result
    }

    async fn execute(
        &self,
        image: ImageRef,
        engine: EngineKind,
    ) -> Result<RecognitionOutcome, WorkflowError> {
        let decoded = Arc::new(load_image(&image).await?);
        let ocr = self.engines.get(engine).await?;

        let started = Instant::now();
        let recognized = ocr.recognize(decoded).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!("{} finished in {} ms", ocr.kind(), duration_ms);

        let text = match recognized {
            Ok(text) => text,
            Err(EngineError::NoText) => NO_TEXT_FOUND.to_string(),
            Err(e) => return Err(e.into()),
        };

        let record = self
            .history
            .insert(NewOcrRecord {
                engine: engine.display_name().to_string(),
                engine_size: engine.size_tag().to_string(),
                recognized_text: text.clone(),
                timestamp: now_millis(),
                duration_millis: duration_ms,
            })
            .await?;

        let request_id = Uuid::new_v4();
        self.handoff.put(
            request_id,
            TransientResult {
                image,
                text: text.clone(),
            },
        );
        let route = ResultRoute {
            engine: record.engine.clone(),
            duration_ms,
            engine_size: record.engine_size.clone(),
        };
        self.navigation.emit(NavigationEvent {
            request_id,
            route: route.to_path(),
        });

        Ok(RecognitionOutcome {
            request_id,
            text,
            duration_ms,
            engine_size: record.engine_size.clone(),
            record,
        })
    }

    /// Consume the pending navigation event and reset the status line
    pub fn on_navigated(&self) -> Option<NavigationEvent> {
        let event = self.navigation.take()?;
        self.state.write().status.clear();
        Some(event)
    }

    /// Image and text for a navigation event, readable once
    pub fn take_result(&self, request_id: &Uuid) -> Option<TransientResult> {
        self.handoff.take(request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::storage::Database;
    use crate::vision::mock::{MockEngine, MockResponse};
    use image::{Rgb, RgbImage};
    use std::path::Path;

    struct Fixture {
        _dir: tempfile::TempDir,
        workflow: RecognitionWorkflow,
        image: ImageRef,
        broken_image: ImageRef,
    }

    fn fixture(engines: Vec<Arc<MockEngine>>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();

        let image_path = dir.path().join("a.png");
        RgbImage::from_pixel(8, 4, Rgb([255, 255, 255]))
            .save_with_format(&image_path, image::ImageFormat::Png)
            .unwrap();
        let broken_path = dir.path().join("b.jpg");
        std::fs::write(&broken_path, b"not a jpeg").unwrap();

        // Tesseract cannot initialize here unless a mock stands in for it
        let mut config = AppConfig::default();
        config.tesseract.bundled_tessdata = dir.path().join("no-bundle");
        config.tesseract.allow_download = false;

        let mut registry = EngineRegistry::new(&config, dir.path().join("data"));
        for engine in engines {
            registry = registry.with_engine(engine);
        }

        let history = HistoryStore::new(Database::open_in_memory().unwrap());
        let workflow =
            RecognitionWorkflow::new(Arc::new(registry), history, Duration::from_secs(300));

        Fixture {
            workflow,
            image: ImageRef::new(image_path),
            broken_image: ImageRef::new(broken_path),
            _dir: dir,
        }
    }

    async fn rows(workflow: &RecognitionWorkflow) -> Vec<OcrRecord> {
        workflow.history().list_all().await.unwrap()
    }

    fn assert_idle_with(workflow: &RecognitionWorkflow, status: &str) {
        let state = workflow.state();
        assert!(!state.is_loading);
        assert_eq!(state.status, status);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_run_records_times_and_signals() {
        let paddle = MockEngine::text(EngineKind::Paddle, "HELLO")
            .with_delay(Duration::from_millis(120))
            .shared();
        let f = fixture(vec![paddle.clone()]);

        let outcome = f
            .workflow
            .on_image_selected(Some(f.image.clone()), EngineKind::Paddle)
            .await
            .unwrap();

        assert_eq!(outcome.text, "HELLO");
        assert_eq!(outcome.duration_ms, 120);
        assert_eq!(outcome.engine_size, "~10MB");
        assert_eq!(paddle.calls(), 1);

        let rows = rows(&f.workflow).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].engine, "PaddleOCR");
        assert_eq!(rows[0].recognized_text, "HELLO");
        assert_eq!(rows[0].duration_millis, 120);
        assert_eq!(rows[0], outcome.record);

        let event = f.workflow.on_navigated().unwrap();
        assert_eq!(event.request_id, outcome.request_id);
        assert_eq!(event.route, "PaddleOCR/120/~10MB");
        assert_eq!(
            ResultRoute::from_path(&event.route),
            ResultRoute {
                engine: "PaddleOCR".to_string(),
                duration_ms: 120,
                engine_size: "~10MB".to_string(),
            }
        );

        let handed_off = f.workflow.take_result(&event.request_id).unwrap();
        assert_eq!(handed_off.image, f.image);
        assert_eq!(handed_off.text, "HELLO");
    }

    #[tokio::test]
    async fn test_decode_failure_writes_nothing() {
        let tesseract = MockEngine::text(EngineKind::Tesseract, "unused").shared();
        let f = fixture(vec![tesseract.clone()]);

        let result = f
            .workflow
            .run(f.broken_image.clone(), EngineKind::Tesseract)
            .await;

        assert!(matches!(result, Err(WorkflowError::ImageLoad(_))));
        assert_idle_with(&f.workflow, "Error loading image");
        assert!(rows(&f.workflow).await.is_empty());
        assert_eq!(tesseract.calls(), 0);
        assert!(f.workflow.on_navigated().is_none());
    }

    #[tokio::test]
    async fn test_engine_failure_writes_nothing() {
        let paddle = MockEngine::new(EngineKind::Paddle, MockResponse::Fail("model crashed".into()))
            .shared();
        let f = fixture(vec![paddle]);

        let result = f.workflow.run(f.image.clone(), EngineKind::Paddle).await;

        assert!(matches!(result, Err(WorkflowError::Engine(_))));
        assert_idle_with(&f.workflow, "Error: model crashed");
        assert!(rows(&f.workflow).await.is_empty());
        assert!(f.workflow.on_navigated().is_none());
    }

    #[tokio::test]
    async fn test_engine_init_failure_writes_nothing() {
        let f = fixture(Vec::new());

        let result = f.workflow.run(f.image.clone(), EngineKind::Tesseract).await;

        assert!(matches!(
            result,
            Err(WorkflowError::Engine(EngineError::Init { .. }))
        ));
        let state = f.workflow.state();
        assert!(!state.is_loading);
        assert!(state.status.starts_with("Error: failed to initialize Tesseract"));
        assert!(rows(&f.workflow).await.is_empty());
    }

    #[tokio::test]
    async fn test_no_text_is_recorded() {
        let tesseract = MockEngine::new(EngineKind::Tesseract, MockResponse::NoText).shared();
        let f = fixture(vec![tesseract]);

        let outcome = f
            .workflow
            .run(f.image.clone(), EngineKind::Tesseract)
            .await
            .unwrap();

        assert_eq!(outcome.text, NO_TEXT_FOUND);
        let rows = rows(&f.workflow).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].recognized_text, "No text found");
        assert_eq!(rows[0].engine_size, "~22MB");
        assert_idle_with(&f.workflow, "Completed");
    }

    #[tokio::test]
    async fn test_persistence_failure_is_surfaced() {
        let paddle = MockEngine::text(EngineKind::Paddle, "HELLO").shared();
        let f = fixture(vec![paddle]);
        f.workflow
            .history()
            .database()
            .execute_raw("DROP TABLE OcrResult;")
            .unwrap();

        let result = f.workflow.run(f.image.clone(), EngineKind::Paddle).await;

        assert!(matches!(result, Err(WorkflowError::Persistence(_))));
        let state = f.workflow.state();
        assert!(!state.is_loading);
        assert!(state.status.starts_with("Error saving result:"));
        assert!(f.workflow.on_navigated().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_selection_and_capture() {
        let paddle = MockEngine::text(EngineKind::Paddle, "HELLO").shared();
        let f = fixture(vec![paddle.clone()]);

        let result = f.workflow.on_image_selected(None, EngineKind::Paddle).await;
        assert!(matches!(result, Err(WorkflowError::SelectionCancelled)));
        assert_idle_with(&f.workflow, "Image selection cancelled");

        let result = f.workflow.on_photo_captured(None, EngineKind::Paddle).await;
        assert!(matches!(result, Err(WorkflowError::CaptureCancelled)));
        assert_idle_with(&f.workflow, "Photo capture cancelled or failed");

        assert!(rows(&f.workflow).await.is_empty());
        assert_eq!(paddle.calls(), 0);
    }

    #[tokio::test]
    async fn test_latest_run_owns_the_signal() {
        let paddle = MockEngine::text(EngineKind::Paddle, "first").shared();
        let tesseract = MockEngine::text(EngineKind::Tesseract, "second").shared();
        let f = fixture(vec![paddle, tesseract]);

        let first = f
            .workflow
            .run(f.image.clone(), EngineKind::Paddle)
            .await
            .unwrap();
        let second = f
            .workflow
            .run(f.image.clone(), EngineKind::Tesseract)
            .await
            .unwrap();

        let event = f.workflow.on_navigated().unwrap();
        assert_eq!(event.request_id, second.request_id);
        assert_eq!(ResultRoute::from_path(&event.route).engine, "Tesseract");
        assert!(f.workflow.on_navigated().is_none());
        assert_eq!(f.workflow.state().status, "");

        assert_eq!(f.workflow.take_result(&second.request_id).unwrap().text, "second");
        assert_eq!(f.workflow.take_result(&first.request_id).unwrap().text, "first");
        assert!(f.workflow.take_result(&second.request_id).is_none());

        let timestamps: Vec<i64> = rows(&f.workflow).await.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps.len(), 2);
        assert!(timestamps.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_status_messages() {
        let decode = DecodeError::Io {
            path: Path::new("/x.jpg").to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(
            WorkflowError::ImageLoad(decode).status_message(),
            "Error loading image"
        );
        assert_eq!(
            WorkflowError::Engine(EngineError::Recognition("bad".into())).status_message(),
            "Error: bad"
        );
    }
}
