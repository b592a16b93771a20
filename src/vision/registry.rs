//! Engine registry
//!
//! Engines are expensive to start (model loading, trained data install), so
//! each one is initialized on first use and the handle is reused for every
//! later request until [`EngineRegistry::release_all`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::models::ModelType;
use super::paddle::{self, PaddleOcr};
use super::tessdata::traineddata_file;
use super::tesseract::Tesseract;
use super::{EngineError, EngineKind, OcrEngine};
use crate::config::{AppConfig, PaddleSettings, TesseractSettings};

pub struct EngineRegistry {
    paddle: PaddleSettings,
    tesseract: TesseractSettings,
    data_dir: PathBuf,
    engines: Mutex<HashMap<EngineKind, Arc<dyn OcrEngine>>>,
}

impl EngineRegistry {
    pub fn new(config: &AppConfig, data_dir: PathBuf) -> Self {
        Self {
            paddle: config.paddle.clone(),
            tesseract: config.tesseract.clone(),
            data_dir,
            engines: Mutex::new(HashMap::new()),
        }
    }

    /// Register an already running engine, replacing any of the same kind
    #[cfg(test)]
    pub(crate) fn with_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.engines.get_mut().insert(engine.kind(), engine);
        self
    }

    /// Shared handle to `kind`, initializing it on first use.
    /// A failed initialization is not cached.
    pub async fn get(&self, kind: EngineKind) -> Result<Arc<dyn OcrEngine>, EngineError> {
        let mut engines = self.engines.lock().await;
        if let Some(engine) = engines.get(&kind) {
            return Ok(Arc::clone(engine));
        }

        info!("Initializing {} engine", kind);
        let engine: Arc<dyn OcrEngine> = match kind {
            EngineKind::Paddle => Arc::new(
                PaddleOcr::initialize(&self.paddle, &self.data_dir)
                    .await
                    .map_err(|e| EngineError::init(kind, e))?,
            ),
            EngineKind::Tesseract => Arc::new(
                Tesseract::initialize(&self.tesseract, &self.data_dir)
                    .await
                    .map_err(|e| EngineError::init(kind, e))?,
            ),
        };

        engines.insert(kind, Arc::clone(&engine));
        Ok(engine)
    }

    /// Whether `kind` has its model data on disk, so starting it needs no download
    pub fn is_installed(&self, kind: EngineKind) -> bool {
        match kind {
            EngineKind::Paddle => {
                let dir = paddle::models_dir(&self.paddle, &self.data_dir);
                ModelType::REQUIRED
                    .iter()
                    .all(|model| dir.join(model.filename()).is_file())
            }
            EngineKind::Tesseract => traineddata_file(&self.tesseract.language)
                .map(|file| self.data_dir.join("tessdata").join(file).is_file())
                .unwrap_or(false),
        }
    }

    #[cfg(test)]
    pub(crate) async fn is_initialized(&self, kind: EngineKind) -> bool {
        self.engines.lock().await.contains_key(&kind)
    }

    /// Drop every engine handle
    pub async fn release_all(&self) {
        let mut engines = self.engines.lock().await;
        for kind in engines.keys() {
            info!("Releasing {} engine", kind);
        }
        engines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::mock::MockEngine;

    fn offline_config(bundled: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.tesseract.bundled_tessdata = bundled.to_path_buf();
        config.tesseract.allow_download = false;
        config
    }

    #[tokio::test]
    async fn test_injected_engine_is_reused() {
        let data = tempfile::tempdir().unwrap();
        let mock = MockEngine::text(EngineKind::Paddle, "hi").shared();
        let registry = EngineRegistry::new(&AppConfig::default(), data.path().to_path_buf())
            .with_engine(mock.clone());

        let first = registry.get(EngineKind::Paddle).await.unwrap();
        let second = registry.get(EngineKind::Paddle).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.kind(), EngineKind::Paddle);
        assert!(registry.is_initialized(EngineKind::Paddle).await);
        assert!(!registry.is_initialized(EngineKind::Tesseract).await);
    }

    #[tokio::test]
    async fn test_release_all_drops_handles() {
        let data = tempfile::tempdir().unwrap();
        let mock = MockEngine::text(EngineKind::Tesseract, "hi").shared();
        let registry = EngineRegistry::new(&AppConfig::default(), data.path().to_path_buf())
            .with_engine(mock.clone());
        assert_eq!(Arc::strong_count(&mock), 2);

        registry.release_all().await;

        assert!(!registry.is_initialized(EngineKind::Tesseract).await);
        assert_eq!(Arc::strong_count(&mock), 1);
    }

    #[test]
    fn test_is_installed_checks_data_files() {
        let data = tempfile::tempdir().unwrap();
        let registry = EngineRegistry::new(&AppConfig::default(), data.path().to_path_buf());
        assert!(!registry.is_installed(EngineKind::Paddle));
        assert!(!registry.is_installed(EngineKind::Tesseract));

        let tessdata = data.path().join("tessdata");
        std::fs::create_dir_all(&tessdata).unwrap();
        std::fs::write(tessdata.join("eng.traineddata"), b"data").unwrap();
        assert!(registry.is_installed(EngineKind::Tesseract));

        let models = data.path().join("models");
        std::fs::create_dir_all(&models).unwrap();
        for model in ModelType::REQUIRED {
            std::fs::write(models.join(model.filename()), b"x").unwrap();
        }
        assert!(registry.is_installed(EngineKind::Paddle));
    }

    #[tokio::test]
    async fn test_failed_init_is_reported_and_not_cached() {
        let bundled = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let registry =
            EngineRegistry::new(&offline_config(bundled.path()), data.path().to_path_buf());

        let result = registry.get(EngineKind::Tesseract).await;

        assert!(matches!(
            result,
            Err(EngineError::Init {
                engine: EngineKind::Tesseract,
                ..
            })
        ));
        assert!(!registry.is_initialized(EngineKind::Tesseract).await);
    }
}
