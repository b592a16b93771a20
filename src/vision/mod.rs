//! Vision/OCR Layer
//!
//! Text recognition behind a single engine interface.
//! Supports two backends:
//! - PaddleOCR via ONNX Runtime (model-based, callback completion)
//! - Tesseract (statistical, synchronous)

#[cfg(test)]
pub(crate) mod mock;
pub mod models;
pub mod paddle;
pub mod postprocess;
pub mod preprocess;
pub mod registry;
pub mod tessdata;
pub mod tesseract;

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use registry::EngineRegistry;

/// OCR backend selection
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// PaddleOCR detection + recognition models via ONNX Runtime
    #[default]
    Paddle,
    /// Tesseract with installed trained data
    Tesseract,
}

impl EngineKind {
    /// Every supported engine, in menu order
    pub const ALL: [EngineKind; 2] = [EngineKind::Paddle, EngineKind::Tesseract];

    /// Name stored in history records and shown to the user
    pub fn display_name(&self) -> &'static str {
        match self {
            EngineKind::Paddle => "PaddleOCR",
            EngineKind::Tesseract => "Tesseract",
        }
    }

    /// Approximate on-disk footprint of the engine's model data
    pub fn size_tag(&self) -> &'static str {
        match self {
            // det.onnx ~2.4 MB + rec.onnx ~7.8 MB
            EngineKind::Paddle => "~10MB",
            EngineKind::Tesseract => "~22MB",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for EngineKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        EngineKind::ALL
            .into_iter()
            .find(|kind| {
                let id = match kind {
                    EngineKind::Paddle => "paddle",
                    EngineKind::Tesseract => "tesseract",
                };
                wanted.eq_ignore_ascii_case(id) || wanted.eq_ignore_ascii_case(kind.display_name())
            })
            .ok_or_else(|| EngineError::UnknownEngine(wanted.to_string()))
    }
}

/// Errors reported by OCR engines
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine ran but found nothing to report
    #[error("no text found")]
    NoText,
    #[error("unknown OCR engine '{0}'")]
    UnknownEngine(String),
    #[error("failed to initialize {engine}: {reason:#}")]
    Init {
        engine: EngineKind,
        reason: anyhow::Error,
    },
    #[error("{0}")]
    Recognition(String),
    #[error("engine stopped before reporting a result")]
    Cancelled,
}

impl EngineError {
    pub(crate) fn init(engine: EngineKind, reason: anyhow::Error) -> Self {
        EngineError::Init { engine, reason }
    }
}

/// A text recognizer. Implementations are shared across requests.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Which backend this is
    fn kind(&self) -> EngineKind;

    /// Recognize all text in the image
    async fn recognize(&self, image: Arc<DynamicImage>) -> Result<String, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_names_and_sizes() {
        assert_eq!(EngineKind::Paddle.display_name(), "PaddleOCR");
        assert_eq!(EngineKind::Tesseract.display_name(), "Tesseract");
        assert_eq!(EngineKind::Paddle.size_tag(), "~10MB");
        assert_eq!(EngineKind::Tesseract.size_tag(), "~22MB");
    }

    #[test]
    fn test_parse_engine_kind() {
        assert_eq!("paddle".parse::<EngineKind>().unwrap(), EngineKind::Paddle);
        assert_eq!("PaddleOCR".parse::<EngineKind>().unwrap(), EngineKind::Paddle);
        assert_eq!(" TESSERACT ".parse::<EngineKind>().unwrap(), EngineKind::Tesseract);
        assert!(matches!(
            "ml kit".parse::<EngineKind>(),
            Err(EngineError::UnknownEngine(name)) if name == "ml kit"
        ));
    }

    #[test]
    fn test_engine_kind_serde() {
        let json = serde_json::to_string(&EngineKind::Tesseract).unwrap();
        assert_eq!(json, "\"tesseract\"");
        let parsed: EngineKind = serde_json::from_str("\"paddle\"").unwrap();
        assert_eq!(parsed, EngineKind::Paddle);
    }

    #[test]
    fn test_error_messages() {
        let err = EngineError::Recognition("Tesseract failed: bad image".to_string());
        assert_eq!(err.to_string(), "Tesseract failed: bad image");

        let err = EngineError::init(EngineKind::Paddle, anyhow::anyhow!("model missing"));
        assert_eq!(err.to_string(), "failed to initialize PaddleOCR: model missing");
    }
}
