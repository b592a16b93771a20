//! Tesseract engine
//!
//! Runs the `tesseract` binary synchronously on a temporary PNG and reads
//! the recognized text from stdout.

use anyhow::Result;
use async_trait::async_trait;
use image::DynamicImage;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::tessdata::{find_tesseract_executable, prepare_tessdata, resolve_bundled_dir};
use super::{EngineError, EngineKind, OcrEngine};
use crate::config::TesseractSettings;

/// Tesseract engine handle
#[derive(Debug, Clone)]
pub struct Tesseract {
    executable: PathBuf,
    tessdata_dir: PathBuf,
    language: String,
    psm: u32,
}

impl Tesseract {
    pub fn new(executable: PathBuf, tessdata_dir: PathBuf, language: String, psm: u32) -> Self {
        Self {
            executable,
            tessdata_dir,
            language,
            psm,
        }
    }

    /// Install trained data if needed and locate the binary
    pub async fn initialize(settings: &TesseractSettings, data_dir: &Path) -> Result<Self> {
        let bundled_dir = resolve_bundled_dir(&settings.bundled_tessdata);
        let tessdata_dir = prepare_tessdata(
            &bundled_dir,
            data_dir,
            &settings.language,
            settings.allow_download,
        )
        .await?;
        let executable = find_tesseract_executable(settings.executable.as_deref())?;

        info!("Tesseract engine ready ({:?}, language {})", executable, settings.language);
        Ok(Self::new(
            executable,
            tessdata_dir,
            settings.language.clone(),
            settings.psm,
        ))
    }

    /// Command line arguments for recognizing `input`, writing text to stdout
    pub fn arguments(&self, input: &Path) -> Vec<OsString> {
        vec![
            input.as_os_str().to_owned(),
            "stdout".into(),
            "--tessdata-dir".into(),
            self.tessdata_dir.as_os_str().to_owned(),
            "-l".into(),
            self.language.as_str().into(),
            "--psm".into(),
            self.psm.to_string().into(),
        ]
    }

    /// Recognize synchronously. Blocks on the child process.
    pub fn recognize_blocking(&self, image: &DynamicImage) -> Result<String, EngineError> {
        let temp_input = NamedTempFile::with_suffix(".png").map_err(recognition_error)?;
        image
            .save_with_format(temp_input.path(), image::ImageFormat::Png)
            .map_err(recognition_error)?;

        let output = Command::new(&self.executable)
            .args(self.arguments(temp_input.path()))
            .output()
            .map_err(recognition_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Recognition(format!(
                "Tesseract failed: {}",
                stderr.trim()
            )));
        }

        let text = clean_output(&String::from_utf8_lossy(&output.stdout));
        debug!("Tesseract returned {} characters", text.len());
        if text.is_empty() {
            Err(EngineError::NoText)
        } else {
            Ok(text)
        }
    }
}

fn recognition_error(e: impl std::fmt::Display) -> EngineError {
    EngineError::Recognition(format!("Tesseract failed: {}", e))
}

/// Strip trailing whitespace from each line, the form feed tesseract ends
/// pages with and leading/trailing blank lines
pub fn clean_output(raw: &str) -> String {
    raw.lines()
        .map(|line| line.trim_end_matches(['\u{c}', ' ', '\t', '\r']))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches(['\n', '\u{c}'])
        .to_string()
}

#[async_trait]
impl OcrEngine for Tesseract {
    fn kind(&self) -> EngineKind {
        EngineKind::Tesseract
    }

    async fn recognize(&self, image: Arc<DynamicImage>) -> Result<String, EngineError> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.recognize_blocking(&image))
            .await
            .map_err(|e| EngineError::Recognition(format!("Tesseract task failed: {}", e)))?
    }
}
