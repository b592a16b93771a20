//! Application Configuration
//!
//! User settings stored in TOML format. Every section and field has a
//! default, so a partial file is enough.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::vision::EngineKind;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General settings
    pub general: GeneralConfig,
    /// PaddleOCR engine settings
    pub paddle: PaddleSettings,
    /// Tesseract engine settings
    pub tesseract: TesseractSettings,
    /// History database and capture storage
    pub storage: StorageSettings,
}

/// General application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Engine used when `--engine` is not given
    pub default_engine: EngineKind,
}

/// PaddleOCR (ONNX Runtime) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddleSettings {
    /// Where detection/recognition models live (defaults to `<data>/models`)
    pub models_dir: Option<PathBuf>,
    /// Try GPU execution providers before falling back to CPU
    pub use_gpu: bool,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
    /// Probability above which a detection pixel counts as text
    pub det_threshold: f32,
    /// Minimum mean probability of a detected box
    pub box_threshold: f32,
    /// Boxes with a shorter side (in detection pixels) are dropped
    pub min_box_size: f32,
    /// How far boxes are grown before cropping
    pub unclip_ratio: f32,
    /// Lines recognized with a lower mean confidence are dropped
    pub min_score: f32,
}

impl Default for PaddleSettings {
    fn default() -> Self {
        Self {
            models_dir: None,
            use_gpu: false,
            intra_threads: 4,
            det_threshold: 0.3,
            box_threshold: 0.6,
            min_box_size: 3.0,
            unclip_ratio: 1.5,
            min_score: 0.5,
        }
    }
}

/// Tesseract settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractSettings {
    /// Explicit path to the tesseract binary (otherwise looked up on PATH)
    pub executable: Option<PathBuf>,
    /// Trained data language, e.g. "eng"
    pub language: String,
    /// Page segmentation mode passed as `--psm`
    pub psm: u32,
    /// Directory holding the bundled `<language>.traineddata`. Relative paths
    /// are resolved next to the executable.
    pub bundled_tessdata: PathBuf,
    /// Fetch trained data from the network when no bundled copy exists
    pub allow_download: bool,
}

impl Default for TesseractSettings {
    fn default() -> Self {
        Self {
            executable: None,
            language: "eng".to_string(),
            psm: 3,
            bundled_tessdata: PathBuf::from("assets/tessdata"),
            allow_download: true,
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// History database file (defaults to `<data>/ocr_database.db`)
    pub database_path: Option<PathBuf>,
    /// Where piped-in captures are written (defaults to `<data>/captures`)
    pub captures_dir: Option<PathBuf>,
    /// How long an unread result stays in the hand-off cache
    pub handoff_ttl_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: None,
            captures_dir: None,
            handoff_ttl_secs: 300,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
