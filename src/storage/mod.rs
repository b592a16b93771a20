//! Storage Layer
//!
//! Persists the recognition history in SQLite and resolves the
//! application's data and config directories.

pub mod database;
pub mod history;
pub mod records;

pub use database::{Database, StoreError};
pub use history::HistoryStore;
pub use records::{format_timestamp, now_millis, NewOcrRecord, OcrRecord};

use anyhow::Result;
use std::path::PathBuf;

use crate::config::StorageSettings;

/// Database file name inside the data directory
pub const DATABASE_FILE: &str = "ocr_database.db";

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "ocrbench", "OcrBench")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;
    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;
    Ok(config_dir)
}

/// Resolve the history database path from settings
pub fn database_path(settings: &StorageSettings, data_dir: &std::path::Path) -> PathBuf {
    settings
        .database_path
        .clone()
        .unwrap_or_else(|| data_dir.join(DATABASE_FILE))
}

/// Resolve the directory piped-in captures are written to
pub fn captures_dir(settings: &StorageSettings, data_dir: &std::path::Path) -> PathBuf {
    settings
        .captures_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("captures"))
}
