//! Tesseract trained data and executable discovery
//!
//! The trained data ships with the application and is installed into the
//! data directory the first time Tesseract is used.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use super::models::download_file;

/// Fallback source when no bundled trained data is found. The full models,
/// `eng` is about 22 MB.
pub const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

/// Download URL for a trained data file
pub fn tessdata_url(file_name: &str) -> String {
    format!("{}/{}", TESSDATA_REPO, file_name)
}

/// File name of the trained data for `language`
pub fn traineddata_file(language: &str) -> Result<String> {
    let valid = !language.is_empty()
        && language
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        anyhow::bail!("Invalid Tesseract language {:?}", language);
    }
    Ok(format!("{}.traineddata", language))
}

/// Bundled trained data directory. A relative path is looked up next to the
/// executable first, then under the crate root for development builds.
pub fn resolve_bundled_dir(configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        return configured.to_path_buf();
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let roots = exe_dir
        .into_iter()
        .chain(std::iter::once(PathBuf::from(env!("CARGO_MANIFEST_DIR"))));
    resolve_against(configured, roots)
}

/// First `root/relative` that is a directory, else the first candidate
fn resolve_against(relative: &Path, roots: impl IntoIterator<Item = PathBuf>) -> PathBuf {
    let candidates: Vec<PathBuf> = roots.into_iter().map(|root| root.join(relative)).collect();
    candidates
        .iter()
        .find(|candidate| candidate.is_dir())
        .cloned()
        .or_else(|| candidates.into_iter().next())
        .unwrap_or_else(|| relative.to_path_buf())
}

/// Make sure `<data_dir>/tessdata/<language>.traineddata` exists and return
/// the tessdata directory. An installed file is never touched again.
pub async fn prepare_tessdata(
    bundled_dir: &Path,
    data_dir: &Path,
    language: &str,
    allow_download: bool,
) -> Result<PathBuf> {
    let file_name = traineddata_file(language)?;
    let tessdata_dir = data_dir.join("tessdata");
    let target = tessdata_dir.join(&file_name);

    if target.is_file() {
        debug!("Trained data already installed at {:?}", target);
        return Ok(tessdata_dir);
    }

    tokio::fs::create_dir_all(&tessdata_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", tessdata_dir))?;

    let bundled = bundled_dir.join(&file_name);
    if bundled.is_file() {
        let partial = target.with_extension("part");
        tokio::fs::copy(&bundled, &partial)
            .await
            .with_context(|| format!("Failed to copy {:?}", bundled))?;
        tokio::fs::rename(&partial, &target)
            .await
            .context("Failed to move trained data into place")?;
        info!("Installed {} from {:?}", file_name, bundled_dir);
    } else if allow_download {
        let url = tessdata_url(&file_name);
        info!("No bundled {}, downloading from {}", file_name, url);
        download_file(&url, &target)
            .await
            .with_context(|| format!("Failed to download {}", file_name))?;
    } else {
        anyhow::bail!(
            "{} not found in {:?} and downloads are disabled",
            file_name,
            bundled_dir
        );
    }

    Ok(tessdata_dir)
}

/// The configured tesseract binary, or the first one found on the system
pub fn find_tesseract_executable(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        anyhow::bail!("Configured Tesseract executable {:?} does not exist", path);
    }

    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    let common_paths = [
        r"C:\Program Files\Tesseract-OCR\tesseract.exe",
        r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
        "/usr/bin/tesseract",
        "/usr/local/bin/tesseract",
        "/opt/homebrew/bin/tesseract",
    ];

    common_paths
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
        .ok_or_else(|| anyhow::anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}
