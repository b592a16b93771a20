//! Image Acquisition
//!
//! A selected photo is referenced by its path. Photos piped in on stdin are
//! written to the captures directory first, the way a camera saves its shot
//! before handing it over.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::{DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Reference to a selected or captured image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef(PathBuf);

impl ImageRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Failure to turn an image reference into pixels
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("decode task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Decode the referenced image. The format is detected from the content.
pub fn decode_image(image: &ImageRef) -> Result<DynamicImage, DecodeError> {
    let path = image.path();
    let io_error = |source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    };

    let decoded = ImageReader::open(path)
        .map_err(io_error)?
        .with_guessed_format()
        .map_err(io_error)?
        .decode()
        .map_err(|source| DecodeError::Image {
            path: path.to_path_buf(),
            source,
        })?;

    debug!("Decoded {} ({}x{})", image, decoded.width(), decoded.height());
    Ok(decoded)
}

/// [`decode_image`] on the blocking pool
pub async fn load_image(image: &ImageRef) -> Result<DynamicImage, DecodeError> {
    let image = image.clone();
    tokio::task::spawn_blocking(move || decode_image(&image)).await?
}

/// `JPEG_<yyyyMMdd_HHmmss>_<id>.jpg`
pub fn capture_file_name(taken_at: DateTime<Local>, id: Uuid) -> String {
    let id = id.simple().to_string();
    format!("JPEG_{}_{}.jpg", taken_at.format("%Y%m%d_%H%M%S"), &id[..8])
}

/// Create a new, empty capture file in `dir`
pub fn create_image_file(dir: &Path) -> Result<(File, ImageRef)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create captures directory {:?}", dir))?;

    let path = dir.join(capture_file_name(Local::now(), Uuid::new_v4()));
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("Failed to create capture file {:?}", path))?;

    Ok((file, ImageRef::new(path)))
}

/// Save everything `reader` yields as a new capture. `None` when it yields
/// nothing, which counts as a cancelled capture.
pub fn capture_from_reader<R: Read>(mut reader: R, dir: &Path) -> Result<Option<ImageRef>> {
    let (mut file, image) = create_image_file(dir)?;
    let copied = io::copy(&mut reader, &mut file);
    drop(file);
    let written = match copied {
        Ok(written) => written,
        Err(e) => {
            std::fs::remove_file(image.path()).ok();
            return Err(e).context("Failed to store capture");
        }
    };

    if written == 0 {
        std::fs::remove_file(image.path()).ok();
        debug!("Capture produced no data");
        return Ok(None);
    }

    debug!("Stored {} byte capture at {}", written, image);
    Ok(Some(image))
}
