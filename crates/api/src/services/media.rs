//! Uploaded image storage.
//!
//! Files live under a media root on the local filesystem and are referenced
//! from the database by their path relative to that root, e.g.
//! `uploads/recipe/<uuid>.png`. The public URL is the configured media URL
//! prefix joined with that path.

use std::io;
use std::path::{Component, Path, PathBuf};

use image::ImageFormat;
use thiserror::Error;
use uuid::Uuid;

/// Directory, relative to the media root, holding recipe images.
const RECIPE_IMAGE_DIR: &str = "uploads/recipe";

/// Errors that can occur while storing or removing media files.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The upload is not a decodable image in a supported format.
    #[error("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")]
    InvalidImage,

    /// Filesystem error.
    #[error("media i/o error: {0}")]
    Io(#[from] io::Error),

    /// The blocking decode task panicked or was cancelled.
    #[error("image decode task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Local filesystem media storage.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    url_prefix: String,
}

impl MediaStorage {
    /// Create storage rooted at `root`, served under `url_prefix`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_owned(),
        }
    }

    /// The media root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public URL of a stored file.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.url_prefix, path.trim_start_matches('/'))
    }

    /// Validate and store a recipe image.
    ///
    /// The bytes are fully decoded on a blocking thread before anything is
    /// written. Returns the stored path relative to the media root.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::InvalidImage` if the bytes are not a supported
    /// image, or `MediaError::Io` if the file cannot be written.
    pub async fn store_recipe_image(&self, bytes: Vec<u8>) -> Result<String, MediaError> {
        let (format, bytes) = tokio::task::spawn_blocking(move || {
            let format = validate_image(&bytes)?;
            Ok::<_, MediaError>((format, bytes))
        })
        .await??;

        let extension = format.extensions_str().first().copied().unwrap_or("img");
        let relative = format!("{RECIPE_IMAGE_DIR}/{}.{extension}", Uuid::new_v4());
        let full = self.root.join(&relative);

        if let Some(dir) = full.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&full, &bytes).await?;

        tracing::debug!(path = %relative, bytes = bytes.len(), "stored recipe image");
        Ok(relative)
    }

    /// Remove a stored file. A file that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Io` if the path escapes the media root or the file
    /// cannot be removed.
    pub async fn remove(&self, path: &str) -> Result<(), MediaError> {
        let relative = Path::new(path);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(MediaError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to remove {path}"),
            )));
        }

        match tokio::fs::remove_file(self.root.join(relative)).await {
            Ok(()) => {
                tracing::debug!(path, "removed media file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stored file, logging instead of failing.
    pub async fn remove_quietly(&self, path: &str) {
        if let Err(e) = self.remove(path).await {
            tracing::warn!(path, error = %e, "failed to remove media file");
        }
    }
}

/// Detect the format of `bytes` and decode them fully.
fn validate_image(bytes: &[u8]) -> Result<ImageFormat, MediaError> {
    let format = image::guess_format(bytes).map_err(|_| MediaError::InvalidImage)?;
    image::load_from_memory_with_format(bytes, format).map_err(|_| MediaError::InvalidImage)?;
    Ok(format)
}
