use std::path::{Path, PathBuf};

use image::{ImageError, RgbaImage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("Failed to load image: {0}")]
    Load(#[from] ImageError),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Failed to save image: {0}")]
    Save(String),
}

/// Decodes a screenshot into RGBA8, whatever its source encoding.
pub fn load_image(path: impl AsRef<Path>) -> Result<RgbaImage, ImageLoadError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ImageLoadError::NotFound(path.display().to_string()));
    }
    Ok(image::open(path)?.into_rgba8())
}

/// Resolves a record's image path against the images directory.
///
/// Absolute paths are kept as-is so records may point outside the store.
pub fn resolve_image_path(images_dir: &Path, image_path: &str) -> PathBuf {
    let candidate = Path::new(image_path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        images_dir.join(candidate)
    }
}

/// Writes an image as PNG, creating parent directories.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), ImageLoadError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ImageLoadError::Save(e.to_string()))?;
    }
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| ImageLoadError::Save(e.to_string()))
}
