//! Persistence of diff visualizations and construction of the references
//! a report hands out for them.

use std::path::{Path, PathBuf};

use chrono::Utc;
use image::RgbaImage;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::image_loader::{save_png, ImageLoadError};

const RANDOM_SUFFIX_LEN: usize = 10;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    reports_dir: PathBuf,
    base_url: Option<String>,
}

impl ArtifactStore {
    pub fn new(reports_dir: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// `<epoch-seconds>-<10 random alphanumerics>.png`
    pub fn generate_file_name() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_SUFFIX_LEN)
            .map(char::from)
            .collect();
        format!("{}-{}.png", Utc::now().timestamp(), suffix)
    }

    /// Writes a diff image and returns its reference.
    pub fn save(&self, image: &RgbaImage) -> Result<String, ImageLoadError> {
        let file_name = Self::generate_file_name();
        save_png(image, &self.reports_dir.join(&file_name))?;
        tracing::debug!(file = %file_name, "saved diff image");
        Ok(self.report_reference(&file_name))
    }

    pub fn report_reference(&self, file_name: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{base}/images/reports/{file_name}"),
            None => file_name.to_string(),
        }
    }

    pub fn original_reference(&self, image_path: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{base}/images/original/{image_path}"),
            None => image_path.to_string(),
        }
    }
}
