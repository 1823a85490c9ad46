use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::element_diff::{ElementDiffOptions, DEFAULT_IGNORED_ATTRIBUTES};
use crate::pool::DEFAULT_POOL_CAPACITY;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub diff: DiffConfig,
    pub concurrency: ConcurrencyConfig,
    pub links: LinksConfig,
}

/// Where records, screenshots, reports and diff images live.
///
/// Relative sub-paths are resolved against `root`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub images_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub snapshots_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("snapdiff-data"),
            images_dir: PathBuf::from("images"),
            reports_dir: PathBuf::from("reports"),
            snapshots_file: PathBuf::from("snapshots.json"),
        }
    }
}

impl StorageConfig {
    pub fn images_path(&self) -> PathBuf {
        self.root.join(&self.images_dir)
    }

    pub fn reports_path(&self) -> PathBuf {
        self.root.join(&self.reports_dir)
    }

    pub fn snapshots_path(&self) -> PathBuf {
        self.root.join(&self.snapshots_file)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Per-channel tolerance (0-255).
    pub inaccuracy: u8,
    pub ignored_attributes: Vec<String>,
    pub ignored_css: Vec<String>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            inaccuracy: 0,
            ignored_attributes: DEFAULT_IGNORED_ATTRIBUTES
                .iter()
                .map(|name| name.to_string())
                .collect(),
            ignored_css: Vec::new(),
        }
    }
}

impl DiffConfig {
    pub fn element_options(&self, inaccuracy: u8) -> ElementDiffOptions {
        ElementDiffOptions {
            ignored_attributes: self.ignored_attributes.iter().cloned().collect(),
            ignored_css: self.ignored_css.iter().cloned().collect(),
            inaccuracy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub report_workers: usize,
    pub element_workers: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            report_workers: DEFAULT_POOL_CAPACITY,
            element_workers: DEFAULT_POOL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    /// Prefix of image references in reports, e.g. `http://host:3000`.
    pub base_url: Option<String>,
}

impl Config {
    /// `<config dir>/snapdiff/config.toml`
    pub fn central_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("snapdiff").join("config.toml"))
    }

    /// Priority: explicit path > central config (when present) > defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let source = match path {
            Some(explicit) => Some(explicit.to_path_buf()),
            None => Self::central_config_path().filter(|central| central.exists()),
        };
        match source {
            Some(file) => {
                let content = std::fs::read_to_string(&file).map_err(|e| e.to_string())?;
                Self::from_toml(&content)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency.report_workers == 0 {
            return Err("concurrency.report_workers must be at least 1".to_string());
        }
        if self.concurrency.element_workers == 0 {
            return Err("concurrency.element_workers must be at least 1".to_string());
        }
        if self.storage.root.as_os_str().is_empty() {
            return Err("storage.root must not be empty".to_string());
        }
        if let Some(base) = &self.links.base_url {
            if base.trim().is_empty() {
                return Err("links.base_url must not be empty when set".to_string());
            }
        }
        Ok(())
    }
}
