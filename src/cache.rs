//! Report cache keyed by the normalized actual/expected date pair.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::{Result, SnapdiffError};
use crate::store::write_atomically;

pub trait ReportCache: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn store(&self, key: &str, json: &str) -> Result<()>;
}

/// `<actual>_<expected>` with everything but ASCII alphanumerics and `-` replaced by `-`.
pub fn cache_key(actual: &str, expected: &str) -> String {
    format!("{}_{}", normalize(actual), normalize(expected))
}

fn normalize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// One `<key>.json` file per date pair in the reports directory.
#[derive(Debug, Clone)]
pub struct FsReportCache {
    dir: PathBuf,
}

impl FsReportCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl ReportCache for FsReportCache {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(json) => Ok(Some(json)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SnapdiffError::cache(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    fn store(&self, key: &str, json: &str) -> Result<()> {
        let path = self.path_for(key);
        write_atomically(&path, json.as_bytes()).map_err(|e| {
            SnapdiffError::cache(format!("failed to write {}: {e}", path.display()))
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryReportCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryReportCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportCache for MemoryReportCache {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| SnapdiffError::cache("report cache lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn store(&self, key: &str, json: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| SnapdiffError::cache("report cache lock poisoned"))?;
        entries.insert(key.to_string(), json.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn cache_key_replaces_separators() {
        assert_eq!(
            cache_key("2018-05-01T10:00:00.000Z", "2018-04-30T09:15:00.500Z"),
            "2018-05-01T10-00-00-000Z_2018-04-30T09-15-00-500Z"
        );
    }

    #[test]
    fn fs_cache_misses_then_hits() {
        let dir = TempDir::new().expect("tempdir");
        let cache = FsReportCache::new(dir.path().join("reports"));

        assert_eq!(cache.load("a_b").unwrap(), None);
        cache.store("a_b", "{\"stories\":[]}").unwrap();
        assert_eq!(cache.load("a_b").unwrap().as_deref(), Some("{\"stories\":[]}"));
        assert!(dir.path().join("reports").join("a_b.json").exists());

        cache.store("a_b", "{}").unwrap();
        assert_eq!(cache.load("a_b").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn memory_cache_round_trips_verbatim() {
        let cache = MemoryReportCache::new();
        cache.store("k", " {\"x\": 1} ").unwrap();
        assert_eq!(cache.load("k").unwrap().as_deref(), Some(" {\"x\": 1} "));
    }
}
