//! Incremental compile cache
//!
//! One JSON entry per input file, keyed by a SHA-256 digest over the document
//! text and the serialized options. A stale or unreadable entry is a miss.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::CompileOptions;
use crate::emit::CompileResult;
use crate::error::Result;

pub const DEFAULT_CACHE_DIR: &str = ".mxml-codegen/cache";

#[derive(Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub result: CompileResult,
}

pub struct IncrementalCache {
    cache_dir: PathBuf,
}

impl IncrementalCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }
        Ok(Self { cache_dir })
    }

    /// Opens the cache named by `options.cache_dir`, if any.
    pub fn from_options(options: &CompileOptions) -> Result<Option<Self>> {
        options.cache_dir.as_deref().map(Self::new).transpose()
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn compute_hash(source: &str, options: &CompileOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
        // Options only hold strings and flags; serialization cannot fail.
        hasher.update(serde_json::to_vec(options).unwrap_or_default());
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, file_path: &str) -> PathBuf {
        let safe_name = file_path.replace(['/', '\\', ':'], "_");
        self.cache_dir.join(format!("{}.json", safe_name))
    }

    pub fn get(&self, file_path: &str, source: &str, options: &CompileOptions) -> Option<CompileResult> {
        let entry_path = self.entry_path(file_path);
        let data = fs::read_to_string(&entry_path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(e) => e,
            Err(e) => {
                warn!(file = file_path, error = %e, "discarding corrupt cache entry");
                fs::remove_file(&entry_path).ok();
                return None;
            }
        };

        if entry.hash == Self::compute_hash(source, options) {
            debug!(file = file_path, "cache hit");
            Some(entry.result)
        } else {
            None
        }
    }

    pub fn set(
        &self,
        file_path: &str,
        source: &str,
        options: &CompileOptions,
        result: &CompileResult,
    ) -> Result<()> {
        let entry = CacheEntry {
            hash: Self::compute_hash(source, options),
            result: result.clone(),
        };
        let data = serde_json::to_string(&entry)?;
        fs::write(self.entry_path(file_path), data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> CompileResult {
        CompileResult {
            code: "/** @constructor */\nMyApp = function() {};\n".to_string(),
            used_names: vec!["org.apache.royale.html.Label".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_hit_after_set() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IncrementalCache::new(dir.path()).unwrap();
        let options = CompileOptions::default();

        assert!(cache.get("src/MyApp.mxml.json", "{}", &options).is_none());
        cache
            .set("src/MyApp.mxml.json", "{}", &options, &sample_result())
            .unwrap();
        assert_eq!(
            cache.get("src/MyApp.mxml.json", "{}", &options),
            Some(sample_result())
        );
    }

    #[test]
    fn test_source_or_options_change_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IncrementalCache::new(dir.path()).unwrap();
        let options = CompileOptions::default();
        cache.set("a.mxml.json", "{}", &options, &sample_result()).unwrap();

        assert!(cache.get("a.mxml.json", "{ }", &options).is_none());

        let compact = CompileOptions {
            pretty_print: false,
            ..CompileOptions::default()
        };
        assert!(cache.get("a.mxml.json", "{}", &compact).is_none());
    }

    #[test]
    fn test_corrupt_entry_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IncrementalCache::new(dir.path()).unwrap();
        let path = cache.entry_path("bad.mxml.json");
        fs::write(&path, "not json").unwrap();

        assert!(cache
            .get("bad.mxml.json", "{}", &CompileOptions::default())
            .is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_from_options_without_dir_is_disabled() {
        let options = CompileOptions::default();
        assert!(IncrementalCache::from_options(&options).unwrap().is_none());

        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested/cache");
        let options = CompileOptions {
            cache_dir: Some(nested.to_string_lossy().to_string()),
            ..CompileOptions::default()
        };
        let cache = IncrementalCache::from_options(&options).unwrap().unwrap();
        assert!(cache.dir().is_dir());
    }
}
