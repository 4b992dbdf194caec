//! CSV cache of the last successfully fetched dataset.
//!
//! Layout: `{cache_dir}/{dataset}.csv` plus `{cache_dir}/{dataset}.meta.json`
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Integrity validation on load (content hash, row count > 0)
//! - Quarantine for corrupt files ({filename}.quarantined)
//! - Metadata sidecar per dataset (hash, row count, source, timestamp)

use crate::dataset::Dataset;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("no cached data for '{dataset}' at {}", .path.display())]
    Unavailable { dataset: String, path: PathBuf },

    #[error("corrupt cache entry for '{dataset}': {reason}")]
    Corrupt { dataset: String, reason: String },

    #[error("cache I/O error: {0}")]
    Io(String),
}

/// Metadata sidecar for a cached dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub dataset: String,
    pub source: String,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub data_hash: String,
    pub cached_at: NaiveDateTime,
}

/// Cache status for a single dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub dataset: String,
    pub cached: bool,
    pub source: Option<String>,
    pub row_count: Option<usize>,
    pub cached_at: Option<NaiveDateTime>,
    pub size_bytes: u64,
}

/// The CSV cache.
#[derive(Debug, Clone)]
pub struct CsvCache {
    cache_dir: PathBuf,
}

impl CsvCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `{cache_dir}/{dataset}.csv`
    pub fn data_path(&self, dataset: &str) -> PathBuf {
        self.cache_dir.join(format!("{dataset}.csv"))
    }

    /// `{cache_dir}/{dataset}.meta.json`
    pub fn meta_path(&self, dataset: &str) -> PathBuf {
        self.cache_dir.join(format!("{dataset}.meta.json"))
    }

    pub fn exists(&self, dataset: &str) -> bool {
        self.data_path(dataset).is_file()
    }

    /// Overwrite the cache entry for `dataset`.
    pub fn write(
        &self,
        dataset: &str,
        source: &str,
        data: &Dataset,
    ) -> Result<CacheMeta, CacheError> {
        if data.is_empty() {
            return Err(CacheError::Io("refusing to cache an empty dataset".into()));
        }

        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| CacheError::Io(format!("failed to create dir: {e}")))?;

        let bytes = data
            .to_csv_bytes()
            .map_err(|e| CacheError::Io(format!("csv serialization: {e}")))?;

        let meta = CacheMeta {
            dataset: dataset.to_string(),
            source: source.to_string(),
            row_count: data.len(),
            columns: data.columns().to_vec(),
            data_hash: blake3::hash(&bytes).to_hex().to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| CacheError::Io(format!("meta serialization: {e}")))?;

        // The old sidecar goes first: data without a sidecar still loads,
        // data next to a stale sidecar fails the hash check.
        remove_if_present(&self.meta_path(dataset))?;
        write_atomic(&self.data_path(dataset), &bytes)?;
        write_atomic(&self.meta_path(dataset), &meta_json)?;

        debug!(dataset, source, rows = meta.row_count, "cache entry written");
        Ok(meta)
    }

    /// Load the cached dataset, verifying it against its metadata.
    ///
    /// A file that fails validation is quarantined and reported as corrupt.
    pub fn load(&self, dataset: &str) -> Result<Dataset, CacheError> {
        let path = self.data_path(dataset);
        if !path.is_file() {
            return Err(CacheError::Unavailable {
                dataset: dataset.to_string(),
                path,
            });
        }

        let bytes = fs::read(&path).map_err(|e| CacheError::Io(format!("read: {e}")))?;

        match self.validate(dataset, &bytes) {
            Ok(data) => Ok(data),
            Err(reason) => {
                let quarantine = path.with_extension("csv.quarantined");
                warn!(
                    dataset,
                    path = %path.display(),
                    reason = %reason,
                    "quarantining corrupt cache file"
                );
                if let Err(e) = fs::rename(&path, &quarantine) {
                    warn!(
                        dataset,
                        path = %path.display(),
                        error = %e,
                        "failed to quarantine cache file"
                    );
                }
                if let Err(e) = remove_if_present(&self.meta_path(dataset)) {
                    warn!(dataset, error = %e, "failed to remove cache metadata");
                }
                Err(CacheError::Corrupt {
                    dataset: dataset.to_string(),
                    reason,
                })
            }
        }
    }

    fn validate(&self, dataset: &str, bytes: &[u8]) -> Result<Dataset, String> {
        if let Some(meta) = self.meta(dataset) {
            let hash = blake3::hash(bytes).to_hex().to_string();
            if hash != meta.data_hash {
                return Err("content hash does not match metadata".into());
            }
        }
        let data = Dataset::from_csv(bytes).map_err(|e| e.to_string())?;
        if data.is_empty() {
            return Err("no rows".into());
        }
        Ok(data)
    }

    /// Metadata for a cached dataset, if present and readable.
    pub fn meta(&self, dataset: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(dataset)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Status for each named dataset.
    pub fn status(&self, datasets: &[&str]) -> Vec<CacheStatus> {
        datasets
            .iter()
            .map(|name| {
                let meta = self.meta(name);
                let size_bytes = fs::metadata(self.data_path(name))
                    .map(|m| m.len())
                    .unwrap_or(0);
                CacheStatus {
                    dataset: name.to_string(),
                    cached: self.exists(name),
                    source: meta.as_ref().map(|m| m.source.clone()),
                    row_count: meta.as_ref().map(|m| m.row_count),
                    cached_at: meta.as_ref().map(|m| m.cached_at),
                    size_bytes,
                }
            })
            .collect()
    }

    /// Metadata of every entry in the cache directory, sorted by dataset.
    pub fn entries(&self) -> Result<Vec<CacheMeta>, CacheError> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let dir = fs::read_dir(&self.cache_dir)
            .map_err(|e| CacheError::Io(format!("read dir: {e}")))?;

        let mut metas = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|e| CacheError::Io(format!("dir entry: {e}")))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(dataset) = name.strip_suffix(".meta.json") {
                if let Some(meta) = self.meta(dataset) {
                    metas.push(meta);
                }
            }
        }
        metas.sort_by(|a, b| a.dataset.cmp(&b.dataset));
        Ok(metas)
    }

    /// Delete a dataset's data file and sidecar.
    pub fn remove(&self, dataset: &str) -> Result<(), CacheError> {
        remove_if_present(&self.data_path(dataset))?;
        remove_if_present(&self.meta_path(dataset))
    }
}

fn remove_if_present(path: &Path) -> Result<(), CacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::Io(format!("remove {}: {e}", path.display()))),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    fs::write(&tmp_path, bytes).map_err(|e| CacheError::Io(format!("write: {e}")))?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        CacheError::Io(format!("atomic rename failed: {e}"))
    })
}
