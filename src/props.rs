//! Key-value property store for preparation metadata.
//!
//! Every finished preparation records a `prepare.<weighting>_<vehicle>`
//! timestamp here, so operators can tell which hierarchies a graph
//! directory carries and from when. Backed by a small JSON file written
//! through a temp file and rename; an in-memory instance works the same
//! minus persistence.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub struct PropertyStore {
    path: Option<PathBuf>,
    inner: Mutex<FxHashMap<String, String>>,
}

impl PropertyStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a store at `path`, loading existing entries if the file is
    /// there.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut map = FxHashMap::default();
        if path.exists() {
            let file = File::open(&path)
                .with_context(|| format!("failed to open property store {}", path.display()))?;
            let loaded: BTreeMap<String, String> = serde_json::from_reader(BufReader::new(file))
                .context("failed to parse property store JSON")?;
            map.extend(loaded);
        }
        Ok(Self {
            path: Some(path),
            inner: Mutex::new(map),
        })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().get(key).cloned()
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.lock().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.inner.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Sorted keys beginning with `prefix`; used to list prepared
    /// hierarchies.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Writes the store to disk. A no-op for in-memory instances.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        // Stable ordering keeps the file diffable.
        let snapshot: BTreeMap<String, String> = self
            .inner
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let tmp = path.with_extension("tmp");
        let file = File::create(&tmp)
            .with_context(|| format!("failed to create {}", tmp.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &snapshot)
            .context("failed to serialize property store")?;
        fs::rename(&tmp, path)
            .with_context(|| format!("failed to move {} into place", tmp.display()))?;
        Ok(())
    }
}
