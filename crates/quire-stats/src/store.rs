//! Storage backends for the path → record mapping.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use quire_types::FileInfo;

use crate::error::{StatsError, StatsResult};

/// Storage interface for per-path statistics records.
///
/// Implementations must be thread-safe. `get_all` returns a snapshot copy:
/// later mutations of the store never show through a returned map.
pub trait StatStore: Send + Sync {
    /// Read the record for one path. `Ok(None)` when the path is unknown.
    fn get(&self, path: &str) -> StatsResult<Option<FileInfo>>;

    /// Snapshot of every record.
    fn get_all(&self) -> StatsResult<BTreeMap<String, FileInfo>>;

    /// Create or replace the record for a path.
    fn put(&self, path: &str, info: &FileInfo) -> StatsResult<()>;

    /// Remove a record. Returns `true` when it existed.
    fn delete(&self, path: &str) -> StatsResult<bool>;
}

/// In-memory, `BTreeMap`-backed store. The default backend.
#[derive(Debug, Default)]
pub struct InMemoryStatStore {
    entries: RwLock<BTreeMap<String, FileInfo>>,
}

impl InMemoryStatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }
}

impl StatStore for InMemoryStatStore {
    fn get(&self, path: &str) -> StatsResult<Option<FileInfo>> {
        Ok(self.entries.read().expect("lock poisoned").get(path).cloned())
    }

    fn get_all(&self) -> StatsResult<BTreeMap<String, FileInfo>> {
        Ok(self.entries.read().expect("lock poisoned").clone())
    }

    fn put(&self, path: &str, info: &FileInfo) -> StatsResult<()> {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(path.to_string(), info.clone());
        Ok(())
    }

    fn delete(&self, path: &str) -> StatsResult<bool> {
        Ok(self
            .entries
            .write()
            .expect("lock poisoned")
            .remove(path)
            .is_some())
    }
}

/// JSON-file-persisted store.
///
/// The whole mapping is loaded at open and rewritten on every mutation,
/// write-to-temp-then-rename so a crash never leaves a half-written file.
/// Intended to sit outside the tracked tree (e.g. under the repository's
/// metadata directory) so the backing add-all never picks it up.
#[derive(Debug)]
pub struct JsonFileStatStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, FileInfo>>,
}

impl JsonFileStatStore {
    /// Open the store at `path`, loading any previously persisted mapping.
    pub fn open(path: impl Into<PathBuf>) -> StatsResult<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| StatsError::Corrupt {
                path: path.display().to_string(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(StatsError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, FileInfo>) -> StatsResult<()> {
        let io_err = |source| StatsError::Io {
            path: self.path.display().to_string(),
            source,
        };
        let text = serde_json::to_string_pretty(entries).map_err(|source| StatsError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl StatStore for JsonFileStatStore {
    fn get(&self, path: &str) -> StatsResult<Option<FileInfo>> {
        Ok(self.entries.read().expect("lock poisoned").get(path).cloned())
    }

    fn get_all(&self) -> StatsResult<BTreeMap<String, FileInfo>> {
        Ok(self.entries.read().expect("lock poisoned").clone())
    }

    fn put(&self, path: &str, info: &FileInfo) -> StatsResult<()> {
        let mut entries = self.entries.write().expect("lock poisoned");
        entries.insert(path.to_string(), info.clone());
        self.persist(&entries)
    }

    fn delete(&self, path: &str) -> StatsResult<bool> {
        let mut entries = self.entries.write().expect("lock poisoned");
        let existed = entries.remove(path).is_some();
        if existed {
            self.persist(&entries)?;
        }
        Ok(existed)
    }
}
