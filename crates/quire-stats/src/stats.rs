//! The statistics replay engine.

use std::collections::BTreeMap;

use tracing::debug;

use quire_types::{ChangeStatus, FileInfo, Version};

use crate::error::StatsResult;
use crate::store::{InMemoryStatStore, StatStore};

/// Per-path statistics built by replaying the backing commit log.
///
/// Change records must be applied in commit order, oldest first; the record
/// merge policy (see [`FileInfo::apply`]) makes replay idempotent, so
/// re-applying an already-seen commit is harmless. The checkpoint is the
/// most recent version fully incorporated (tracked by max timestamp); a
/// caller refreshing the index requests only commits after
/// `checkpoint().version_id` from the log.
pub struct FileStatistics {
    store: Box<dyn StatStore>,
    checkpoint: Option<Version>,
}

impl FileStatistics {
    /// An empty index over the default in-memory store.
    pub fn in_memory() -> Self {
        Self::with_store(Box::new(InMemoryStatStore::new()))
    }

    /// An empty index over a caller-chosen store. A persistent store may
    /// already hold records, but the checkpoint always starts unset; the
    /// first refresh replays the full log over it (idempotently).
    pub fn with_store(store: Box<dyn StatStore>) -> Self {
        Self {
            store,
            checkpoint: None,
        }
    }

    /// The last incorporated version, by max timestamp seen.
    pub fn checkpoint(&self) -> Option<&Version> {
        self.checkpoint.as_ref()
    }

    /// Apply one change record. Returns `true` when the path's record
    /// actually changed (a stale `Modified` is a no-op).
    pub fn update_status(
        &mut self,
        path: &str,
        status: ChangeStatus,
        version: &Version,
    ) -> StatsResult<bool> {
        let mut info = self.store.get(path)?.unwrap_or_default();
        let changed = info.apply(status, version);
        if changed {
            self.store.put(path, &info)?;
        } else {
            debug!(%path, ?status, "ignoring stale change record");
        }
        Ok(changed)
    }

    /// Incorporate one commit: advance the checkpoint, then apply each of
    /// its per-path change records.
    pub fn apply_commit<I>(&mut self, version: &Version, changes: I) -> StatsResult<()>
    where
        I: IntoIterator<Item = (String, ChangeStatus)>,
    {
        match &self.checkpoint {
            Some(current) if current.timestamp >= version.timestamp => {}
            _ => self.checkpoint = Some(version.clone()),
        }
        for (path, status) in changes {
            self.update_status(&path, status, version)?;
        }
        Ok(())
    }

    pub fn get(&self, path: &str) -> StatsResult<Option<FileInfo>> {
        self.store.get(path)
    }

    /// Snapshot of every record.
    pub fn get_all(&self) -> StatsResult<BTreeMap<String, FileInfo>> {
        self.store.get_all()
    }
}

impl std::fmt::Debug for FileStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStatistics")
            .field("checkpoint", &self.checkpoint)
            .finish()
    }
}
