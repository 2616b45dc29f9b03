//! Per-path change records derived from the backing commit log.

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// Kind of change recorded for one path in one commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
}

impl ChangeStatus {
    /// Parse a status marker character as it appears at the end of the first
    /// tab-separated field of a change line. Unknown markers yield `None` and
    /// must leave any record untouched.
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            'A' => Some(Self::Added),
            'M' => Some(Self::Modified),
            'D' => Some(Self::Deleted),
            _ => None,
        }
    }

    pub fn marker(&self) -> char {
        match self {
            Self::Added => 'A',
            Self::Modified => 'M',
            Self::Deleted => 'D',
        }
    }
}

/// Created/updated/deleted summary for one logical path.
///
/// A record is mutated exclusively by [`FileInfo::apply`], replaying change
/// records in commit order (oldest first). A path can accumulate all three
/// fields across its lifetime: created, later updated, later deleted, and
/// created again after that.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub created: Option<Version>,
    pub updated: Option<Version>,
    pub deleted: Option<Version>,
}

impl FileInfo {
    /// Apply one change record. Returns `true` when the record changed.
    ///
    /// - `Added` overwrites `created` unconditionally (last wins).
    /// - `Modified` only advances `updated` to a strictly newer timestamp;
    ///   stale or duplicate records are ignored, so replay is idempotent.
    /// - `Deleted` overwrites `deleted` unconditionally.
    pub fn apply(&mut self, status: ChangeStatus, version: &Version) -> bool {
        match status {
            ChangeStatus::Added => {
                self.created = Some(version.clone());
                true
            }
            ChangeStatus::Modified => match &self.updated {
                Some(existing) if existing.timestamp >= version.timestamp => false,
                _ => {
                    self.updated = Some(version.clone());
                    true
                }
            },
            ChangeStatus::Deleted => {
                self.deleted = Some(version.clone());
                true
            }
        }
    }

    /// The most recent version present on this record, by timestamp.
    pub fn latest(&self) -> Option<&Version> {
        [&self.created, &self.updated, &self.deleted]
            .into_iter()
            .flatten()
            .max_by_key(|v| v.timestamp)
    }

    /// The version a reader of the current content should be attributed to:
    /// the last update when present, otherwise the creation.
    pub fn current(&self) -> Option<&Version> {
        self.updated.as_ref().or(self.created.as_ref())
    }

    /// Returns `true` when the path currently exists in the repository.
    ///
    /// The backing tool's timestamps are second-granular, so a deletion and a
    /// re-creation can carry equal timestamps; ties resolve toward deleted.
    pub fn is_live(&self) -> bool {
        let newest_presence = [&self.created, &self.updated]
            .into_iter()
            .flatten()
            .map(|v| v.timestamp)
            .max();
        match (newest_presence, &self.deleted) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(present), Some(deleted)) => present > deleted.timestamp,
        }
    }

    /// Returns `true` when any of the three versions falls in `[from, to]`.
    pub fn any_in_range(&self, from: Option<&Version>, to: Option<&Version>) -> bool {
        [&self.created, &self.updated, &self.deleted]
            .into_iter()
            .flatten()
            .any(|v| v.in_range(from, to))
    }
}
