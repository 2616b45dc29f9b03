use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a single commit in a backing repository.
///
/// A version is immutable once parsed from the commit log. The `version_id`
/// is an opaque unique identifier (a content hash in the backing system);
/// ordering between versions is by `timestamp`, with the id and author only
/// breaking ties so that the ordering is total.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    /// Opaque unique identifier of the commit.
    pub version_id: String,
    /// Commit time in milliseconds since the UNIX epoch, UTC.
    pub timestamp: i64,
    /// Author in the free-form `Name <email>` shape.
    pub author: String,
}

impl Version {
    pub fn new(
        version_id: impl Into<String>,
        timestamp: i64,
        author: impl Into<String>,
    ) -> Self {
        Self {
            version_id: version_id.into(),
            timestamp,
            author: author.into(),
        }
    }

    /// Returns `true` if this version falls inside `[from, to]` by timestamp.
    ///
    /// Either bound may be absent, which leaves that side unbounded.
    pub fn in_range(&self, from: Option<&Version>, to: Option<&Version>) -> bool {
        if let Some(from) = from {
            if self.timestamp < from.timestamp {
                return false;
            }
        }
        if let Some(to) = to {
            if self.timestamp > to.timestamp {
                return false;
            }
        }
        true
    }

    /// Returns `true` if this version is strictly newer than `other`.
    pub fn is_newer_than(&self, other: &Version) -> bool {
        self.timestamp > other.timestamp
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.version_id.cmp(&other.version_id))
            .then_with(|| self.author.cmp(&other.author))
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Version({} @{}ms by {})",
            self.version_id, self.timestamp, self.author
        )
    }
}
