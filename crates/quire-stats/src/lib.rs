//! Per-file change statistics for the quire content store.
//!
//! The statistics index is a derived view over the backing commit log: for
//! every logical path it keeps the created/updated/deleted version triple,
//! built by replaying parsed change records in commit order (oldest first).
//! An explicit checkpoint (the last incorporated version) makes refreshes
//! incremental: only commits after the checkpoint are ever replayed again.
//!
//! # Key Types
//!
//! - [`StatStore`] — storage interface for the path → record mapping
//! - [`InMemoryStatStore`] — `BTreeMap`-backed store, the default backend
//! - [`JsonFileStatStore`] — JSON-file-persisted store for reuse across runs
//! - [`FileStatistics`] — the replay engine owning a store and a checkpoint

pub mod error;
pub mod stats;
pub mod store;

pub use error::{StatsError, StatsResult};
pub use stats::FileStatistics;
pub use store::{InMemoryStatStore, JsonFileStatStore, StatStore};
