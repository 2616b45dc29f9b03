//! Store configuration.
//!
//! One explicit, immutable [`StoreConfig`] is constructed up front and
//! passed down to every component that needs it; there are no shared
//! module-level defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Bounds for one LRU cache.
#[derive(Clone, Copy, Debug)]
pub struct CacheConfig {
    pub capacity: u64,
    pub time_to_live: Duration,
}

impl CacheConfig {
    pub fn new(capacity: u64, time_to_live: Duration) -> Self {
        Self {
            capacity,
            time_to_live,
        }
    }
}

/// Which backend holds the per-project statistics index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatsBackend {
    /// In-memory map, rebuilt per process.
    #[default]
    Memory,
    /// JSON file under the repository's metadata directory, reloaded across
    /// runs (the checkpoint stays per-process, so a reload replays the log
    /// idempotently over the persisted records).
    JsonFile,
}

/// Configuration shared by a workspace and its projects.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory holding one subdirectory per project repository.
    pub root_dir: PathBuf,
    /// Name of the file backing a container resource.
    pub index_file_name: String,
    /// Program name (or path) of the backing version-control tool.
    pub git_command: String,
    /// Hard ceiling for any single backing-tool invocation.
    pub command_timeout: Duration,
    /// Commit identity used when an operation supplies no author.
    pub default_author: String,
    /// Escape symbol for encoding project keys into directory names.
    pub escape_symbol: char,
    /// Files committed when a project repository is created.
    pub seed_files: Vec<(String, String)>,
    pub project_cache: CacheConfig,
    pub resource_cache: CacheConfig,
    pub stats_backend: StatsBackend,
}

impl StoreConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            index_file_name: "index.md".to_string(),
            git_command: "git".to_string(),
            command_timeout: Duration::from_secs(60),
            default_author: "system <system@system>".to_string(),
            escape_symbol: '_',
            seed_files: vec![
                (".gitignore".to_string(), "/*~\n/.settings\n/.lock".to_string()),
                (".root".to_string(), String::new()),
            ],
            project_cache: CacheConfig::new(500, Duration::from_secs(60 * 60)),
            resource_cache: CacheConfig::new(1000, Duration::from_secs(60 * 60)),
            stats_backend: StatsBackend::Memory,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("./repository")
    }
}
