//! One project: load/store/delete/list/history over a single repository.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use moka::sync::Cache;
use tokio::sync::Mutex;
use tracing::debug;

use quire_codec::{deserialize_resource, serialize_resource, to_file_path, to_resource_key};
use quire_git::{parse_changed_files, GitRunner};
use quire_stats::{FileStatistics, JsonFileStatStore, StatsError};
use quire_types::{normalize_path, FileInfo, Resource, Version};

use crate::config::{StatsBackend, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::files;

/// Options for resource loads.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// Create the resource (as an empty file, committed) when it is absent.
    pub create: bool,
    /// Commit comment for a creation; autogenerated when absent.
    pub comment: Option<String>,
    /// Commit author for a creation; the configured system identity when
    /// absent.
    pub author: Option<String>,
}

impl LoadOptions {
    pub fn create() -> Self {
        Self {
            create: true,
            ..Self::default()
        }
    }
}

/// Options for stores and deletes.
#[derive(Clone, Debug, Default)]
pub struct StoreOptions {
    pub comment: Option<String>,
    pub author: Option<String>,
}

/// A timestamp range over versions; either bound may be absent.
#[derive(Clone, Debug, Default)]
pub struct HistoryRange {
    pub from: Option<Version>,
    pub to: Option<Version>,
}

/// State guarded by the per-project operation lock.
struct ProjectState {
    stats: Option<FileStatistics>,
}

/// One project over one backing repository.
///
/// Every public operation funnels through one per-project async mutex, so
/// concurrent callers serialize instead of interleaving mutations of the
/// backing repository. The resource cache is consulted before the lock is
/// taken; a hit never touches the repository.
pub struct Project {
    key: String,
    path: PathBuf,
    config: Arc<StoreConfig>,
    git: Arc<GitRunner>,
    cache: Cache<String, Resource>,
    state: Mutex<ProjectState>,
}

impl Project {
    pub(crate) fn new(
        key: String,
        path: PathBuf,
        config: Arc<StoreConfig>,
        git: Arc<GitRunner>,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.resource_cache.capacity)
            .time_to_live(config.resource_cache.time_to_live)
            .build();
        Self {
            key,
            path,
            config,
            git,
            cache,
            state: Mutex::new(ProjectState { stats: None }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Full path of the backing repository.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // -----------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------

    /// Load one resource. Absent resources are `Ok(None)` unless
    /// `options.create` asks for them to be committed as empty files first.
    pub async fn load_resource(
        &self,
        key: &str,
        options: &LoadOptions,
    ) -> StoreResult<Option<Resource>> {
        let mut state = self.state.lock().await;
        self.load_resource_locked(&mut state, key, options).await
    }

    /// Load several resources in one serialized pass. Absent keys are
    /// omitted from the result.
    pub async fn load_resources(
        &self,
        keys: &[String],
        options: &LoadOptions,
    ) -> StoreResult<BTreeMap<String, Resource>> {
        let mut state = self.state.lock().await;
        self.load_resources_locked(&mut state, keys, options).await
    }

    /// Load the direct children of a container resource. The index file and
    /// the version-control metadata directory are never children; a missing
    /// directory yields an empty map.
    pub async fn load_child_resources(
        &self,
        key: &str,
        options: &LoadOptions,
    ) -> StoreResult<BTreeMap<String, Resource>> {
        let mut state = self.state.lock().await;
        let rkey = self.resource_key(key);
        let dir = if rkey.is_empty() {
            self.path.clone()
        } else {
            self.path.join(&rkey)
        };

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new())
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: dir.display().to_string(),
                    source,
                })
            }
        };
        let mut names: Vec<String> = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|source| StoreError::Io {
                path: dir.display().to_string(),
                source,
            })?;
            let Some(entry) = entry else { break };
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == self.config.index_file_name || name == ".git" {
                continue;
            }
            names.push(name);
        }
        names.sort();

        let keys: Vec<String> = names
            .into_iter()
            .map(|name| {
                if rkey.is_empty() {
                    name
                } else {
                    format!("{rkey}/{name}")
                }
            })
            .collect();
        self.load_resources_locked(&mut state, &keys, options).await
    }

    /// Delete a resource. Always `Ok(true)`: deleting what is not there is
    /// not an error.
    pub async fn delete_resource(&self, key: &str, options: &StoreOptions) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let rkey = self.resource_key(key);
        let file_path = to_file_path(&rkey, &self.config.index_file_name);
        self.cache.invalidate(&rkey);

        let absolute = self.path.join(&file_path);
        if !tokio::fs::try_exists(&absolute).await.unwrap_or(false) {
            debug!(key = %rkey, "delete of an absent resource is a no-op");
            return Ok(true);
        }

        let comment = options
            .comment
            .clone()
            .unwrap_or_else(|| format!("Remove \"{rkey}\"."));
        let author = self.author_from(options.author.as_deref());
        self.git.remove_files(&self.path, &[file_path]).await?;
        self.git.commit(&self.path, &comment, &author).await?;
        self.update_stats(&mut state, false).await?;
        Ok(true)
    }

    /// Serialize and store a resource, committing the write. The returned
    /// resource is re-read from the repository so it reflects the version
    /// just written, never a stale cached copy.
    pub async fn store_resource(
        &self,
        resource: &Resource,
        options: &StoreOptions,
    ) -> StoreResult<Resource> {
        let mut state = self.state.lock().await;
        let rkey = self.resource_key(resource.key());
        let content = serialize_resource(resource);
        let (comment, author) =
            self.commit_meta(&rkey, options.comment.as_deref(), options.author.as_deref());
        self.save_files(&mut state, &[(rkey.clone(), content)], &comment, &author)
            .await?;

        let info = self.live_stat(&state, &rkey)?.unwrap_or_default();
        let stored = self.read_resource(&rkey, info, None).await?;
        self.cache.insert(rkey, stored.clone());
        Ok(stored)
    }

    /// Snapshot of the statistics index, restricted to records with any
    /// version inside the range.
    pub async fn load_modified_resources(
        &self,
        range: &HistoryRange,
    ) -> StoreResult<BTreeMap<String, FileInfo>> {
        let mut state = self.state.lock().await;
        self.update_stats(&mut state, false).await?;
        let stats = state.stats.as_ref().expect("statistics initialized by update");
        let all = stats.get_all()?;
        Ok(all
            .into_iter()
            .filter(|(_, info)| info.any_in_range(range.from.as_ref(), range.to.as_ref()))
            .collect())
    }

    /// Every version of one resource whose timestamp falls in the range,
    /// oldest first.
    pub async fn load_resource_history(
        &self,
        key: &str,
        range: &HistoryRange,
    ) -> StoreResult<Vec<Version>> {
        let _state = self.state.lock().await;
        let rkey = self.resource_key(key);
        let file_path = to_file_path(&rkey, &self.config.index_file_name);
        let mut history = Vec::new();
        self.git
            .log_for_path(&self.path, &file_path, |record| {
                let version = record.version();
                if version.in_range(range.from.as_ref(), range.to.as_ref()) {
                    history.push(version);
                }
            })
            .await?;
        Ok(history)
    }

    /// Read a resource's content as of each requested version, stamping each
    /// result's `updated` field with the version it was read at.
    pub async fn load_resource_revisions(
        &self,
        key: &str,
        versions: &[Version],
    ) -> StoreResult<Vec<Resource>> {
        let mut state = self.state.lock().await;
        self.update_stats(&mut state, false).await?;
        let rkey = self.resource_key(key);
        let base = match state.stats.as_ref() {
            Some(stats) => stats.get(&rkey)?.unwrap_or_default(),
            None => FileInfo::default(),
        };

        let mut revisions = Vec::with_capacity(versions.len());
        for version in versions {
            let mut info = base.clone();
            info.updated = Some(version.clone());
            let resource = self
                .read_resource(&rkey, info, Some(&version.version_id))
                .await?;
            revisions.push(resource);
        }
        Ok(revisions)
    }

    /// Resource search. Not implemented.
    pub async fn search_resources(&self, _query: &str) -> StoreResult<Vec<Resource>> {
        Err(StoreError::SearchUnimplemented)
    }

    /// Throw the statistics index away and replay the full commit log.
    pub async fn rebuild_statistics(&self) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        self.update_stats(&mut state, true).await
    }

    // -----------------------------------------------------------------
    // Internals (called with the operation lock held)
    // -----------------------------------------------------------------

    async fn load_resource_locked(
        &self,
        state: &mut ProjectState,
        key: &str,
        options: &LoadOptions,
    ) -> StoreResult<Option<Resource>> {
        let rkey = self.resource_key(key);
        if let Some(hit) = self.cache.get(&rkey) {
            debug!(key = %rkey, "resource cache hit");
            return Ok(Some(hit));
        }

        self.update_stats(state, false).await?;
        let mut info = self.live_stat(state, &rkey)?;
        if info.is_none() && options.create {
            let (comment, author) =
                self.commit_meta(&rkey, options.comment.as_deref(), options.author.as_deref());
            self.save_files(state, &[(rkey.clone(), String::new())], &comment, &author)
                .await?;
            info = self.live_stat(state, &rkey)?;
        }
        let Some(info) = info else {
            return Ok(None);
        };

        let resource = self.read_resource(&rkey, info, None).await?;
        self.cache.insert(rkey, resource.clone());
        Ok(Some(resource))
    }

    async fn load_resources_locked(
        &self,
        state: &mut ProjectState,
        keys: &[String],
        options: &LoadOptions,
    ) -> StoreResult<BTreeMap<String, Resource>> {
        let mut result = BTreeMap::new();
        for key in keys {
            let rkey = self.resource_key(key);
            if let Some(resource) = self.load_resource_locked(state, key, options).await? {
                result.insert(rkey, resource);
            }
        }
        Ok(result)
    }

    /// Build or incrementally catch up the statistics index by replaying the
    /// commit log, oldest first, from the last checkpoint.
    async fn update_stats(&self, state: &mut ProjectState, rebuild: bool) -> StoreResult<()> {
        if rebuild || state.stats.is_none() {
            state.stats = Some(self.new_statistics()?);
        }
        let stats = state.stats.as_mut().expect("statistics just initialized");
        let since = stats.checkpoint().map(|v| v.version_id.clone());
        let index_file = self.config.index_file_name.clone();

        let mut failure: Option<StatsError> = None;
        self.git
            .log_with_changes(&self.path, since.as_deref(), |record| {
                if failure.is_some() {
                    return;
                }
                let version = record.version();
                let changes = parse_changed_files(&record.data)
                    .into_iter()
                    .map(|(file_path, status)| (to_resource_key(&file_path, &index_file), status));
                if let Err(err) = stats.apply_commit(&version, changes) {
                    failure = Some(err);
                }
            })
            .await?;
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn new_statistics(&self) -> StoreResult<FileStatistics> {
        Ok(match self.config.stats_backend {
            StatsBackend::Memory => FileStatistics::in_memory(),
            StatsBackend::JsonFile => {
                let file = self.path.join(".git").join("filestats.json");
                FileStatistics::with_store(Box::new(JsonFileStatStore::open(file)?))
            }
        })
    }

    fn live_stat(&self, state: &ProjectState, rkey: &str) -> StoreResult<Option<FileInfo>> {
        let Some(stats) = state.stats.as_ref() else {
            return Ok(None);
        };
        Ok(stats.get(rkey)?.filter(FileInfo::is_live))
    }

    /// Write the given `(resource key, content)` pairs, stage everything,
    /// commit, and catch the statistics up to the new tip.
    async fn save_files(
        &self,
        state: &mut ProjectState,
        entries: &[(String, String)],
        comment: &str,
        author: &str,
    ) -> StoreResult<()> {
        for (rkey, content) in entries {
            let file_path = to_file_path(rkey, &self.config.index_file_name);
            files::write_repository_file(
                &self.path,
                &file_path,
                content,
                &self.config.index_file_name,
            )
            .await?;
        }
        self.git.add_all(&self.path).await?;
        self.git.commit(&self.path, comment, author).await?;
        self.update_stats(state, false).await
    }

    async fn read_resource(
        &self,
        rkey: &str,
        info: FileInfo,
        revision: Option<&str>,
    ) -> StoreResult<Resource> {
        let file_path = to_file_path(rkey, &self.config.index_file_name);
        let content = self
            .git
            .read_file_at_revision(&self.path, &file_path, revision)
            .await?;
        let mut resource = Resource::new(rkey);
        resource.set_info(info);
        deserialize_resource(&content, &mut resource);
        Ok(resource)
    }

    fn resource_key(&self, key: &str) -> String {
        to_resource_key(&normalize_path(key), &self.config.index_file_name)
    }

    fn commit_meta(
        &self,
        rkey: &str,
        comment: Option<&str>,
        author: Option<&str>,
    ) -> (String, String) {
        let comment = comment.map(str::to_string).unwrap_or_else(|| {
            format!(
                "Commit \"{rkey}\" at {}.",
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
            )
        });
        (comment, self.author_from(author))
    }

    fn author_from(&self, author: Option<&str>) -> String {
        author.unwrap_or(&self.config.default_author).to_string()
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("key", &self.key)
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::{ProjectOptions, Workspace};
    use tempfile::TempDir;

    async fn test_project(tmp: &TempDir, name: &str) -> Arc<Project> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let ws = Workspace::new(StoreConfig::new(tmp.path().join("repository")));
        ws.load_project(name, &ProjectOptions::create())
            .await
            .unwrap()
            .unwrap()
    }

    fn resource(key: &str, body: &str, label: &str) -> Resource {
        let mut resource = Resource::new(key);
        resource.set_content(body);
        resource.set_property("label", label);
        resource
    }

    #[tokio::test]
    async fn create_and_load_at_various_keys() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp, "test").await;

        for key in ["a", "a/b.txt", "a/c.txt"] {
            let loaded = project
                .load_resource(key, &LoadOptions::create())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(loaded.key(), key);
            assert!(loaded.info().is_live());
        }
        // All three now load without `create`.
        for key in ["a", "a/b.txt", "a/c.txt"] {
            assert!(project
                .load_resource(key, &LoadOptions::default())
                .await
                .unwrap()
                .is_some());
        }
    }

    #[tokio::test]
    async fn absent_resource_without_create_is_none() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp, "test").await;
        assert!(project
            .load_resource("nowhere", &LoadOptions::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn store_round_trips_body_and_families() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp, "test").await;

        let mut input = resource("docs/guide", "A guide.\n\nWith two paragraphs.", "guide");
        input.set_family_property("meta", "reviewed", "yes");
        let stored = project
            .store_resource(&input, &StoreOptions::default())
            .await
            .unwrap();
        assert_eq!(stored.key(), "docs/guide");
        assert_eq!(stored.content(), "A guide.\n\nWith two paragraphs.");
        assert_eq!(stored.property("label"), Some("guide"));
        assert_eq!(
            stored.family("meta").unwrap().get("reviewed").unwrap(),
            "yes"
        );
        assert!(stored.info().created.is_some());

        let reloaded = project
            .load_resource("docs/guide", &LoadOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.content(), stored.content());
        assert_eq!(reloaded.property("label"), Some("guide"));
    }

    #[tokio::test]
    async fn repeated_stores_produce_ordered_history_and_revisions() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp, "test").await;
        let key = "abc/hello.toto";

        for i in 0..10 {
            let input = resource(key, &format!("content {i}"), &format!("label-{i}"));
            project
                .store_resource(&input, &StoreOptions::default())
                .await
                .unwrap();
        }

        let history = project
            .load_resource_history(key, &HistoryRange::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 10);
        assert!(history
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));

        let revisions = project.load_resource_revisions(key, &history).await.unwrap();
        assert_eq!(revisions.len(), 10);
        for (i, revision) in revisions.iter().enumerate() {
            assert_eq!(revision.content(), format!("content {i}"));
            assert_eq!(
                revision.property("label"),
                Some(format!("label-{i}").as_str())
            );
            assert_eq!(revision.info().updated.as_ref(), Some(&history[i]));
        }
    }

    #[tokio::test]
    async fn history_range_filters_by_timestamp() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp, "test").await;
        let key = "ranged.txt";
        project
            .store_resource(&resource(key, "v", "l"), &StoreOptions::default())
            .await
            .unwrap();

        let far_future = Version::new("bound", i64::MAX, "t <t@t>");
        let none = project
            .load_resource_history(
                key,
                &HistoryRange {
                    from: Some(far_future.clone()),
                    to: None,
                },
            )
            .await
            .unwrap();
        assert!(none.is_empty());

        let all = project
            .load_resource_history(
                key,
                &HistoryRange {
                    from: None,
                    to: Some(far_future),
                },
            )
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_load_after_delete_is_none() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp, "test").await;

        // Deleting what never existed succeeds.
        assert!(project
            .delete_resource("ghost", &StoreOptions::default())
            .await
            .unwrap());
        assert!(project
            .load_resource("ghost", &LoadOptions::default())
            .await
            .unwrap()
            .is_none());

        // A real resource deletes and then reads as absent.
        project
            .store_resource(&resource("temp/doc.txt", "body", "l"), &StoreOptions::default())
            .await
            .unwrap();
        assert!(project
            .delete_resource("temp/doc.txt", &StoreOptions::default())
            .await
            .unwrap());
        assert!(project
            .load_resource("temp/doc.txt", &LoadOptions::default())
            .await
            .unwrap()
            .is_none());
        // And deleting again still succeeds.
        assert!(project
            .delete_resource("temp/doc.txt", &StoreOptions::default())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn children_are_direct_only() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp, "test").await;
        for key in ["a/b", "a/d/c.txt", "a/b/c", "a/n.txt"] {
            project
                .load_resource(key, &LoadOptions::create())
                .await
                .unwrap()
                .unwrap();
        }

        let children = project
            .load_child_resources("a", &LoadOptions::default())
            .await
            .unwrap();
        let keys: Vec<&str> = children.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a/b", "a/d", "a/n.txt"]);
        for (key, child) in &children {
            assert_eq!(child.key(), key);
        }
    }

    #[tokio::test]
    async fn children_of_a_missing_container_are_empty() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp, "test").await;
        let children = project
            .load_child_resources("void", &LoadOptions::default())
            .await
            .unwrap();
        assert!(children.is_empty());
    }

    #[tokio::test]
    async fn modified_resources_respect_the_range() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp, "test").await;
        project
            .store_resource(&resource("one.txt", "1", "l"), &StoreOptions::default())
            .await
            .unwrap();

        let all = project
            .load_modified_resources(&HistoryRange::default())
            .await
            .unwrap();
        assert!(all.contains_key("one.txt"));

        let filtered = project
            .load_modified_resources(&HistoryRange {
                from: Some(Version::new("bound", i64::MAX, "t <t@t>")),
                to: None,
            })
            .await
            .unwrap();
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn commit_metadata_options_are_applied() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp, "test").await;
        let options = StoreOptions {
            comment: Some("Custom comment".to_string()),
            author: Some("Jane Doe <jane@example.org>".to_string()),
        };
        project
            .store_resource(&resource("authored.txt", "x", "l"), &options)
            .await
            .unwrap();

        let history = project
            .load_resource_history("authored.txt", &HistoryRange::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].author.contains("jane@example.org"));
    }

    #[tokio::test]
    async fn batch_load_omits_absent_keys() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp, "test").await;
        project
            .store_resource(&resource("here.txt", "x", "l"), &StoreOptions::default())
            .await
            .unwrap();

        let keys = vec!["here.txt".to_string(), "absent.txt".to_string()];
        let loaded = project
            .load_resources(&keys, &LoadOptions::default())
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("here.txt"));
    }

    #[tokio::test]
    async fn rebuild_matches_incremental_state() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp, "test").await;
        project
            .store_resource(&resource("r.txt", "1", "a"), &StoreOptions::default())
            .await
            .unwrap();
        let before = project
            .load_modified_resources(&HistoryRange::default())
            .await
            .unwrap();

        project.rebuild_statistics().await.unwrap();
        let after = project
            .load_modified_resources(&HistoryRange::default())
            .await
            .unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn search_is_a_stub() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp, "test").await;
        let err = project.search_resources("anything").await.unwrap_err();
        assert!(matches!(err, StoreError::SearchUnimplemented));
    }

    #[tokio::test]
    async fn stats_catch_up_is_incremental_across_operations() {
        let tmp = TempDir::new().unwrap();
        let project = test_project(&tmp, "test").await;
        project
            .store_resource(&resource("inc.txt", "1", "a"), &StoreOptions::default())
            .await
            .unwrap();
        project
            .store_resource(&resource("inc.txt", "2", "b"), &StoreOptions::default())
            .await
            .unwrap();

        let info = project
            .load_modified_resources(&HistoryRange::default())
            .await
            .unwrap()
            .remove("inc.txt")
            .unwrap();
        assert!(info.created.is_some());
        // The reload after the second store reflects the newer content.
        let current = project
            .load_resource("inc.txt", &LoadOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.content(), "2");
    }
}
