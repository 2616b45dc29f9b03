//! The workspace: a set of projects under one root directory.

use std::path::PathBuf;
use std::sync::Arc;

use moka::sync::Cache;
use tracing::info;

use quire_codec::PathEncoder;
use quire_git::GitRunner;
use quire_types::normalize_path;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::files;
use crate::project::Project;

/// Options for project lookup.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectOptions {
    /// Initialize the backing repository (with its seeded initial commit)
    /// when the project does not exist yet.
    pub create: bool,
}

impl ProjectOptions {
    pub fn create() -> Self {
        Self { create: true }
    }
}

/// Manages the projects below one root directory, one git repository each.
///
/// Project keys are normalized, then encoded into safe directory names, so
/// any key maps to exactly one path segment under the root. Recently used
/// projects are held in a bounded, time-expiring cache.
pub struct Workspace {
    config: Arc<StoreConfig>,
    git: Arc<GitRunner>,
    encoder: PathEncoder,
    projects: Cache<String, Arc<Project>>,
}

impl Workspace {
    pub fn new(config: StoreConfig) -> Self {
        let config = Arc::new(config);
        let git = Arc::new(GitRunner::new(
            config.git_command.clone(),
            config.command_timeout,
        ));
        let projects = Cache::builder()
            .max_capacity(config.project_cache.capacity)
            .time_to_live(config.project_cache.time_to_live)
            .build();
        Self {
            encoder: PathEncoder::new(config.escape_symbol),
            config,
            git,
            projects,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Normalize a project key: path normalization, separator and control
    /// characters replaced by `-`, leading/trailing dots trimmed.
    pub fn normalize_project_key(&self, key: &str) -> String {
        let key = normalize_path(key);
        let key: String = key
            .chars()
            .map(|c| match c {
                '/' | '\\' | '\r' | '\n' | '\t' => '-',
                other => other,
            })
            .collect();
        key.trim_matches('.').to_string()
    }

    fn project_path(&self, normalized_key: &str) -> PathBuf {
        self.config.root_dir.join(self.encoder.encode(normalized_key))
    }

    /// Load a project, creating its repository when asked to. Returns
    /// `Ok(None)` for an absent project without `create`.
    pub async fn load_project(
        &self,
        key: &str,
        options: &ProjectOptions,
    ) -> StoreResult<Option<Arc<Project>>> {
        let key = self.normalize_project_key(key);
        if let Some(project) = self.projects.get(&key) {
            return Ok(Some(project));
        }

        let path = self.project_path(&key);
        if !self.git.repository_exists(&path).await {
            if !options.create {
                return Ok(None);
            }
            self.create_repository(&key, &path).await?;
        }

        let project = Arc::new(Project::new(
            key.clone(),
            path,
            Arc::clone(&self.config),
            Arc::clone(&self.git),
        ));
        self.projects.insert(key, Arc::clone(&project));
        Ok(Some(project))
    }

    async fn create_repository(&self, key: &str, path: &std::path::Path) -> StoreResult<()> {
        info!(project = %key, path = %path.display(), "creating project repository");
        self.git.init_repository(path).await?;
        for (file, content) in &self.config.seed_files {
            files::write_repository_file(path, file, content, &self.config.index_file_name)
                .await?;
        }
        self.git.add_all(path).await?;
        self.git
            .commit(path, "Initial commit", &self.config.default_author)
            .await?;
        Ok(())
    }

    /// Load every project found under the workspace root.
    pub async fn load_projects(&self) -> StoreResult<Vec<Arc<Project>>> {
        let root = &self.config.root_dir;
        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: root.display().to_string(),
                    source,
                })
            }
        };

        let mut projects = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|source| StoreError::Io {
                path: root.display().to_string(),
                source,
            })?;
            let Some(entry) = entry else { break };
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let key = self.encoder.decode(&name);
            if let Some(project) = self.load_project(&key, &ProjectOptions::default()).await? {
                projects.push(project);
            }
        }
        projects.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(projects)
    }

    /// Delete a project and its backing directory tree. Returns `false`
    /// when there was nothing to delete.
    pub async fn delete_project(&self, key: &str) -> StoreResult<bool> {
        let key = self.normalize_project_key(key);
        self.projects.invalidate(&key);
        let path = self.project_path(&key);
        info!(project = %key, "deleting project repository");
        files::remove_tree(&path).await
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("root_dir", &self.config.root_dir)
            .finish()
    }
}
