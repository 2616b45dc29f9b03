//! Repository file writing with the new-directory index hook.

use std::path::Path;

use crate::error::{StoreError, StoreResult};

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Write one repository-relative file, creating parent directories one
/// component at a time. Every directory this call creates gets an empty
/// index file if one is missing, keeping the invariant that each container
/// resource stays loadable.
pub async fn write_repository_file(
    repo_root: &Path,
    rel_path: &str,
    content: &str,
    index_file_name: &str,
) -> StoreResult<()> {
    let mut dir = repo_root.to_path_buf();
    let segments: Vec<&str> = rel_path.split('/').collect();
    let (file_name, parents) = segments
        .split_last()
        .expect("a relative file path has at least one segment");

    for segment in parents {
        dir.push(segment);
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => {
                let index_path = dir.join(index_file_name);
                if !tokio::fs::try_exists(&index_path).await.unwrap_or(false) {
                    tokio::fs::write(&index_path, "")
                        .await
                        .map_err(io_error(&index_path))?;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(source) => {
                return Err(StoreError::Io {
                    path: dir.display().to_string(),
                    source,
                })
            }
        }
    }

    let file_path = dir.join(file_name);
    tokio::fs::write(&file_path, content)
        .await
        .map_err(io_error(&file_path))
}

/// Recursively remove a directory tree. Returns `false` when it was already
/// absent.
pub async fn remove_tree(path: &Path) -> StoreResult<bool> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StoreError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_nested_file_and_seeds_indexes() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_repository_file(root, "a/b/c.txt", "payload", "index.md")
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(root.join("a/b/c.txt")).unwrap(), "payload");
        assert!(root.join("a/index.md").exists());
        assert!(root.join("a/b/index.md").exists());
    }

    #[tokio::test]
    async fn existing_index_files_are_left_alone() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_repository_file(root, "a/index.md", "container body", "index.md")
            .await
            .unwrap();
        // The directory already exists now, so a second nested write must not
        // clobber the index.
        write_repository_file(root, "a/leaf.txt", "x", "index.md")
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(root.join("a/index.md")).unwrap(),
            "container body"
        );
    }

    #[tokio::test]
    async fn top_level_file_needs_no_directories() {
        let tmp = TempDir::new().unwrap();
        write_repository_file(tmp.path(), "note.txt", "hi", "index.md")
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("note.txt")).unwrap(),
            "hi"
        );
    }

    #[tokio::test]
    async fn remove_tree_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("doomed");
        std::fs::create_dir_all(target.join("deep/inside")).unwrap();
        assert!(remove_tree(&target).await.unwrap());
        assert!(!remove_tree(&target).await.unwrap());
    }
}
