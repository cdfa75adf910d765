//! Handler discovery.
//!
//! # Responsibilities
//! - Walk a directory tree once at startup
//! - Collect every file whose name contains a keyword
//! - Return the matches in a stable, reproducible order
//!
//! # Design Decisions
//! - Pure data out: discovery never loads or mounts anything
//! - Sorted by `/`-joined relative path, so mount order only depends on the tree
//! - Symlinked directories are not followed (no cycles)

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

/// A file found by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredModule {
    /// Path on disk (root joined with the relative path).
    pub path: PathBuf,
    /// Relative path without the final extension, `/`-separated.
    pub module_id: String,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery keyword must not be empty")]
    EmptyKeyword,

    #[error("discovery root {path} is unavailable: {source}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Find every file under `root` whose file name contains `keyword`.
pub async fn discover(root: &Path, keyword: &str) -> Result<Vec<DiscoveredModule>, DiscoveryError> {
    if keyword.is_empty() {
        return Err(DiscoveryError::EmptyKeyword);
    }

    let metadata = fs::metadata(root)
        .await
        .map_err(|source| DiscoveryError::RootUnavailable {
            path: root.to_path_buf(),
            source,
        })?;
    if !metadata.is_dir() {
        return Err(DiscoveryError::RootUnavailable {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
        });
    }

    // (relative path segments, absolute path)
    let mut found: Vec<(String, PathBuf)> = Vec::new();
    let mut pending: Vec<(PathBuf, Vec<String>)> = vec![(root.to_path_buf(), Vec::new())];

    while let Some((dir, segments)) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await.map_err(|source| DiscoveryError::Read {
            path: dir.clone(),
            source,
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|source| DiscoveryError::Read {
            path: dir.clone(),
            source,
        })? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|source| DiscoveryError::Read {
                path: path.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();

            let is_file = if file_type.is_symlink() {
                // Only follow links that resolve to regular files
                fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false)
            } else {
                file_type.is_file()
            };

            if file_type.is_dir() {
                let mut child = segments.clone();
                child.push(name);
                pending.push((path, child));
            } else if is_file && name.contains(keyword) {
                let mut relative = segments.clone();
                relative.push(name);
                found.push((relative.join("/"), path));
            }
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));

    tracing::debug!(
        root = %root.display(),
        keyword,
        matches = found.len(),
        "Discovery finished"
    );

    Ok(found
        .into_iter()
        .map(|(relative, path)| DiscoveredModule {
            module_id: strip_extension(&relative).to_string(),
            path,
        })
        .collect())
}

/// `ping/ping_router.rs` → `ping/ping_router`. Dotfiles keep their name.
fn strip_extension(relative: &str) -> &str {
    let file_start = relative.rfind('/').map(|i| i + 1).unwrap_or(0);
    match relative[file_start..].rfind('.') {
        Some(dot) if dot > 0 => &relative[..file_start + dot],
        _ => relative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std_fs::create_dir_all(path.parent().unwrap()).unwrap();
        std_fs::write(path, b"").unwrap();
    }

    #[tokio::test]
    async fn test_finds_matching_files_in_stable_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "users/users_router.rs");
        touch(dir.path(), "users/users_service.rs");
        touch(dir.path(), "boards/cards/cards_router.rs");
        touch(dir.path(), "boards/boards_router.rs");
        touch(dir.path(), "auth_router.rs");
        touch(dir.path(), "mod.rs");

        let first = discover(dir.path(), "router").await.unwrap();
        let ids: Vec<_> = first.iter().map(|m| m.module_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "auth_router",
                "boards/boards_router",
                "boards/cards/cards_router",
                "users/users_router"
            ]
        );
        assert_eq!(first[3].path, dir.path().join("users/users_router.rs"));

        for _ in 0..5 {
            assert_eq!(discover(dir.path(), "router").await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn test_directories_named_like_keyword_are_not_matches() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "router/index.rs");
        touch(dir.path(), "router/main.router.rs");

        let found = discover(dir.path(), "router").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].module_id, "router/main.router");
    }

    #[tokio::test]
    async fn test_no_matches_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "users/service.rs");
        assert!(discover(dir.path(), "router").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keyword_is_literal() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.router.rs");
        touch(dir.path(), "a_router.rs");

        let found = discover(dir.path(), ".router").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].module_id, "a.router");
    }

    #[tokio::test]
    async fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let result = discover(&dir.path().join("absent"), "router").await;
        assert!(matches!(result, Err(DiscoveryError::RootUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_root_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "file_router.rs");
        let result = discover(&dir.path().join("file_router.rs"), "router").await;
        assert!(matches!(result, Err(DiscoveryError::RootUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_empty_keyword() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover(dir.path(), "").await,
            Err(DiscoveryError::EmptyKeyword)
        ));
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("ping/ping_router.rs"), "ping/ping_router");
        assert_eq!(strip_extension("a.b/c.router.rs"), "a.b/c.router");
        assert_eq!(strip_extension("router"), "router");
        assert_eq!(strip_extension("dir/.router"), "dir/.router");
    }
}
