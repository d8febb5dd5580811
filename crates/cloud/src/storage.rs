//! Path-addressed storage over a private (working) or public (served)
//! namespace. The pipeline holds one [`Storage`] handle per namespace.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::CloudError;

/// Path-addressed read/write/copy/delete/list operations.
///
/// All paths are relative to the storage root; `absolute` resolves them
/// for collaborators that need a real filesystem location (the image
/// backend operates on absolute paths).
#[async_trait]
pub trait Storage: Send + Sync {
    async fn exists(&self, path: &str) -> bool;

    async fn make_dir(&self, path: &str) -> Result<(), CloudError>;

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), CloudError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, CloudError>;

    /// Copy a file within this namespace, creating parent directories.
    async fn copy(&self, from: &str, to: &str) -> Result<(), CloudError>;

    async fn delete_dir(&self, path: &str) -> Result<(), CloudError>;

    /// Relative paths of the direct files under `path` (no recursion),
    /// sorted by name. An absent directory lists as empty.
    async fn list_files(&self, path: &str) -> Result<Vec<String>, CloudError>;

    async fn size(&self, path: &str) -> Result<u64, CloudError>;

    /// Absolute filesystem location of a relative path.
    fn absolute(&self, path: &str) -> PathBuf;
}

// ---------------------------------------------------------------------------
// LocalDiskStorage
// ---------------------------------------------------------------------------

/// [`Storage`] over a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    async fn ensure_parent(&self, target: &Path) -> Result<(), CloudError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalDiskStorage {
    async fn exists(&self, path: &str) -> bool {
        fs::try_exists(self.resolve(path)).await.unwrap_or(false)
    }

    async fn make_dir(&self, path: &str) -> Result<(), CloudError> {
        fs::create_dir_all(self.resolve(path)).await?;
        Ok(())
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), CloudError> {
        let target = self.resolve(path);
        self.ensure_parent(&target).await?;
        fs::write(target, bytes).await?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, CloudError> {
        Ok(fs::read(self.resolve(path)).await?)
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), CloudError> {
        let target = self.resolve(to);
        self.ensure_parent(&target).await?;
        fs::copy(self.resolve(from), target).await?;
        Ok(())
    }

    async fn delete_dir(&self, path: &str) -> Result<(), CloudError> {
        let target = self.resolve(path);
        if fs::try_exists(&target).await.unwrap_or(false) {
            fs::remove_dir_all(target).await?;
        }
        Ok(())
    }

    async fn list_files(&self, path: &str) -> Result<Vec<String>, CloudError> {
        let dir = self.resolve(path);
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| format!("{path}/{name}"))
            .collect())
    }

    async fn size(&self, path: &str) -> Result<u64, CloudError> {
        Ok(fs::metadata(self.resolve(path)).await?.len())
    }

    fn absolute(&self, path: &str) -> PathBuf {
        self.resolve(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> (tempfile::TempDir, LocalDiskStorage) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = LocalDiskStorage::new(dir.path());
        (dir, storage)
    }

    #[tokio::test]
    async fn put_get_roundtrip_creates_parents() {
        let (_dir, storage) = storage();
        storage.put("a/b/c.txt", b"hello").await.expect("put");
        assert!(storage.exists("a/b/c.txt").await);
        assert_eq!(storage.get("a/b/c.txt").await.expect("get"), b"hello");
        assert_eq!(storage.size("a/b/c.txt").await.expect("size"), 5);
    }

    #[tokio::test]
    async fn copy_creates_destination_parents() {
        let (_dir, storage) = storage();
        storage.put("src.txt", b"x").await.expect("put");
        storage.copy("src.txt", "deep/nested/dst.txt").await.expect("copy");
        assert_eq!(storage.get("deep/nested/dst.txt").await.expect("get"), b"x");
    }

    #[tokio::test]
    async fn list_files_returns_sorted_relative_paths() {
        let (_dir, storage) = storage();
        storage.put("dir/b.png", b"1").await.expect("put");
        storage.put("dir/a.png", b"2").await.expect("put");
        storage.put("dir/sub/c.png", b"3").await.expect("put");

        let files = storage.list_files("dir").await.expect("list");
        // Direct files only, subdirectory content excluded.
        assert_eq!(files, vec!["dir/a.png".to_string(), "dir/b.png".to_string()]);
    }

    #[tokio::test]
    async fn list_files_on_missing_dir_is_empty() {
        let (_dir, storage) = storage();
        assert!(storage.list_files("nope").await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn delete_dir_is_idempotent() {
        let (_dir, storage) = storage();
        storage.put("gone/f.txt", b"x").await.expect("put");
        storage.delete_dir("gone").await.expect("first delete");
        storage.delete_dir("gone").await.expect("second delete");
        assert!(!storage.exists("gone").await);
    }
}
