//! Remote source folder boundary: listing, fetching, and folder
//! metadata, plus an in-memory implementation used by tests across the
//! workspace.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::CloudError;

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteEntryKind {
    File,
    Dir,
}

/// One entry of a remote folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Display name (e.g. `a.png`).
    pub name: String,
    /// Stable remote identifier for dedup (unique across the source).
    pub basename: String,
    /// Full remote path, usable with [`RemoteFolder::get`] or, for
    /// directories, with [`RemoteFolder::list`].
    pub path: String,
    pub kind: RemoteEntryKind,
    /// Lowercase extension for files, `None` for directories.
    pub extension: Option<String>,
}

// ---------------------------------------------------------------------------
// RemoteFolder
// ---------------------------------------------------------------------------

/// Listing and fetching over a cloud-hosted folder tree.
#[async_trait]
pub trait RemoteFolder: Send + Sync {
    /// Entries directly under `folder_path`.
    async fn list(&self, folder_path: &str) -> Result<Vec<RemoteEntry>, CloudError>;

    /// Raw bytes of the file at `path`.
    async fn get(&self, path: &str) -> Result<Vec<u8>, CloudError>;

    /// Display name of the folder, for progress messages.
    async fn folder_name(&self, folder_path: &str) -> Result<String, CloudError>;
}

// ---------------------------------------------------------------------------
// MemoryRemoteFolder
// ---------------------------------------------------------------------------

/// In-memory [`RemoteFolder`] for tests: folders are registered up-front
/// and listings can be forced to fail to exercise degraded paths.
#[derive(Debug, Default)]
pub struct MemoryRemoteFolder {
    folders: Mutex<HashMap<String, Vec<RemoteEntry>>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    broken: Mutex<Vec<String>>,
}

impl MemoryRemoteFolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file under `folder`, addressable as `<folder>/<name>`.
    pub fn add_file(&self, folder: &str, name: &str, bytes: &[u8]) {
        let path = format!("{folder}/{name}");
        let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase());
        let entry = RemoteEntry {
            name: name.to_string(),
            basename: name.to_string(),
            path: path.clone(),
            kind: RemoteEntryKind::File,
            extension,
        };
        self.folders
            .lock()
            .expect("folders lock")
            .entry(folder.to_string())
            .or_default()
            .push(entry);
        self.files.lock().expect("files lock").insert(path, bytes.to_vec());
    }

    /// Register a subfolder entry under `folder`. Its own content is
    /// added with `add_file(&format!("{folder}/{name}"), ...)`.
    pub fn add_dir(&self, folder: &str, name: &str) {
        let path = format!("{folder}/{name}");
        let entry = RemoteEntry {
            name: name.to_string(),
            basename: path.clone(),
            path,
            kind: RemoteEntryKind::Dir,
            extension: None,
        };
        self.folders
            .lock()
            .expect("folders lock")
            .entry(folder.to_string())
            .or_default()
            .push(entry);
    }

    /// Make every future listing of `folder` fail.
    pub fn break_folder(&self, folder: &str) {
        self.broken.lock().expect("broken lock").push(folder.to_string());
    }
}

#[async_trait]
impl RemoteFolder for MemoryRemoteFolder {
    async fn list(&self, folder_path: &str) -> Result<Vec<RemoteEntry>, CloudError> {
        if self
            .broken
            .lock()
            .expect("broken lock")
            .iter()
            .any(|f| f == folder_path)
        {
            return Err(CloudError::Remote(format!(
                "listing failed for '{folder_path}'"
            )));
        }
        Ok(self
            .folders
            .lock()
            .expect("folders lock")
            .get(folder_path)
            .cloned()
            .unwrap_or_default())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, CloudError> {
        self.files
            .lock()
            .expect("files lock")
            .get(path)
            .cloned()
            .ok_or_else(|| CloudError::Remote(format!("no such remote file '{path}'")))
    }

    async fn folder_name(&self, folder_path: &str) -> Result<String, CloudError> {
        Ok(folder_path
            .rsplit('/')
            .next()
            .unwrap_or(folder_path)
            .to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_listing_and_fetch() {
        let remote = MemoryRemoteFolder::new();
        remote.add_file("drive/bg", "a.png", b"png-bytes");
        remote.add_dir("drive/bg", "square");

        let entries = remote.list("drive/bg").await.expect("list");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, RemoteEntryKind::File);
        assert_eq!(entries[0].extension.as_deref(), Some("png"));
        assert_eq!(entries[1].kind, RemoteEntryKind::Dir);

        let bytes = remote.get("drive/bg/a.png").await.expect("get");
        assert_eq!(bytes, b"png-bytes");
    }

    #[tokio::test]
    async fn broken_folder_fails_listing_only() {
        let remote = MemoryRemoteFolder::new();
        remote.add_file("drive/bg", "a.png", b"x");
        remote.break_folder("drive/bg");

        assert!(remote.list("drive/bg").await.is_err());
        assert!(remote.get("drive/bg/a.png").await.is_ok());
    }

    #[tokio::test]
    async fn folder_name_is_last_segment() {
        let remote = MemoryRemoteFolder::new();
        assert_eq!(
            remote.folder_name("drive/campaign/backgrounds").await.expect("name"),
            "backgrounds"
        );
    }
}
