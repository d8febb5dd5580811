//! Deduplicating source-asset cache.
//!
//! Maps a remote file's stable identifier (`cloud_name`) to a canonical
//! local copy under the `cloud/` namespace. Resolution is serialized per
//! remote identifier: of two tasks racing on the same file, exactly one
//! fetches and records, the other reuses the winner's entry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use adforge_cloud::{CloudError, Storage};
use adforge_core::generation::SourceFile;
use uuid::Uuid;

use crate::error::PipelineError;

/// Directory on the private disk holding canonical copies.
const CLOUD_DIR: &str = "cloud";

type Slot = Arc<tokio::sync::Mutex<Option<SourceFile>>>;

/// Shared dedup cache over downloaded source assets.
pub struct SourceCache {
    storage: Arc<dyn Storage>,
    entries: Mutex<HashMap<String, Slot>>,
}

impl SourceCache {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, cloud_name: &str) -> Slot {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(cloud_name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
            .clone()
    }

    /// Resolve `cloud_name` to its canonical local copy, fetching at most
    /// once. Returns the cache entry and whether this call fetched it.
    ///
    /// The per-id lock is held across the fetch so a concurrent resolver
    /// of the same id waits for the winner instead of downloading again.
    pub async fn resolve_or_fetch<F, Fut>(
        &self,
        cloud_name: &str,
        display_name: &str,
        extension: &str,
        fetch: F,
    ) -> Result<(SourceFile, bool), PipelineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, CloudError>>,
    {
        let slot = self.slot(cloud_name);
        let mut entry = slot.lock().await;

        if let Some(existing) = entry.as_ref() {
            return Ok((existing.clone(), false));
        }

        let bytes = fetch().await?;
        let path = format!("{CLOUD_DIR}/{}.{extension}", Uuid::new_v4());
        self.storage.put(&path, &bytes).await?;

        let record = SourceFile {
            cloud_name: cloud_name.to_string(),
            name: display_name.to_string(),
            path,
        };
        *entry = Some(record.clone());
        Ok((record, true))
    }

    /// The cache entry for `cloud_name`, if one was recorded.
    pub fn lookup(&self, cloud_name: &str) -> Option<SourceFile> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(cloud_name)
            .and_then(|slot| slot.try_lock().ok().and_then(|e| e.clone()))
    }

    /// Number of recorded entries (in-flight resolutions excluded).
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .values()
            .filter(|slot| matches!(slot.try_lock().as_deref(), Ok(Some(_))))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
