//! Batches of independently schedulable tasks with allow-failures
//! semantics and counter-based completion tracking.
//!
//! A [`BatchHandle`] is registered before any task runs, so tasks can
//! read the batch's live percentage for their own progress reporting.
//! The [`BatchRegistry`] keeps every handle addressable by id for later
//! inspection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use adforge_core::progress::BatchProgress;
use futures::future::BoxFuture;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// BatchHandle
// ---------------------------------------------------------------------------

/// Shared view of one batch: identity plus live completion counters.
#[derive(Clone)]
pub struct BatchHandle {
    pub id: Uuid,
    pub name: String,
    progress: Arc<BatchProgress>,
}

impl BatchHandle {
    fn new(name: &str, total: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            progress: Arc::new(BatchProgress::new(total)),
        }
    }

    pub fn percent(&self) -> f64 {
        self.progress.percent()
    }

    pub fn is_settled(&self) -> bool {
        self.progress.is_settled()
    }

    pub fn total(&self) -> usize {
        self.progress.total()
    }

    pub fn succeeded(&self) -> usize {
        self.progress.succeeded()
    }

    pub fn failed(&self) -> usize {
        self.progress.failed()
    }

    fn record_success(&self) {
        self.progress.record_success();
    }

    fn record_failure(&self) {
        self.progress.record_failure();
    }
}

// ---------------------------------------------------------------------------
// BatchRegistry
// ---------------------------------------------------------------------------

/// Registry of every dispatched batch, addressable by id.
#[derive(Default)]
pub struct BatchRegistry {
    batches: Mutex<HashMap<Uuid, BatchHandle>>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and record a handle for a batch of `total` tasks.
    pub fn register(&self, name: &str, total: usize) -> BatchHandle {
        let handle = BatchHandle::new(name, total);
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handle.id, handle.clone());
        handle
    }

    pub fn get(&self, id: Uuid) -> Option<BatchHandle> {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// Batch execution
// ---------------------------------------------------------------------------

/// Outcome of a fully settled batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

/// Run every task of a batch to settlement under an allow-failures
/// policy.
///
/// Tasks run concurrently (bounded by `concurrency`) with no ordering
/// guarantee. A failed or panicked task is logged and counted; siblings
/// are unaffected. Returns only once all tasks have settled, which is
/// the point where the batch's stage may move to `Done`.
pub async fn run_batch(
    handle: &BatchHandle,
    tasks: Vec<BoxFuture<'static, Result<(), PipelineError>>>,
    concurrency: usize,
) -> BatchOutcome {
    debug_assert_eq!(handle.total(), tasks.len());

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();
    for task in tasks {
        let semaphore = semaphore.clone();
        set.spawn(async move {
            // The semaphore is never closed, so acquisition only fails
            // if the runtime is tearing down.
            let _permit = semaphore.acquire_owned().await.ok();
            task.await
        });
    }

    while let Some(settled) = set.join_next().await {
        match settled {
            Ok(Ok(())) => handle.record_success(),
            Ok(Err(e)) => {
                tracing::error!(batch = %handle.name, error = %e, "Batch task failed");
                handle.record_failure();
            }
            Err(join_error) => {
                tracing::error!(batch = %handle.name, error = %join_error, "Batch task panicked");
                handle.record_failure();
            }
        }
    }

    BatchOutcome {
        succeeded: handle.succeeded(),
        failed: handle.failed(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
