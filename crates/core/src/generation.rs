//! Generation, pack, stage-batch, and media records, with all status
//! mutations validated against the allowed transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::field::{FieldDto, PackSourceDto};
use crate::status::{transition_error, BatchStageStatus, GenerationStatus, PackStatus};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// One end-to-end request to produce a batch of creative variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub id: DbId,
    pub uuid: Uuid,
    pub user_id: DbId,
    pub template_id: DbId,
    pub language: String,
    /// Requested number of output variants.
    pub count: usize,
    /// Prepared field set, fixed at creation.
    pub source: Vec<FieldDto>,
    pub status: GenerationStatus,
    /// Working directory, relative to the private storage root.
    pub folder: String,
    pub progress_percent: f64,
    pub progress_message: String,
    pub created_at: DateTime<Utc>,
}

impl Generation {
    pub fn new(
        id: DbId,
        uuid: Uuid,
        user_id: DbId,
        template_id: DbId,
        language: impl Into<String>,
        count: usize,
        source: Vec<FieldDto>,
    ) -> Self {
        Self {
            id,
            uuid,
            user_id,
            template_id,
            language: language.into(),
            count,
            source,
            status: GenerationStatus::Init,
            folder: format!("generation/{uuid}"),
            progress_percent: 0.0,
            progress_message: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Move the generation to `next`, rejecting disallowed transitions.
    pub fn set_status(&mut self, next: GenerationStatus) -> Result<(), CoreError> {
        if !self.status.can_transition(next) {
            return Err(transition_error(
                "Generation",
                self.status.label(),
                next.label(),
            ));
        }
        self.status = next;
        Ok(())
    }

    /// Record a progress update. The percentage is monotonic: a stale or
    /// lower value updates the message but never lowers the displayed
    /// percent. Returns the effective percentage.
    pub fn progress(&mut self, message: impl Into<String>, percent: f64) -> f64 {
        self.progress_message = message.into();
        if percent > self.progress_percent {
            self.progress_percent = percent.min(100.0);
        }
        self.progress_percent
    }

    /// Local staging directory for one field's downloaded sources.
    pub fn field_source_dir(&self, field_id: DbId) -> String {
        format!("{}/source/{field_id}", self.folder)
    }
}

// ---------------------------------------------------------------------------
// Pack
// ---------------------------------------------------------------------------

/// One concrete enumerated variant of a generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pack {
    pub id: DbId,
    pub uuid: Uuid,
    pub generation_id: DbId,
    /// Parent pack for derived packs; always `None` for enumerated ones.
    pub parent_id: Option<DbId>,
    pub language: String,
    pub status: PackStatus,
    /// Resolved per-field inputs chosen for this variant.
    pub source: Vec<PackSourceDto>,
}

impl Pack {
    pub fn new(
        id: DbId,
        generation_id: DbId,
        language: impl Into<String>,
        source: Vec<PackSourceDto>,
    ) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            generation_id,
            parent_id: None,
            language: language.into(),
            status: PackStatus::Init,
            source,
        }
    }

    pub fn set_status(&mut self, next: PackStatus) -> Result<(), CoreError> {
        if !self.status.can_transition(next) {
            return Err(transition_error("Pack", self.status.label(), next.label()));
        }
        self.status = next;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GenerationBatch
// ---------------------------------------------------------------------------

/// Per-generation bookkeeping for the two stage batches, kept for later
/// inspection and retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationBatch {
    pub generation_id: DbId,
    pub download_batch_id: Option<Uuid>,
    pub download_status: BatchStageStatus,
    pub merge_batch_id: Option<Uuid>,
    pub merge_status: BatchStageStatus,
}

impl GenerationBatch {
    pub fn new(generation_id: DbId) -> Self {
        Self {
            generation_id,
            download_batch_id: None,
            download_status: BatchStageStatus::Pending,
            merge_batch_id: None,
            merge_status: BatchStageStatus::Pending,
        }
    }

    pub fn download_dispatched(&mut self, batch_id: Uuid) -> Result<(), CoreError> {
        self.set_download_status(BatchStageStatus::Process)?;
        self.download_batch_id = Some(batch_id);
        Ok(())
    }

    pub fn merge_dispatched(&mut self, batch_id: Uuid) -> Result<(), CoreError> {
        self.set_merge_status(BatchStageStatus::Process)?;
        self.merge_batch_id = Some(batch_id);
        Ok(())
    }

    pub fn set_download_status(&mut self, next: BatchStageStatus) -> Result<(), CoreError> {
        if !self.download_status.can_transition(next) {
            return Err(transition_error(
                "GenerationBatch.download",
                self.download_status.label(),
                next.label(),
            ));
        }
        self.download_status = next;
        Ok(())
    }

    pub fn set_merge_status(&mut self, next: BatchStageStatus) -> Result<(), CoreError> {
        if !self.merge_status.can_transition(next) {
            return Err(transition_error(
                "GenerationBatch.merge",
                self.merge_status.label(),
                next.label(),
            ));
        }
        self.merge_status = next;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

/// The final rendered asset for one pack at one image size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub uuid: Uuid,
    pub pack_id: DbId,
    /// Directory the asset lives in, on the public disk.
    pub path: String,
    pub name: String,
    pub image_size_id: DbId,
    pub language: String,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    /// Whether this size is the template's designated cover size.
    pub is_cover: bool,
}

// ---------------------------------------------------------------------------
// SourceFile
// ---------------------------------------------------------------------------

/// Dedup cache entry mapping a remote file's stable identifier to its
/// local canonical copy. Created on first download, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Stable remote identifier (the entry's basename).
    pub cloud_name: String,
    /// Original display file name.
    pub name: String,
    /// Canonical local path under the `cloud/` namespace.
    pub path: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn generation() -> Generation {
        Generation::new(1, Uuid::new_v4(), 7, 3, "en", 10, vec![])
    }

    #[test]
    fn progress_is_monotonic() {
        let mut g = generation();
        assert!((g.progress("init", 5.0) - 5.0).abs() < f64::EPSILON);
        assert!((g.progress("download", 47.5) - 47.5).abs() < f64::EPSILON);
        // A stale earlier-stage update arriving late keeps the percent.
        assert!((g.progress("late download tick", 30.0) - 47.5).abs() < f64::EPSILON);
        assert_eq!(g.progress_message, "late download tick");
    }

    #[test]
    fn progress_caps_at_100() {
        let mut g = generation();
        assert!((g.progress("done", 120.0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn generation_status_transitions_enforced() {
        let mut g = generation();
        assert!(g.set_status(GenerationStatus::Merging).is_err());
        g.set_status(GenerationStatus::Downloading).expect("init -> downloading");
        g.set_status(GenerationStatus::Combining).expect("downloading -> combining");
        g.set_status(GenerationStatus::Merging).expect("combining -> merging");
        g.set_status(GenerationStatus::Done).expect("merging -> done");
        assert!(g.set_status(GenerationStatus::Failed).is_err());
    }

    #[test]
    fn field_source_dir_is_per_field() {
        let g = generation();
        assert_eq!(g.field_source_dir(42), format!("{}/source/42", g.folder));
    }

    #[test]
    fn pack_status_transitions_enforced() {
        let mut pack = Pack::new(1, 1, "en", vec![]);
        pack.set_status(PackStatus::Processing).expect("init -> processing");
        pack.set_status(PackStatus::Processing).expect("idempotent processing");
        pack.set_status(PackStatus::Done).expect("processing -> done");
        assert!(pack.set_status(PackStatus::Processing).is_err());
    }

    #[test]
    fn batch_stage_bookkeeping() {
        let mut batch = GenerationBatch::new(1);
        let id = Uuid::new_v4();
        batch.download_dispatched(id).expect("dispatch download");
        assert_eq!(batch.download_batch_id, Some(id));
        assert_eq!(batch.download_status, BatchStageStatus::Process);
        batch
            .set_download_status(BatchStageStatus::Done)
            .expect("download settles");
        // Merge stage is independent of the download stage.
        assert_eq!(batch.merge_status, BatchStageStatus::Pending);
        assert!(batch.set_merge_status(BatchStageStatus::Done).is_err());
    }
}
