//! In-memory record store: the atomic mutation boundary for generations,
//! packs, stage batches, and media.
//!
//! All mutations happen under one synchronous lock and go through the
//! transition-validated setters on the core records, so concurrent tasks
//! can never observe or produce a disallowed state.

use std::collections::HashMap;
use std::sync::Mutex;

use adforge_core::field::{FieldDto, PackSourceDto};
use adforge_core::generation::{Generation, GenerationBatch, Media, Pack};
use adforge_core::status::{BatchStageStatus, GenerationStatus, PackStatus};
use adforge_core::types::DbId;
use adforge_core::CoreError;
use uuid::Uuid;

use crate::error::PipelineError;

fn generation_missing(id: DbId) -> PipelineError {
    CoreError::NotFound {
        entity: "Generation",
        id,
    }
    .into()
}

#[derive(Debug, Default)]
struct StoreInner {
    next_generation_id: DbId,
    next_pack_id: DbId,
    generations: HashMap<DbId, Generation>,
    generation_ids_by_uuid: HashMap<Uuid, DbId>,
    batches: HashMap<DbId, GenerationBatch>,
    packs: HashMap<DbId, Pack>,
    media: Vec<Media>,
}

/// Thread-safe store shared by every pipeline task.
#[derive(Debug, Default)]
pub struct GenerationStore {
    inner: Mutex<StoreInner>,
}

impl GenerationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        // A poisoned lock means a panic while mutating; propagating the
        // panic is the only sound option here.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -- Generations --------------------------------------------------------

    pub fn create_generation(
        &self,
        user_id: DbId,
        template_id: DbId,
        language: &str,
        count: usize,
        source: Vec<FieldDto>,
    ) -> Generation {
        let mut inner = self.lock();
        inner.next_generation_id += 1;
        let id = inner.next_generation_id;
        let generation =
            Generation::new(id, Uuid::new_v4(), user_id, template_id, language, count, source);
        inner.generation_ids_by_uuid.insert(generation.uuid, id);
        inner.generations.insert(id, generation.clone());
        generation
    }

    pub fn generation(&self, uuid: Uuid) -> Option<Generation> {
        let inner = self.lock();
        let id = inner.generation_ids_by_uuid.get(&uuid)?;
        inner.generations.get(id).cloned()
    }

    pub fn set_generation_status(
        &self,
        generation_id: DbId,
        next: GenerationStatus,
    ) -> Result<(), PipelineError> {
        let mut inner = self.lock();
        let generation = inner
            .generations
            .get_mut(&generation_id)
            .ok_or_else(|| generation_missing(generation_id))?;
        generation.set_status(next)?;
        Ok(())
    }

    /// Apply a monotonic progress update; returns the effective percent.
    pub fn update_progress(
        &self,
        generation_id: DbId,
        message: &str,
        percent: f64,
    ) -> Result<f64, PipelineError> {
        let mut inner = self.lock();
        let generation = inner
            .generations
            .get_mut(&generation_id)
            .ok_or_else(|| generation_missing(generation_id))?;
        Ok(generation.progress(message, percent))
    }

    // -- Stage batches ------------------------------------------------------

    fn batch_entry<'a>(inner: &'a mut StoreInner, generation_id: DbId) -> &'a mut GenerationBatch {
        inner
            .batches
            .entry(generation_id)
            .or_insert_with(|| GenerationBatch::new(generation_id))
    }

    pub fn download_dispatched(
        &self,
        generation_id: DbId,
        batch_id: Uuid,
    ) -> Result<(), PipelineError> {
        let mut inner = self.lock();
        Self::batch_entry(&mut inner, generation_id).download_dispatched(batch_id)?;
        Ok(())
    }

    pub fn merge_dispatched(
        &self,
        generation_id: DbId,
        batch_id: Uuid,
    ) -> Result<(), PipelineError> {
        let mut inner = self.lock();
        Self::batch_entry(&mut inner, generation_id).merge_dispatched(batch_id)?;
        Ok(())
    }

    pub fn set_download_status(
        &self,
        generation_id: DbId,
        next: BatchStageStatus,
    ) -> Result<(), PipelineError> {
        let mut inner = self.lock();
        Self::batch_entry(&mut inner, generation_id).set_download_status(next)?;
        Ok(())
    }

    pub fn set_merge_status(
        &self,
        generation_id: DbId,
        next: BatchStageStatus,
    ) -> Result<(), PipelineError> {
        let mut inner = self.lock();
        Self::batch_entry(&mut inner, generation_id).set_merge_status(next)?;
        Ok(())
    }

    pub fn generation_batch(&self, generation_id: DbId) -> Option<GenerationBatch> {
        self.lock().batches.get(&generation_id).cloned()
    }

    // -- Packs --------------------------------------------------------------

    pub fn create_pack(
        &self,
        generation_id: DbId,
        language: &str,
        source: Vec<PackSourceDto>,
    ) -> Pack {
        let mut inner = self.lock();
        inner.next_pack_id += 1;
        let pack = Pack::new(inner.next_pack_id, generation_id, language, source);
        inner.packs.insert(pack.id, pack.clone());
        pack
    }

    pub fn pack(&self, pack_id: DbId) -> Option<Pack> {
        self.lock().packs.get(&pack_id).cloned()
    }

    pub fn packs_for(&self, generation_id: DbId) -> Vec<Pack> {
        let inner = self.lock();
        let mut packs: Vec<Pack> = inner
            .packs
            .values()
            .filter(|p| p.generation_id == generation_id)
            .cloned()
            .collect();
        packs.sort_by_key(|p| p.id);
        packs
    }

    /// Advance a pack's status, ignoring updates the state machine does
    /// not allow. Sibling size tasks settle in arbitrary order, so a
    /// late `Processing` after a terminal state is expected and must not
    /// error. Returns whether the status changed.
    pub fn advance_pack_status(&self, pack_id: DbId, next: PackStatus) -> bool {
        let mut inner = self.lock();
        match inner.packs.get_mut(&pack_id) {
            Some(pack) if pack.status.can_transition(next) => {
                let changed = pack.status != next;
                pack.status = next;
                changed
            }
            _ => false,
        }
    }

    // -- Media --------------------------------------------------------------

    pub fn add_media(&self, media: Media) {
        self.lock().media.push(media);
    }

    pub fn media_for_pack(&self, pack_id: DbId) -> Vec<Media> {
        self.lock()
            .media
            .iter()
            .filter(|m| m.pack_id == pack_id)
            .cloned()
            .collect()
    }

    pub fn media_for_generation(&self, generation_id: DbId) -> Vec<Media> {
        let inner = self.lock();
        let pack_ids: Vec<DbId> = inner
            .packs
            .values()
            .filter(|p| p.generation_id == generation_id)
            .map(|p| p.id)
            .collect();
        inner
            .media
            .iter()
            .filter(|m| pack_ids.contains(&m.pack_id))
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
