//! End-to-end generation flow: download, combine, merge.
//!
//! [`Pipeline`] owns every capability the stages need and drives one
//! generation from dispatch to a terminal status. `start_generation`
//! returns as soon as the record exists; the staged work runs on a
//! spawned task and reports through the event bus.

use std::collections::HashMap;
use std::sync::Arc;

use adforge_cloud::{ImageOps, RemoteFolder, Storage};
use adforge_core::enumerate::{dedup_fields, enumerate_variants, EnumerationOutcome};
use adforge_core::field::FieldDto;
use adforge_core::generation::Generation;
use adforge_core::progress::{
    PROGRESS_COMBINE, PROGRESS_DONE, PROGRESS_DOWNLOAD_START, PROGRESS_INIT, PROGRESS_MERGE_START,
};
use adforge_core::status::{BatchStageStatus, GenerationStatus};
use adforge_core::template::{prepare_fields, validate_template, Template};
use adforge_core::types::DbId;
use adforge_core::CoreError;
use adforge_events::{EventBus, GenerationEventKind};
use futures::FutureExt;
use uuid::Uuid;

use crate::batch::{run_batch, BatchRegistry};
use crate::compose::Composer;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fetcher::FolderFetcher;
use crate::notify::Notifier;
use crate::source_cache::SourceCache;
use crate::store::GenerationStore;

/// Orchestrates asset generations over the injected storage, remote and
/// image capabilities. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<GenerationStore>,
    registry: Arc<BatchRegistry>,
    storage: Arc<dyn Storage>,
    bus: Arc<EventBus>,
    notifier: Notifier,
    fetcher: FolderFetcher,
    composer: Composer,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        storage: Arc<dyn Storage>,
        public_storage: Arc<dyn Storage>,
        remote: Arc<dyn RemoteFolder>,
        image_ops: Arc<dyn ImageOps>,
    ) -> Self {
        let store = Arc::new(GenerationStore::new());
        let bus = Arc::new(EventBus::new(config.event_capacity));
        let notifier = Notifier::new(store.clone(), bus.clone());
        let cache = Arc::new(SourceCache::new(storage.clone()));
        let fetcher = FolderFetcher::new(
            config.clone(),
            storage.clone(),
            public_storage.clone(),
            remote,
            cache,
            notifier.clone(),
        );
        let composer = Composer::new(
            storage.clone(),
            public_storage,
            image_ops,
            store.clone(),
            notifier.clone(),
        );
        Self {
            config,
            store,
            registry: Arc::new(BatchRegistry::new()),
            storage,
            bus,
            notifier,
            fetcher,
            composer,
        }
    }

    pub fn store(&self) -> &Arc<GenerationStore> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn registry(&self) -> &Arc<BatchRegistry> {
        &self.registry
    }

    // -- Dispatch -----------------------------------------------------------

    /// Validate the request and create the generation record.
    ///
    /// The caller gets the record back immediately; nothing is
    /// downloaded or composed yet.
    pub fn begin_generation(
        &self,
        template: &Template,
        user_fields: &[FieldDto],
        user_id: DbId,
        language: &str,
        count: usize,
    ) -> Result<Generation, PipelineError> {
        validate_template(template)?;
        if count == 0 {
            return Err(CoreError::Validation(
                "Requested variant count must be at least 1".to_string(),
            )
            .into());
        }

        let fields = prepare_fields(template, user_fields);
        let generation = self
            .store
            .create_generation(user_id, template.id, language, count, fields);
        self.notifier.progress(
            generation.id,
            generation.user_id,
            generation.uuid,
            "Generation queued",
            PROGRESS_INIT,
        );
        Ok(generation)
    }

    /// Dispatch a generation and run it to completion in the background.
    /// Returns the generation uuid for progress subscription.
    pub fn start_generation(
        &self,
        template: &Template,
        user_fields: &[FieldDto],
        user_id: DbId,
        language: &str,
        count: usize,
    ) -> Result<Uuid, PipelineError> {
        let generation = self.begin_generation(template, user_fields, user_id, language, count)?;
        let uuid = generation.uuid;
        let pipeline = self.clone();
        let template = template.clone();
        tokio::spawn(async move {
            pipeline.run(template, uuid).await;
        });
        Ok(uuid)
    }

    /// Execute all stages, marking the generation failed on any error
    /// that escapes the stage-level failure policies.
    pub async fn run(&self, template: Template, uuid: Uuid) {
        if let Err(e) = self.execute(&template, uuid).await {
            tracing::error!(generation_uuid = %uuid, error = %e, "Generation failed");
            if let Some(generation) = self.store.generation(uuid) {
                if let Err(e) = self
                    .store
                    .set_generation_status(generation.id, GenerationStatus::Failed)
                {
                    tracing::warn!(generation_uuid = %uuid, error = %e, "Could not mark failed");
                }
                self.notifier.progress(
                    generation.id,
                    generation.user_id,
                    generation.uuid,
                    "Generation failed",
                    0.0,
                );
            }
        }
    }

    // -- Stages -------------------------------------------------------------

    async fn execute(&self, template: &Template, uuid: Uuid) -> Result<(), PipelineError> {
        let generation = self
            .store
            .generation(uuid)
            .ok_or(PipelineError::GenerationNotFound(uuid))?;
        let fields = dedup_fields(&generation.source);

        self.download_sources(template, &generation, &fields).await?;
        let outcome = self.combine(&generation, &fields).await?;

        let combinations = match outcome {
            EnumerationOutcome::Empty => {
                self.notifier.progress(
                    generation.id,
                    generation.user_id,
                    generation.uuid,
                    "No combinations could be produced",
                    PROGRESS_DONE,
                );
                self.store
                    .set_generation_status(generation.id, GenerationStatus::Done)?;
                return Ok(());
            }
            EnumerationOutcome::Combinations(combinations) => combinations,
        };

        self.merge(template, &generation, combinations).await
    }

    /// Download stage: one batch task per deduped folder-backed field,
    /// plus staging of pre-translated images.
    async fn download_sources(
        &self,
        template: &Template,
        generation: &Generation,
        fields: &[FieldDto],
    ) -> Result<(), PipelineError> {
        self.store
            .set_generation_status(generation.id, GenerationStatus::Downloading)?;
        self.notifier.progress(
            generation.id,
            generation.user_id,
            generation.uuid,
            "Downloading sources",
            PROGRESS_DOWNLOAD_START,
        );

        // Translated staging failures degrade like any other fetch
        // trouble: the field falls back to whatever else it resolves to.
        for field in fields.iter().filter(|f| f.t_image.is_some()) {
            if let Err(e) = self.fetcher.copy_translated_images(generation, field).await {
                tracing::error!(
                    generation_id = generation.id,
                    field_id = field.field_id,
                    error = %e,
                    "Translated image staging failed; continuing",
                );
            }
        }

        let folder_fields: Vec<&FieldDto> =
            fields.iter().filter(|f| f.is_folder_backed()).collect();
        if folder_fields.is_empty() {
            return Ok(());
        }

        let handle = self
            .registry
            .register("download-source-from-cloud", folder_fields.len());
        self.store.download_dispatched(generation.id, handle.id)?;
        self.notifier.publish(
            generation.user_id,
            generation.uuid,
            GenerationEventKind::SourceDownloadingStarted { batch_id: handle.id },
        );

        let tasks = folder_fields
            .into_iter()
            .map(|field| {
                let fetcher = self.fetcher.clone();
                let generation = generation.clone();
                let field = field.clone();
                let size_path_name = size_path_name_for(template, &field);
                let handle = handle.clone();
                async move {
                    fetcher
                        .fetch_field(&generation, &field, &size_path_name, &handle)
                        .await
                }
                .boxed()
            })
            .collect();

        run_batch(&handle, tasks, self.config.download_concurrency).await;
        self.store
            .set_download_status(generation.id, BatchStageStatus::Done)?;
        Ok(())
    }

    /// Combine stage: enumerate variants over the staged files and create
    /// the packs.
    async fn combine(
        &self,
        generation: &Generation,
        fields: &[FieldDto],
    ) -> Result<EnumerationOutcome, PipelineError> {
        self.store
            .set_generation_status(generation.id, GenerationStatus::Combining)?;
        self.notifier.progress(
            generation.id,
            generation.user_id,
            generation.uuid,
            "Combining sources",
            PROGRESS_COMBINE,
        );

        let mut files_by_field: HashMap<DbId, Vec<String>> = HashMap::new();
        for field in fields.iter().filter(|f| f.is_folder_backed()) {
            let files = self
                .storage
                .list_files(&generation.field_source_dir(field.field_id))
                .await?;
            files_by_field.insert(field.field_id, files);
        }

        // The rng must not live across an await.
        let outcome = {
            let mut rng = rand::rng();
            enumerate_variants(
                fields,
                &files_by_field,
                generation.count,
                &generation.folder,
                &mut rng,
            )
        };
        Ok(outcome)
    }

    /// Merge stage: create packs, then compose one media per (pack,
    /// image size) under the allow-failures batch policy.
    async fn merge(
        &self,
        template: &Template,
        generation: &Generation,
        combinations: Vec<Vec<adforge_core::field::PackSourceDto>>,
    ) -> Result<(), PipelineError> {
        let packs: Vec<_> = combinations
            .into_iter()
            .map(|source| {
                self.store
                    .create_pack(generation.id, &generation.language, source)
            })
            .collect();
        self.notifier.publish(
            generation.user_id,
            generation.uuid,
            GenerationEventKind::PacksInitialised {
                pack_uuids: packs.iter().map(|p| p.uuid).collect(),
            },
        );

        self.store
            .set_generation_status(generation.id, GenerationStatus::Merging)?;
        self.notifier.progress(
            generation.id,
            generation.user_id,
            generation.uuid,
            "Merging images",
            PROGRESS_MERGE_START,
        );

        let handle = self
            .registry
            .register("merge-images", packs.len() * template.items.len());
        self.store.merge_dispatched(generation.id, handle.id)?;
        self.notifier.publish(
            generation.user_id,
            generation.uuid,
            GenerationEventKind::MergingStarted { batch_id: handle.id },
        );

        let mut tasks = Vec::with_capacity(handle.total());
        for pack in &packs {
            for item in &template.items {
                let composer = self.composer.clone();
                let generation = generation.clone();
                let template = template.clone();
                let pack = pack.clone();
                let image_size = item.image_size.clone();
                let handle = handle.clone();
                tasks.push(
                    async move {
                        composer
                            .compose_pack_size(&generation, &template, &pack, &image_size, &handle)
                            .await
                    }
                    .boxed(),
                );
            }
        }

        let outcome = run_batch(&handle, tasks, self.config.merge_concurrency).await;
        self.store
            .set_merge_status(generation.id, BatchStageStatus::Done)?;

        // Packs that produced at least one media and never failed are
        // complete; failed packs stay failed.
        for pack in &packs {
            self.store
                .advance_pack_status(pack.id, adforge_core::status::PackStatus::Done);
        }

        self.store
            .set_generation_status(generation.id, GenerationStatus::Done)?;
        let message = if outcome.failed == 0 {
            "Generation complete".to_string()
        } else {
            format!("Generation complete; {} image(s) failed", outcome.failed)
        };
        self.notifier.progress(
            generation.id,
            generation.user_id,
            generation.uuid,
            &message,
            PROGRESS_DONE,
        );
        Ok(())
    }
}

/// Path name of the image size whose template item carries this field,
/// used to match size-specific remote subfolders.
fn size_path_name_for(template: &Template, field: &FieldDto) -> String {
    template
        .items
        .iter()
        .find(|item| {
            item.fields
                .iter()
                .any(|f| f.id == field.template_field_id)
        })
        .map(|item| item.image_size.path_name.clone())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
