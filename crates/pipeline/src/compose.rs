//! Per-variant image composition: one task per (pack, image size).
//!
//! Each task prepares the pack's mapped field images into a scratch
//! area, folds them left-to-right through the injected image-merge
//! capability (retaining every step artifact for diagnosability), saves
//! the final composite to the public disk, and records a [`Media`] row.

use std::sync::Arc;

use adforge_cloud::{ImageOps, Storage};
use adforge_core::generation::{Generation, Media, Pack};
use adforge_core::progress::merge_stage_percent;
use adforge_core::status::PackStatus;
use adforge_core::template::{ImageSize, Template};
use adforge_events::GenerationEventKind;
use uuid::Uuid;

use crate::batch::BatchHandle;
use crate::error::PipelineError;
use crate::notify::Notifier;
use crate::store::GenerationStore;

/// Composes one pack's final asset for one image size.
#[derive(Clone)]
pub struct Composer {
    storage: Arc<dyn Storage>,
    public_storage: Arc<dyn Storage>,
    image_ops: Arc<dyn ImageOps>,
    store: Arc<GenerationStore>,
    notifier: Notifier,
}

impl Composer {
    pub fn new(
        storage: Arc<dyn Storage>,
        public_storage: Arc<dyn Storage>,
        image_ops: Arc<dyn ImageOps>,
        store: Arc<GenerationStore>,
        notifier: Notifier,
    ) -> Self {
        Self {
            storage,
            public_storage,
            image_ops,
            store,
            notifier,
        }
    }

    /// Compose `pack` at `image_size`.
    ///
    /// An image-processing failure marks the pack failed and propagates,
    /// so the batch counts it; sibling tasks are unaffected. The scratch
    /// directory is removed on success and failure alike.
    pub async fn compose_pack_size(
        &self,
        generation: &Generation,
        template: &Template,
        pack: &Pack,
        image_size: &ImageSize,
        handle: &BatchHandle,
    ) -> Result<(), PipelineError> {
        let scratch = format!("tmp/{}", Uuid::new_v4());
        let result = self
            .compose_inner(generation, template, pack, image_size, handle, &scratch)
            .await;

        if let Err(e) = &result {
            tracing::error!(
                pack_id = pack.id,
                image_size_id = image_size.id,
                error = %e,
                "Composition failed",
            );
            self.store.advance_pack_status(pack.id, PackStatus::Failed);
        }
        if let Err(e) = self.storage.delete_dir(&scratch).await {
            tracing::warn!(scratch, error = %e, "Scratch cleanup failed");
        }
        result
    }

    async fn compose_inner(
        &self,
        generation: &Generation,
        template: &Template,
        pack: &Pack,
        image_size: &ImageSize,
        handle: &BatchHandle,
        scratch: &str,
    ) -> Result<(), PipelineError> {
        let output_dir = format!("{}/output", generation.folder);
        let steps_dir = format!("{}/generations", generation.folder);
        self.public_storage.make_dir(&output_dir).await?;
        self.storage.make_dir(&steps_dir).await?;

        // Step 1: prepare every mapped field image into the scratch area.
        // Fields without a mapping at this size, or without a resolved
        // path, contribute nothing.
        let mut prepared: Vec<String> = Vec::new();
        for source in &pack.source {
            if template.field_for(image_size.id, source.field_id).is_none() {
                continue;
            }
            let Some(input) = &source.path else {
                continue;
            };
            let file_name = input.rsplit('/').next().unwrap_or(input);
            let out = format!("{scratch}/{}_{file_name}", source.field_id);
            self.image_ops
                .prepare(
                    &self.storage.absolute(input),
                    image_size.width,
                    image_size.height,
                    &self.storage.absolute(&out),
                )
                .await?;
            prepared.push(out);
        }

        // Step 2: left fold. The first image seeds the composite; every
        // step writes a retained artifact under generations/.
        let mut composite: Option<String> = None;
        for (index, layer) in prepared.iter().enumerate() {
            let step_path = format!(
                "{steps_dir}/{}_{}_step_{}.png",
                pack.id,
                image_size.id,
                index + 1
            );
            match &composite {
                None => self.storage.copy(layer, &step_path).await?,
                Some(base) => {
                    self.image_ops
                        .merge(
                            &self.storage.absolute(base),
                            &self.storage.absolute(layer),
                            &self.storage.absolute(&step_path),
                        )
                        .await?
                }
            }
            composite = Some(step_path);
        }

        // No field produced an image for this size: skip, not an error.
        let Some(final_step) = composite else {
            tracing::debug!(
                pack_id = pack.id,
                image_size_id = image_size.id,
                "No usable images for size; skipping",
            );
            return Ok(());
        };

        let media_uuid = Uuid::new_v4();
        let output_name = format!("{media_uuid}.jpg");
        let output_path = format!("{output_dir}/{output_name}");
        self.image_ops
            .export(
                &self.storage.absolute(&final_step),
                &self.public_storage.absolute(&output_path),
            )
            .await?;

        let is_cover = template.cover_image_size_id == image_size.id;
        self.store.add_media(Media {
            uuid: media_uuid,
            pack_id: pack.id,
            path: output_dir,
            name: output_name.clone(),
            image_size_id: image_size.id,
            language: pack.language.clone(),
            width: image_size.width,
            height: image_size.height,
            size_bytes: self.public_storage.size(&output_path).await?,
            is_cover,
        });
        self.store
            .advance_pack_status(pack.id, PackStatus::Processing);

        self.notifier.progress(
            generation.id,
            generation.user_id,
            generation.uuid,
            &format!("Media ready: {output_name}"),
            merge_stage_percent(handle.percent()),
        );
        self.notifier.publish(
            generation.user_id,
            generation.uuid,
            GenerationEventKind::PackUpdated {
                pack_uuid: pack.uuid,
                expected_media: template.items.len(),
                media_url: output_path,
                is_cover,
            },
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
