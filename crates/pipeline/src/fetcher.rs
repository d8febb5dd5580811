//! Cloud folder fetching: stages a field's remote folder into the
//! generation's working directory, deduplicating through the
//! [`SourceCache`] and recursing exactly one level into the subfolder
//! named after the target image size.

use std::sync::Arc;

use adforge_cloud::remote::RemoteEntryKind;
use adforge_cloud::{RemoteEntry, RemoteFolder, Storage};
use adforge_core::field::FieldDto;
use adforge_core::generation::Generation;
use adforge_core::progress::{download_stage_percent, PROGRESS_TRANSLATED};
use adforge_events::GenerationEventKind;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::batch::BatchHandle;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::notify::Notifier;
use crate::source_cache::SourceCache;

/// Public-disk directory holding pre-translated image assets, keyed by
/// translated-image id.
const TRANSLATED_DIR: &str = "translated";

/// Downloads one field's remote folder into local staging.
#[derive(Clone)]
pub struct FolderFetcher {
    config: PipelineConfig,
    storage: Arc<dyn Storage>,
    public_storage: Arc<dyn Storage>,
    remote: Arc<dyn RemoteFolder>,
    cache: Arc<SourceCache>,
    notifier: Notifier,
}

impl FolderFetcher {
    pub fn new(
        config: PipelineConfig,
        storage: Arc<dyn Storage>,
        public_storage: Arc<dyn Storage>,
        remote: Arc<dyn RemoteFolder>,
        cache: Arc<SourceCache>,
        notifier: Notifier,
    ) -> Self {
        Self {
            config,
            storage,
            public_storage,
            remote,
            cache,
            notifier,
        }
    }

    /// Stage every accepted image of the field's remote folder under
    /// `<generation folder>/source/<field_id>`.
    ///
    /// Remote failures are logged and degrade the field to zero files;
    /// they never fail the download batch task.
    pub async fn fetch_field(
        &self,
        generation: &Generation,
        field: &FieldDto,
        size_path_name: &str,
        handle: &BatchHandle,
    ) -> Result<(), PipelineError> {
        let Some(folder) = &field.folder else {
            return Ok(());
        };
        let destination = generation.field_source_dir(field.field_id);

        let result = async {
            let display_name = if folder.name.is_empty() {
                self.remote.folder_name(&folder.path).await?
            } else {
                folder.name.clone()
            };
            self.download_folder(
                generation,
                &display_name,
                folder.path.clone(),
                destination,
                size_path_name,
                true,
                handle,
            )
            .await
        }
        .await;

        if let Err(e) = result {
            tracing::error!(
                generation_id = generation.id,
                field_id = field.field_id,
                error = %e,
                "Source folder download failed; field contributes zero files",
            );
        }
        Ok(())
    }

    /// One folder level. `allow_subfolder` permits exactly one further
    /// recursion, into the subfolder matching the image size's path name.
    fn download_folder<'a>(
        &'a self,
        generation: &'a Generation,
        display_name: &'a str,
        folder_path: String,
        destination: String,
        size_path_name: &'a str,
        allow_subfolder: bool,
        handle: &'a BatchHandle,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        async move {
            // Idempotent re-run guard: an existing destination is taken
            // as already staged and direct files are skipped.
            let had_destination = self.storage.exists(&destination).await;
            if had_destination {
                tracing::debug!(destination, "Destination exists; skipping direct files");
            } else {
                self.storage.make_dir(&destination).await?;
            }

            let entries = self.remote.list(&folder_path).await?;
            for entry in entries {
                match entry.kind {
                    RemoteEntryKind::File
                        if !had_destination
                            && self.config.accepts_extension(entry.extension.as_deref()) =>
                    {
                        self.download_file(&destination, &entry).await?;
                        self.notifier.progress(
                            generation.id,
                            generation.user_id,
                            generation.uuid,
                            &format!("Downloading {display_name}/{}", entry.name),
                            download_stage_percent(handle.percent()),
                        );
                    }
                    RemoteEntryKind::Dir
                        if allow_subfolder
                            && entry.name == size_path_name
                            && !self
                                .storage
                                .exists(&format!("{destination}/{}", entry.name))
                                .await =>
                    {
                        self.download_folder(
                            generation,
                            display_name,
                            entry.path.clone(),
                            format!("{destination}/{}", entry.name),
                            size_path_name,
                            false,
                            handle,
                        )
                        .await?;
                    }
                    _ => {}
                }
            }
            Ok(())
        }
        .boxed()
    }

    /// Fetch one remote file through the dedup cache, then place it at
    /// `destination/<name>`.
    async fn download_file(
        &self,
        destination: &str,
        entry: &RemoteEntry,
    ) -> Result<(), PipelineError> {
        let extension = entry.extension.as_deref().unwrap_or("bin");
        let remote = self.remote.clone();
        let remote_path = entry.path.clone();

        let (record, is_new) = self
            .cache
            .resolve_or_fetch(&entry.basename, &entry.name, extension, move || async move {
                remote.get(&remote_path).await
            })
            .await?;
        if !is_new {
            tracing::debug!(cloud_name = %entry.basename, "Source file served from cache");
        }

        self.storage
            .copy(&record.path, &format!("{destination}/{}", record.name))
            .await?;
        Ok(())
    }

    /// Copy a field's pre-translated image from the public disk into the
    /// field's staging directory.
    pub async fn copy_translated_images(
        &self,
        generation: &Generation,
        field: &FieldDto,
    ) -> Result<(), PipelineError> {
        let Some(t_image) = &field.t_image else {
            return Ok(());
        };

        let src = format!("{TRANSLATED_DIR}/{}/{}", t_image.id, t_image.file_name);
        if self.public_storage.exists(&src).await {
            let bytes = self.public_storage.get(&src).await?;
            let dst = format!(
                "{}/{}",
                generation.field_source_dir(field.field_id),
                t_image.file_name
            );
            self.storage.put(&dst, &bytes).await?;
        } else {
            tracing::warn!(
                translated_image_id = t_image.id,
                path = %src,
                "Translated image missing on public disk",
            );
        }

        self.notifier.progress(
            generation.id,
            generation.user_id,
            generation.uuid,
            "Translated images copied",
            PROGRESS_TRANSLATED,
        );
        self.notifier.publish(
            generation.user_id,
            generation.uuid,
            GenerationEventKind::TranslatedImagesCopied,
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchRegistry;
    use crate::store::GenerationStore;
    use adforge_cloud::remote::MemoryRemoteFolder;
    use adforge_cloud::storage::LocalDiskStorage;
    use adforge_core::field::{FolderRef, TranslatedImageRef};
    use adforge_events::EventBus;

    struct Fixture {
        _private_dir: tempfile::TempDir,
        _public_dir: tempfile::TempDir,
        storage: Arc<dyn Storage>,
        public_storage: Arc<dyn Storage>,
        remote: Arc<MemoryRemoteFolder>,
        store: Arc<GenerationStore>,
        fetcher: FolderFetcher,
        registry: BatchRegistry,
    }

    fn fixture() -> Fixture {
        let private_dir = tempfile::tempdir().expect("private tempdir");
        let public_dir = tempfile::tempdir().expect("public tempdir");
        let storage: Arc<dyn Storage> = Arc::new(LocalDiskStorage::new(private_dir.path()));
        let public_storage: Arc<dyn Storage> = Arc::new(LocalDiskStorage::new(public_dir.path()));
        let remote = Arc::new(MemoryRemoteFolder::new());
        let store = Arc::new(GenerationStore::new());
        let cache = Arc::new(SourceCache::new(storage.clone()));
        let notifier = Notifier::new(store.clone(), Arc::new(EventBus::default()));
        let fetcher = FolderFetcher::new(
            PipelineConfig::default(),
            storage.clone(),
            public_storage.clone(),
            remote.clone(),
            cache,
            notifier,
        );
        Fixture {
            _private_dir: private_dir,
            _public_dir: public_dir,
            storage,
            public_storage,
            remote,
            store,
            fetcher,
            registry: BatchRegistry::new(),
        }
    }

    fn folder_field(field_id: i64, path: &str) -> FieldDto {
        FieldDto {
            template_field_id: field_id,
            field_id,
            value: None,
            folder: Some(FolderRef {
                path: path.into(),
                name: String::new(),
            }),
            t_image: None,
        }
    }

    #[tokio::test]
    async fn downloads_accepted_images_only() {
        let fx = fixture();
        fx.remote.add_file("drive/bg", "a.png", b"a");
        fx.remote.add_file("drive/bg", "b.jpg", b"b");
        fx.remote.add_file("drive/bg", "notes.txt", b"n");

        let generation = fx.store.create_generation(1, 1, "en", 5, vec![]);
        let field = folder_field(10, "drive/bg");
        let handle = fx.registry.register("download-source-from-cloud", 1);

        fx.fetcher
            .fetch_field(&generation, &field, "square", &handle)
            .await
            .expect("fetch");

        let dest = generation.field_source_dir(10);
        let files = fx.storage.list_files(&dest).await.expect("list");
        assert_eq!(files, vec![format!("{dest}/a.png"), format!("{dest}/b.jpg")]);
    }

    #[tokio::test]
    async fn rerun_skips_direct_files_but_recurses_into_new_subfolder() {
        let fx = fixture();
        fx.remote.add_file("drive/bg", "a.png", b"a");
        fx.remote.add_dir("drive/bg", "square");
        fx.remote.add_file("drive/bg/square", "sq.png", b"sq");

        let generation = fx.store.create_generation(1, 1, "en", 5, vec![]);
        let field = folder_field(10, "drive/bg");
        let dest = generation.field_source_dir(10);

        // Destination pre-exists: the idempotency guard must skip direct
        // files while the matching subfolder is still fetched.
        fx.storage.make_dir(&dest).await.expect("premake dest");

        let handle = fx.registry.register("download-source-from-cloud", 1);
        fx.fetcher
            .fetch_field(&generation, &field, "square", &handle)
            .await
            .expect("fetch");

        assert!(fx.storage.list_files(&dest).await.expect("list").is_empty());
        let sub = format!("{dest}/square");
        assert_eq!(
            fx.storage.list_files(&sub).await.expect("list sub"),
            vec![format!("{sub}/sq.png")]
        );
    }

    #[tokio::test]
    async fn non_matching_subfolder_is_ignored() {
        let fx = fixture();
        fx.remote.add_dir("drive/bg", "landscape");
        fx.remote.add_file("drive/bg/landscape", "x.png", b"x");

        let generation = fx.store.create_generation(1, 1, "en", 5, vec![]);
        let field = folder_field(10, "drive/bg");
        let handle = fx.registry.register("download-source-from-cloud", 1);

        fx.fetcher
            .fetch_field(&generation, &field, "square", &handle)
            .await
            .expect("fetch");

        let dest = generation.field_source_dir(10);
        assert!(!fx.storage.exists(&format!("{dest}/landscape")).await);
    }

    #[tokio::test]
    async fn listing_failure_degrades_to_zero_files() {
        let fx = fixture();
        fx.remote.break_folder("drive/broken");

        let generation = fx.store.create_generation(1, 1, "en", 5, vec![]);
        let field = folder_field(10, "drive/broken");
        let handle = fx.registry.register("download-source-from-cloud", 1);

        // The task reports success; the field simply contributes nothing.
        fx.fetcher
            .fetch_field(&generation, &field, "square", &handle)
            .await
            .expect("degraded fetch still succeeds");
        let dest = generation.field_source_dir(10);
        assert!(fx.storage.list_files(&dest).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn shared_remote_file_is_fetched_once_for_two_fields() {
        let fx = fixture();
        fx.remote.add_file("drive/one", "shared.png", b"s");
        fx.remote.add_file("drive/two", "shared.png", b"s");

        let generation = fx.store.create_generation(1, 1, "en", 5, vec![]);
        let handle = fx.registry.register("download-source-from-cloud", 2);

        fx.fetcher
            .fetch_field(&generation, &folder_field(10, "drive/one"), "sq", &handle)
            .await
            .expect("first field");
        fx.fetcher
            .fetch_field(&generation, &folder_field(20, "drive/two"), "sq", &handle)
            .await
            .expect("second field");

        // MemoryRemoteFolder registers both entries under the same
        // basename, so the cache deduplicates the fetch; both staging
        // dirs still receive a copy.
        assert!(fx.storage.exists(&format!("{}/shared.png", generation.field_source_dir(10))).await);
        assert!(fx.storage.exists(&format!("{}/shared.png", generation.field_source_dir(20))).await);
    }

    #[tokio::test]
    async fn translated_image_is_staged_from_public_disk() {
        let fx = fixture();
        let generation = fx.store.create_generation(1, 1, "en", 5, vec![]);
        let field = FieldDto {
            template_field_id: 30,
            field_id: 30,
            value: None,
            folder: None,
            t_image: Some(TranslatedImageRef {
                id: 9,
                file_name: "headline_en.png".into(),
            }),
        };

        fx.public_storage
            .put("translated/9/headline_en.png", b"translated")
            .await
            .expect("seed public disk");

        fx.fetcher
            .copy_translated_images(&generation, &field)
            .await
            .expect("copy translated");

        let staged = format!("{}/headline_en.png", generation.field_source_dir(30));
        assert_eq!(fx.storage.get(&staged).await.expect("staged"), b"translated");

        let current = fx.store.generation(generation.uuid).expect("generation");
        assert!((current.progress_percent - PROGRESS_TRANSLATED).abs() < f64::EPSILON);
    }
}
