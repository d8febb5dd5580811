//! Worker runtime wiring: environment settings, pipeline assembly, and
//! an event logger for operator visibility.

use std::sync::Arc;

use adforge_cloud::http::HttpRemoteFolder;
use adforge_cloud::image_ops::RasterImageOps;
use adforge_cloud::storage::LocalDiskStorage;
use adforge_events::GenerationEventKind;
use adforge_pipeline::{Pipeline, PipelineConfig};

/// Process-level settings read from the environment.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Root of the private working disk.
    pub storage_root: String,
    /// Root of the public disk holding published assets.
    pub public_storage_root: String,
    /// Base URL of the remote source folder service.
    pub remote_base_url: String,
    pub pipeline: PipelineConfig,
}

impl WorkerSettings {
    /// Read settings from the environment, defaulting the disk roots to
    /// directories under the working directory.
    pub fn from_env() -> Self {
        Self {
            storage_root: std::env::var("ADFORGE_STORAGE_ROOT")
                .unwrap_or_else(|_| "storage/app".to_string()),
            public_storage_root: std::env::var("ADFORGE_PUBLIC_STORAGE_ROOT")
                .unwrap_or_else(|_| "storage/public".to_string()),
            remote_base_url: std::env::var("ADFORGE_REMOTE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            pipeline: PipelineConfig::from_env(),
        }
    }
}

/// Assemble a pipeline over local disks, an HTTP remote, and raster
/// image processing.
pub fn build_pipeline(settings: &WorkerSettings) -> Pipeline {
    Pipeline::new(
        settings.pipeline.clone(),
        Arc::new(LocalDiskStorage::new(settings.storage_root.as_str())),
        Arc::new(LocalDiskStorage::new(settings.public_storage_root.as_str())),
        Arc::new(HttpRemoteFolder::new(settings.remote_base_url.as_str())),
        Arc::new(RasterImageOps::new()),
    )
}

/// Mirror every bus event into the worker log until the bus closes.
pub async fn log_events(pipeline: Pipeline) {
    let mut rx = pipeline.bus().subscribe();
    loop {
        match rx.recv().await {
            Ok(event) => match &event.kind {
                GenerationEventKind::Progress { message, percent } => {
                    tracing::info!(
                        generation_uuid = %event.generation_uuid,
                        percent = *percent,
                        "{message}",
                    );
                }
                kind => {
                    tracing::info!(
                        generation_uuid = %event.generation_uuid,
                        event = ?kind,
                        "Generation event",
                    );
                }
            },
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event logger lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_fall_back_to_local_defaults() {
        let settings = WorkerSettings::from_env();
        assert!(!settings.storage_root.is_empty());
        assert!(!settings.public_storage_root.is_empty());
        assert!(settings.remote_base_url.starts_with("http"));
    }
}
