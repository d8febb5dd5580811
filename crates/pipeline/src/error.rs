use adforge_cloud::CloudError;
use adforge_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error("Generation not found: {0}")]
    GenerationNotFound(uuid::Uuid),
}
