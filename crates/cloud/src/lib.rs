//! Boundary traits and implementations for everything the pipeline
//! touches outside its own process: block storage, remote source
//! folders, and raster image operations.

pub mod http;
pub mod image_ops;
pub mod remote;
pub mod storage;

pub use image_ops::ImageOps;
pub use remote::{RemoteEntry, RemoteEntryKind, RemoteFolder};
pub use storage::Storage;

/// Errors surfaced by the boundary implementations.
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Remote source error: {0}")]
    Remote(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image operation failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Background task failed: {0}")]
    Task(String),
}
