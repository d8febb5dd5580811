//! Raster image capability: per-size preparation, composite merging, and
//! dimension probing. Injected into the composition stage so tests can
//! substitute a recording double.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::imageops::FilterType;

use crate::CloudError;

/// Opaque image operations the composition stage depends on.
///
/// All paths are absolute filesystem locations; implementations own any
/// decoding/encoding concerns.
#[async_trait]
pub trait ImageOps: Send + Sync {
    /// Scale/crop `input` to cover `width`×`height` and write it to `out`.
    async fn prepare(
        &self,
        input: &Path,
        width: u32,
        height: u32,
        out: &Path,
    ) -> Result<(), CloudError>;

    /// Composite `overlay` onto `base` and write the result to `out`.
    async fn merge(&self, base: &Path, overlay: &Path, out: &Path) -> Result<(), CloudError>;

    /// Re-encode the image at `input` into the format implied by `out`'s
    /// extension.
    async fn export(&self, input: &Path, out: &Path) -> Result<(), CloudError>;

    /// Width and height of the image at `path`.
    async fn probe(&self, path: &Path) -> Result<(u32, u32), CloudError>;
}

// ---------------------------------------------------------------------------
// RasterImageOps
// ---------------------------------------------------------------------------

/// [`ImageOps`] backed by the `image` crate. Decoding and encoding are
/// CPU-bound, so every operation runs on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct RasterImageOps;

impl RasterImageOps {
    pub fn new() -> Self {
        Self
    }

    async fn run_blocking<T, F>(task: F) -> Result<T, CloudError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, CloudError> + Send + 'static,
    {
        tokio::task::spawn_blocking(task)
            .await
            .map_err(|e| CloudError::Task(e.to_string()))?
    }

    fn write_image(img: &image::DynamicImage, out: &Path) -> Result<(), CloudError> {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        img.save(out)?;
        Ok(())
    }
}

#[async_trait]
impl ImageOps for RasterImageOps {
    async fn prepare(
        &self,
        input: &Path,
        width: u32,
        height: u32,
        out: &Path,
    ) -> Result<(), CloudError> {
        let (input, out): (PathBuf, PathBuf) = (input.to_owned(), out.to_owned());
        Self::run_blocking(move || {
            let img = image::open(&input)?;
            let prepared = img.resize_to_fill(width, height, FilterType::Lanczos3);
            Self::write_image(&prepared, &out)
        })
        .await
    }

    async fn merge(&self, base: &Path, overlay: &Path, out: &Path) -> Result<(), CloudError> {
        let (base, overlay, out): (PathBuf, PathBuf, PathBuf) =
            (base.to_owned(), overlay.to_owned(), out.to_owned());
        Self::run_blocking(move || {
            let mut composite = image::open(&base)?;
            let top = image::open(&overlay)?;
            image::imageops::overlay(&mut composite, &top, 0, 0);
            Self::write_image(&composite, &out)
        })
        .await
    }

    async fn export(&self, input: &Path, out: &Path) -> Result<(), CloudError> {
        let (input, out): (PathBuf, PathBuf) = (input.to_owned(), out.to_owned());
        Self::run_blocking(move || {
            let img = image::open(&input)?;
            // JPEG cannot carry an alpha channel; flatten before encoding.
            let flattened = image::DynamicImage::ImageRgb8(img.to_rgb8());
            Self::write_image(&flattened, &out)
        })
        .await
    }

    async fn probe(&self, path: &Path) -> Result<(u32, u32), CloudError> {
        let path: PathBuf = path.to_owned();
        Self::run_blocking(move || {
            let dims = image::image_dimensions(&path)?;
            Ok(dims)
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(path: &Path, width: u32, height: u32, pixel: [u8; 4]) {
        let img = RgbaImage::from_pixel(width, height, Rgba(pixel));
        img.save(path).expect("write test png");
    }

    #[tokio::test]
    async fn prepare_resizes_to_target_dimensions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("in.png");
        let out = dir.path().join("scratch/out.png");
        write_png(&input, 64, 32, [255, 0, 0, 255]);

        let ops = RasterImageOps::new();
        ops.prepare(&input, 16, 16, &out).await.expect("prepare");

        assert_eq!(ops.probe(&out).await.expect("probe"), (16, 16));
    }

    #[tokio::test]
    async fn merge_composites_onto_base() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path().join("base.png");
        let overlay = dir.path().join("overlay.png");
        let out = dir.path().join("merged.png");
        write_png(&base, 8, 8, [0, 0, 255, 255]);
        // Semi-opaque overlay so the composite differs from both inputs.
        write_png(&overlay, 8, 8, [255, 0, 0, 128]);

        let ops = RasterImageOps::new();
        ops.merge(&base, &overlay, &out).await.expect("merge");
        assert_eq!(ops.probe(&out).await.expect("probe"), (8, 8));
    }

    #[tokio::test]
    async fn export_flattens_alpha_for_jpeg() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("rgba.png");
        let out = dir.path().join("final.jpg");
        write_png(&input, 4, 4, [0, 255, 0, 200]);

        let ops = RasterImageOps::new();
        ops.export(&input, &out).await.expect("export");
        assert_eq!(ops.probe(&out).await.expect("probe"), (4, 4));
    }

    #[tokio::test]
    async fn probe_fails_on_missing_file() {
        let ops = RasterImageOps::new();
        let missing = std::path::Path::new("/nonexistent/file.png");
        assert!(ops.probe(missing).await.is_err());
    }
}
