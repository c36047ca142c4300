// Swap transform seam
//
// The accelerator-backed face-swap model is a deployment concern; the
// pipeline only ever sees the `SwapTransform` trait. `BlendSwap` is
// the built-in deterministic compositing implementation.

use async_trait::async_trait;
use image::imageops::FilterType;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::core::errors::TransformError;

/// The single configured transform: read the staged source and target,
/// produce one output artifact. Synchronous and deterministic given
/// identical inputs; no side effects outside the working area.
#[async_trait]
pub trait SwapTransform: Send + Sync {
    async fn apply(
        &self,
        source: &Path,
        target: &Path,
        output: &Path,
    ) -> Result<(), TransformError>;
}

/// Deterministic compositing swap: the source face is resized and
/// blended onto the center of the target image.
pub struct BlendSwap {
    /// Fraction of the target's smaller dimension the source is
    /// scaled to, in [0, 1]
    face_scale: f32,
}

impl BlendSwap {
    pub fn new() -> Self {
        Self { face_scale: 0.5 }
    }

    fn run_blocking(
        source: PathBuf,
        target: PathBuf,
        output: PathBuf,
        face_scale: f32,
    ) -> Result<(), TransformError> {
        let source_img = image::open(&source)?;
        let mut target_img = image::open(&target)?;

        let side = (target_img.width().min(target_img.height()) as f32 * face_scale)
            .max(1.0) as u32;
        let face = source_img.resize_exact(side, side, FilterType::Lanczos3);

        let x = (target_img.width().saturating_sub(side)) / 2;
        let y = (target_img.height().saturating_sub(side)) / 2;
        image::imageops::overlay(&mut target_img, &face, i64::from(x), i64::from(y));

        target_img.save(&output).map_err(TransformError::Image)?;
        Ok(())
    }
}

impl Default for BlendSwap {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SwapTransform for BlendSwap {
    #[instrument(skip(self), fields(output = %output.display()))]
    async fn apply(
        &self,
        source: &Path,
        target: &Path,
        output: &Path,
    ) -> Result<(), TransformError> {
        debug!("Compositing {} onto {}", source.display(), target.display());

        let source = source.to_path_buf();
        let target = target.to_path_buf();
        let output = output.to_path_buf();
        let face_scale = self.face_scale;

        // Decode/encode is CPU-bound; keep it off the async runtime
        tokio::task::spawn_blocking(move || {
            Self::run_blocking(source, target, output, face_scale)
        })
        .await
        .map_err(|e| TransformError::TaskJoin(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32, pixel: [u8; 4]) {
        let img = RgbaImage::from_pixel(width, height, Rgba(pixel));
        img.save(path).unwrap();
    }

    #[tokio::test]
    async fn test_blend_swap_produces_target_sized_output() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.png");
        let target = dir.path().join("target.png");
        let output = dir.path().join("output.png");

        write_png(&source, 8, 8, [255, 0, 0, 255]);
        write_png(&target, 32, 16, [0, 0, 255, 255]);

        BlendSwap::new()
            .apply(&source, &target, &output)
            .await
            .unwrap();

        let produced = image::open(&output).unwrap();
        assert_eq!(produced.width(), 32);
        assert_eq!(produced.height(), 16);

        // The blended face covers the center pixel
        let center = produced.to_rgba8().get_pixel(16, 8).0;
        assert_eq!(center, [255, 0, 0, 255]);
    }

    #[tokio::test]
    async fn test_blend_swap_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.png");
        let target = dir.path().join("target.png");
        let out_a = dir.path().join("a.png");
        let out_b = dir.path().join("b.png");

        write_png(&source, 4, 4, [10, 20, 30, 255]);
        write_png(&target, 10, 10, [200, 200, 200, 255]);

        let swap = BlendSwap::new();
        swap.apply(&source, &target, &out_a).await.unwrap();
        swap.apply(&source, &target, &out_b).await.unwrap();

        assert_eq!(std::fs::read(&out_a).unwrap(), std::fs::read(&out_b).unwrap());
    }

    #[tokio::test]
    async fn test_blend_swap_rejects_corrupt_input() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.png");
        let target = dir.path().join("target.png");
        let output = dir.path().join("output.png");

        std::fs::write(&source, b"not a png").unwrap();
        write_png(&target, 4, 4, [0, 0, 0, 255]);

        let err = BlendSwap::new()
            .apply(&source, &target, &output)
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Image(_)));
        assert!(!output.exists());
    }
}
