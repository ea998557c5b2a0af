//! Derived variant generation.
//!
//! The media manager owns where variants live and how they are committed; a
//! [`VariantGenerator`] only turns the committed original into the bytes of a
//! derived variant.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;

use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};

use super::VariantKind;
use crate::error::{MediaError, Result};

/// Default maximum width of the `content` variant.
pub const DEFAULT_CONTENT_MAX_WIDTH: u32 = 1600;

/// Default maximum width of the `thumb` variant.
pub const DEFAULT_THUMB_MAX_WIDTH: u32 = 400;

/// Produces the bytes of a derived variant from a committed original.
///
/// Implementations write into `out` only; they must not touch `original`.
pub trait VariantGenerator: Send + Sync {
    fn generate(&self, original: &Path, kind: VariantKind, out: &mut dyn Write) -> Result<()>;
}

/// Downscales to a maximum width and encodes lossless WebP.
#[derive(Debug, Clone, Copy)]
pub struct ResizeVariants {
    pub content_max_width: u32,
    pub thumb_max_width: u32,
}

impl Default for ResizeVariants {
    fn default() -> Self {
        Self {
            content_max_width: DEFAULT_CONTENT_MAX_WIDTH,
            thumb_max_width: DEFAULT_THUMB_MAX_WIDTH,
        }
    }
}

impl ResizeVariants {
    fn max_width(&self, kind: VariantKind) -> Option<u32> {
        match kind {
            VariantKind::Content => Some(self.content_max_width),
            VariantKind::Thumb => Some(self.thumb_max_width),
            VariantKind::Original => None,
        }
    }
}

impl VariantGenerator for ResizeVariants {
    fn generate(&self, original: &Path, kind: VariantKind, out: &mut dyn Write) -> Result<()> {
        let max_width = self
            .max_width(kind)
            .ok_or_else(|| MediaError::variant(kind, "original is not a derived variant"))?;

        let image = ImageReader::open(original)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| MediaError::variant(kind, e))?
            .decode()
            .map_err(|e| MediaError::variant(kind, e))?;

        let resized = fit_width(image, max_width);
        let rgba = DynamicImage::ImageRgba8(resized.to_rgba8());

        rgba.write_with_encoder(WebPEncoder::new_lossless(out))
            .map_err(|e| MediaError::variant(kind, e))
    }
}

/// Scale down to `max_width` keeping the aspect ratio. Never upscales.
fn fit_width(image: DynamicImage, max_width: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    if max_width == 0 || width <= max_width {
        return image;
    }
    let new_height = (u64::from(height) * u64::from(max_width) / u64::from(width)).max(1);
    image.resize_exact(max_width, new_height as u32, FilterType::Lanczos3)
}

/// Byte-for-byte copy of the original.
///
/// Useful where decoding cost is unwanted; the derived path still carries the
/// fixed derived extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyVariants;

impl VariantGenerator for CopyVariants {
    fn generate(&self, original: &Path, kind: VariantKind, out: &mut dyn Write) -> Result<()> {
        let mut reader = File::open(original)
            .map(BufReader::new)
            .map_err(|e| MediaError::variant(kind, e))?;
        io::copy(&mut reader, out).map_err(|e| MediaError::variant(kind, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn write_png(dir: &Path, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.join("original.png");
        RgbImage::from_pixel(width, height, image::Rgb([200, 100, 50]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    #[test]
    fn test_fit_width_downscales_preserving_ratio() {
        let image = DynamicImage::new_rgb8(800, 600);
        let fitted = fit_width(image, 400);
        assert_eq!((fitted.width(), fitted.height()), (400, 300));
    }

    #[test]
    fn test_fit_width_never_upscales() {
        let image = DynamicImage::new_rgb8(10, 10);
        let fitted = fit_width(image, 400);
        assert_eq!((fitted.width(), fitted.height()), (10, 10));
    }

    #[test]
    fn test_fit_width_keeps_at_least_one_row() {
        let image = DynamicImage::new_rgb8(4000, 1);
        let fitted = fit_width(image, 400);
        assert_eq!((fitted.width(), fitted.height()), (400, 1));
    }

    #[test]
    fn test_resize_variants_emit_webp() {
        let dir = tempfile::tempdir().unwrap();
        let original = write_png(dir.path(), 640, 480);

        let generator = ResizeVariants::default();
        let mut out = Vec::new();
        generator
            .generate(&original, VariantKind::Thumb, &mut out)
            .unwrap();

        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::WebP);
        let thumb = image::load(Cursor::new(&out), ImageFormat::WebP).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (400, 300));
    }

    #[test]
    fn test_resize_variants_reject_original_kind() {
        let dir = tempfile::tempdir().unwrap();
        let original = write_png(dir.path(), 4, 4);

        let mut out = Vec::new();
        let err = ResizeVariants::default()
            .generate(&original, VariantKind::Original, &mut out)
            .unwrap_err();
        assert!(matches!(err, MediaError::Variant { .. }));
        assert!(out.is_empty());
    }

    #[test]
    fn test_resize_variants_fail_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("garbage.png");
        std::fs::write(&original, b"definitely not an image").unwrap();

        let mut out = Vec::new();
        let err = ResizeVariants::default()
            .generate(&original, VariantKind::Content, &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            MediaError::Variant {
                kind: VariantKind::Content,
                ..
            }
        ));
    }

    #[test]
    fn test_copy_variants_copy_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let original = write_png(dir.path(), 3, 3);

        let mut out = Vec::new();
        CopyVariants
            .generate(&original, VariantKind::Content, &mut out)
            .unwrap();
        assert_eq!(out, std::fs::read(&original).unwrap());
    }
}
