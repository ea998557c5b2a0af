//! Content-addressed media storage.
//!
//! Originals land at `<root>/original/<aa>/<bb>/<sha256>.<ext>` and the derived
//! variants at `<root>/{content,thumb}/<aa>/<bb>/<sha256>.webp`, where `aa` and
//! `bb` are the first two byte pairs of the hex digest. Every file is written to
//! a temporary sibling first and renamed into place, so a canonical path either
//! holds complete bytes or does not exist.

mod variants;

pub use variants::{
    CopyVariants, ResizeVariants, VariantGenerator, DEFAULT_CONTENT_MAX_WIDTH,
    DEFAULT_THUMB_MAX_WIDTH,
};

use std::fmt;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use image::{ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::TempPath;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::{MediaError, Result};

/// Default upload cap: 20 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Default decoded pixel cap.
pub const DEFAULT_MAX_PIXELS: u64 = 50_000_000;

/// Extension carried by every derived variant.
pub const DERIVED_EXTENSION: &str = "webp";

/// Number of leading bytes kept for format sniffing.
const SNIFF_LEN: usize = 8192;

const READ_BUFFER_SIZE: usize = 64 * 1024;

const WRITE_PROBE_PREFIX: &str = ".writetest-";

/// Stored representation of an asset's image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    Original,
    Content,
    Thumb,
}

impl VariantKind {
    /// Variants derived from the original after commit.
    pub const DERIVED: [VariantKind; 2] = [VariantKind::Content, VariantKind::Thumb];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Content => "content",
            Self::Thumb => "thumb",
        }
    }

    pub fn is_derived(&self) -> bool {
        !matches!(self, Self::Original)
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown variant '{0}'")]
pub struct UnknownVariant(pub String);

impl FromStr for VariantKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "original" => Ok(Self::Original),
            "content" => Ok(Self::Content),
            "thumb" => Ok(Self::Thumb),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Facts about a committed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedMedia {
    /// Lowercase hex SHA-256 of the uploaded bytes.
    pub sha256: String,
    pub bytes: u64,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    /// Extension of the original, without a leading dot.
    pub extension: String,
}

/// Upload staged in a temporary file next to the store root.
struct Staged {
    path: TempPath,
    sha256: String,
    bytes: u64,
    head: Vec<u8>,
}

/// Writes uploads into the content-addressed layout and derives variants.
#[derive(Clone)]
pub struct MediaManager {
    root: PathBuf,
    generator: Arc<dyn VariantGenerator>,
}

impl fmt::Debug for MediaManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaManager")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl MediaManager {
    /// Manager using [`ResizeVariants`] with default widths.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_generator(root, ResizeVariants::default())
    }

    pub fn with_generator(
        root: impl Into<PathBuf>,
        generator: impl VariantGenerator + 'static,
    ) -> Self {
        Self {
            root: root.into(),
            generator: Arc::new(generator),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stream an upload into the store.
    ///
    /// The stream is hashed while it is written to a temporary file; more than
    /// `max_bytes` bytes fails with [`MediaError::TooLarge`]. The staged bytes
    /// must decode as an image with positive dimensions and at most
    /// `max_pixels` pixels. Identical content resolves to the same canonical
    /// path, and an existing original is never rewritten.
    ///
    /// Dropping the returned future before completion leaves no canonical
    /// file behind.
    pub async fn save<R>(
        &self,
        mut reader: R,
        filename: &str,
        max_bytes: u64,
        max_pixels: u64,
    ) -> Result<SavedMedia>
    where
        R: AsyncRead + Unpin,
    {
        tokio::fs::create_dir_all(&self.root).await?;
        let staged = self.stage(&mut reader, max_bytes).await?;
        debug!(sha256 = %staged.sha256, bytes = staged.bytes, "upload staged");

        let manager = self.clone();
        let filename = filename.to_string();
        tokio::task::spawn_blocking(move || manager.commit(staged, &filename, max_pixels))
            .await
            .map_err(|e| MediaError::Io(std::io::Error::other(e)))?
    }

    async fn stage<R>(&self, reader: &mut R, max_bytes: u64) -> Result<Staged>
    where
        R: AsyncRead + Unpin,
    {
        let (file, path) = tempfile::Builder::new()
            .prefix(".upload-")
            .tempfile_in(&self.root)?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut hasher = Sha256::new();
        let mut head = Vec::with_capacity(SNIFF_LEN);
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut bytes: u64 = 0;

        loop {
            let n = reader.read(&mut buf).await.map_err(MediaError::Upload)?;
            if n == 0 {
                break;
            }
            bytes += n as u64;
            if bytes > max_bytes {
                return Err(MediaError::TooLarge { max: max_bytes });
            }

            let chunk = &buf[..n];
            hasher.update(chunk);
            if head.len() < SNIFF_LEN {
                let take = (SNIFF_LEN - head.len()).min(n);
                head.extend_from_slice(&chunk[..take]);
            }
            file.write_all(chunk).await?;
        }

        file.flush().await?;
        file.sync_all().await?;

        Ok(Staged {
            path,
            sha256: hex::encode(hasher.finalize()),
            bytes,
            head,
        })
    }

    fn commit(&self, staged: Staged, filename: &str, max_pixels: u64) -> Result<SavedMedia> {
        let reader = ImageReader::open(&staged.path)?.with_guessed_format()?;
        let format = reader
            .format()
            .ok_or_else(|| MediaError::InvalidImage("unrecognized image format".into()))?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| MediaError::InvalidImage(e.to_string()))?;

        if width == 0 || height == 0 {
            return Err(MediaError::InvalidImage(format!(
                "image has empty dimensions {width}x{height}"
            )));
        }
        if u64::from(width) * u64::from(height) > max_pixels {
            return Err(MediaError::InvalidImage(format!(
                "image of {width}x{height} exceeds {max_pixels} pixels"
            )));
        }

        let mime = image::guess_format(&staged.head)
            .unwrap_or(format)
            .to_mime_type()
            .to_string();
        let extension = resolve_extension(filename, &mime, Some(format));

        let original = self.path_for_variant(&staged.sha256, VariantKind::Original, &extension);
        if original.exists() {
            debug!(path = %original.display(), "original already stored");
        } else {
            install(staged.path, &original)?;
            info!(sha256 = %staged.sha256, path = %original.display(), "original stored");
        }

        self.generate_variants(&original, &staged.sha256)?;

        Ok(SavedMedia {
            sha256: staged.sha256,
            bytes: staged.bytes,
            mime,
            width,
            height,
            extension,
        })
    }

    fn generate_variants(&self, original: &Path, sha256: &str) -> Result<()> {
        for kind in VariantKind::DERIVED {
            let dest = self.path_for_variant(sha256, kind, DERIVED_EXTENSION);
            if dest.exists() {
                continue;
            }
            let dir = parent_of(&dest)?;
            std::fs::create_dir_all(dir)?;

            let mut tmp = tempfile::Builder::new()
                .prefix(".variant-")
                .tempfile_in(dir)?;
            {
                let mut out = BufWriter::new(tmp.as_file_mut());
                self.generator.generate(original, kind, &mut out)?;
                out.flush()?;
            }
            tmp.as_file().sync_all()?;
            install(tmp.into_temp_path(), &dest)?;
            debug!(%kind, path = %dest.display(), "variant stored");
        }
        Ok(())
    }

    /// Canonical path of a stored variant.
    ///
    /// Derived variants always use [`DERIVED_EXTENSION`]; `extension` only
    /// applies to the original and may carry a leading dot.
    pub fn path_for_variant(&self, sha256: &str, kind: VariantKind, extension: &str) -> PathBuf {
        let extension = match kind {
            VariantKind::Original => extension.trim_start_matches('.'),
            VariantKind::Content | VariantKind::Thumb => DERIVED_EXTENSION,
        };
        self.root
            .join(kind.as_str())
            .join(shard(sha256, 0..2))
            .join(shard(sha256, 2..4))
            .join(format!("{sha256}.{extension}"))
    }

    /// Probe that the store root accepts writes.
    ///
    /// Each call writes its own uniquely named marker, so concurrent probes
    /// never share a file.
    pub async fn is_writable(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut probe = tempfile::Builder::new()
                .prefix(WRITE_PROBE_PREFIX)
                .tempfile_in(&root)?;
            probe.write_all(b"ok")?;
            probe.close()?;
            Ok(())
        })
        .await
        .map_err(|e| MediaError::Io(std::io::Error::other(e)))?
    }
}

fn shard(sha256: &str, range: std::ops::Range<usize>) -> &str {
    sha256.get(range).unwrap_or("_")
}

fn parent_of(path: &Path) -> Result<&Path> {
    path.parent().ok_or_else(|| {
        MediaError::Io(std::io::Error::other(format!(
            "{} has no parent directory",
            path.display()
        )))
    })
}

/// Rename a finished temporary file onto its canonical path.
fn install(tmp: TempPath, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(parent_of(dest)?)?;
    tmp.persist(dest).map_err(|e| MediaError::Io(e.error))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dest, std::fs::Permissions::from_mode(0o644))?;
    }
    Ok(())
}

/// Extension of a stored original, recovered from the asset's recorded
/// filename and MIME type.
///
/// Gives the same answer `save` chose when it committed the original.
pub fn original_extension(filename: Option<&str>, mime: &str) -> String {
    resolve_extension(filename.unwrap_or(""), mime, None)
}

/// Pick the original's extension: the client filename, then the sniffed MIME
/// type, then the decoder's format.
fn resolve_extension(filename: &str, mime: &str, format: Option<ImageFormat>) -> String {
    let from_filename = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase());

    from_filename
        .or_else(|| {
            ImageFormat::from_mime_type(mime)
                .and_then(|f| f.extensions_str().first())
                .map(|ext| ext.to_string())
        })
        .or_else(|| {
            format
                .and_then(|f| f.extensions_str().first())
                .map(|ext| ext.to_string())
        })
        .unwrap_or_else(|| "bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789";

    #[test]
    fn test_variant_kind_round_trips_through_str() {
        for kind in [VariantKind::Original, VariantKind::Content, VariantKind::Thumb] {
            assert_eq!(kind.as_str().parse::<VariantKind>().unwrap(), kind);
        }
        assert_eq!(
            "large".parse::<VariantKind>().unwrap_err(),
            UnknownVariant("large".into())
        );
        assert_eq!(
            UnknownVariant("large".into()).to_string(),
            "unknown variant 'large'"
        );
    }

    #[test]
    fn test_path_layout() {
        let manager = MediaManager::new("/root");
        assert_eq!(
            manager.path_for_variant(SHA, VariantKind::Original, ".jpg"),
            PathBuf::from(format!("/root/original/ab/cd/{SHA}.jpg"))
        );
        assert_eq!(
            manager.path_for_variant(SHA, VariantKind::Original, "png"),
            PathBuf::from(format!("/root/original/ab/cd/{SHA}.png"))
        );
        assert_eq!(
            manager.path_for_variant(SHA, VariantKind::Content, ".jpg"),
            PathBuf::from(format!("/root/content/ab/cd/{SHA}.webp"))
        );
        assert_eq!(
            manager.path_for_variant(SHA, VariantKind::Thumb, "jpg"),
            PathBuf::from(format!("/root/thumb/ab/cd/{SHA}.webp"))
        );
    }

    #[test]
    fn test_resolve_extension_prefers_filename() {
        let png = Some(ImageFormat::Png);
        assert_eq!(resolve_extension("Photo.JPEG", "image/png", png), "jpeg");
        assert_eq!(resolve_extension("photo", "image/png", png), "png");
        assert_eq!(resolve_extension("", "image/gif", Some(ImageFormat::Gif)), "gif");
        assert_eq!(
            resolve_extension("weird.p/ng", "application/octet-stream", Some(ImageFormat::WebP)),
            "webp"
        );
        assert_eq!(resolve_extension("bad.ex t", "image/jpeg", None), "jpg");
        assert_eq!(resolve_extension("", "application/octet-stream", None), "bin");
    }

    #[test]
    fn test_original_extension_matches_save_choice() {
        assert_eq!(original_extension(Some("a.PNG"), "image/png"), "png");
        assert_eq!(original_extension(None, "image/jpeg"), "jpg");
        assert_eq!(original_extension(Some("noext"), "image/webp"), "webp");
    }
}
