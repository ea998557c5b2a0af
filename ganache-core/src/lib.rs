//! Ganache Core - tag normalization and content-addressed media storage
//!
//! This crate holds the parts of the Ganache image catalog that do not depend
//! on a database or an HTTP surface:
//!
//! - [`tags`]: canonical form for free-text tags
//! - [`media`]: streaming uploads into a SHA-256 addressed file layout with
//!   derived `content` and `thumb` variants
//!
//! # Example
//!
//! ```no_run
//! use ganache_core::{MediaManager, VariantKind, DEFAULT_MAX_PIXELS, DEFAULT_MAX_UPLOAD_BYTES};
//!
//! # async fn example() -> ganache_core::Result<()> {
//! let media = MediaManager::new("./data");
//! let file = tokio::fs::File::open("photo.jpg").await?;
//! let saved = media
//!     .save(file, "photo.jpg", DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_MAX_PIXELS)
//!     .await?;
//!
//! let thumb = media.path_for_variant(&saved.sha256, VariantKind::Thumb, &saved.extension);
//! println!("{}", thumb.display());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod media;
pub mod tags;

pub use error::{MediaError, Result};
pub use media::{
    original_extension, CopyVariants, MediaManager, ResizeVariants, SavedMedia, UnknownVariant,
    VariantGenerator, VariantKind, DEFAULT_CONTENT_MAX_WIDTH, DEFAULT_MAX_PIXELS,
    DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_THUMB_MAX_WIDTH, DERIVED_EXTENSION,
};
