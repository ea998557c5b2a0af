//! Multipart form parsing for asset uploads
//!
//! The `file` field is streamed straight into the media manager; every other
//! field is read as text.

use std::io;

use axum::extract::multipart::{Field, Multipart};
use futures::TryStreamExt;
use ganache_core::{MediaManager, SavedMedia};
use tokio_util::io::StreamReader;

use crate::error::ApiError;
use crate::state::UploadLimits;
use crate::store::NewAsset;

/// Parsed upload form
#[derive(Debug, Default)]
pub struct AssetForm {
    /// Media committed from the `file` field
    pub media: Option<SavedMedia>,
    /// Client-supplied filename of the `file` field
    pub file_name: Option<String>,
    pub title: Option<String>,
    pub caption: Option<String>,
    pub credit: Option<String>,
    pub source: Option<String>,
    pub usage_notes: Option<String>,
    /// Repeatable `tags` field, raw
    pub tags: Vec<String>,
}

impl AssetForm {
    /// Consume the multipart stream, saving the file as it arrives.
    ///
    /// Unknown fields are drained and ignored. A second `file` field is
    /// rejected.
    pub async fn parse(
        multipart: &mut Multipart,
        media: &MediaManager,
        limits: UploadLimits,
    ) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to parse multipart: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();

            if name == "file" {
                if form.media.is_some() {
                    return Err(ApiError::bad_request("Only one 'file' field is allowed"));
                }
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|f| !f.is_empty());
                let saved = save_field(field, file_name.as_deref(), media, limits).await?;

                tracing::debug!(
                    sha256 = %saved.sha256,
                    bytes = saved.bytes,
                    mime = %saved.mime,
                    "Upload committed to media storage"
                );
                form.file_name = file_name;
                form.media = Some(saved);
                continue;
            }

            let value = field.text().await.map_err(|e| {
                ApiError::bad_request(format!("Failed to read field '{}': {}", name, e))
            })?;
            form.set_text(&name, value);
        }

        Ok(form)
    }

    fn set_text(&mut self, name: &str, value: String) {
        match name {
            "tags" => self.tags.push(value),
            "title" => self.title = non_blank(value),
            "caption" => self.caption = non_blank(value),
            "credit" => self.credit = non_blank(value),
            "source" => self.source = non_blank(value),
            "usageNotes" => self.usage_notes = non_blank(value),
            other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    /// The committed media, or a 400 when no file was sent.
    pub fn require_media(&self) -> Result<&SavedMedia, ApiError> {
        self.media.as_ref().ok_or_else(|| {
            ApiError::bad_request("No file provided. Use 'file' field in multipart form.")
        })
    }

    /// Build the store input from the form and its committed media.
    pub fn into_new_asset(self) -> Result<NewAsset, ApiError> {
        let media = self.require_media()?.clone();
        Ok(NewAsset {
            sha256: media.sha256,
            bytes: i64::try_from(media.bytes)
                .map_err(|_| ApiError::bad_request("File size out of range"))?,
            mime: media.mime,
            width: i32::try_from(media.width)
                .map_err(|_| ApiError::bad_request("Image width out of range"))?,
            height: i32::try_from(media.height)
                .map_err(|_| ApiError::bad_request("Image height out of range"))?,
            original_filename: self.file_name,
            title: self.title,
            caption: self.caption,
            credit: self.credit,
            source: self.source,
            usage_notes: self.usage_notes,
            tags: self.tags,
        })
    }
}

async fn save_field(
    field: Field<'_>,
    file_name: Option<&str>,
    media: &MediaManager,
    limits: UploadLimits,
) -> Result<SavedMedia, ApiError> {
    let reader = StreamReader::new(field.map_err(io::Error::other));
    tokio::pin!(reader);

    let saved = media
        .save(
            reader,
            file_name.unwrap_or(""),
            limits.max_bytes,
            limits.max_pixels,
        )
        .await?;
    Ok(saved)
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
