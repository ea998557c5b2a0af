//! Ingest command implementation.
//!
//! Writes a local image into the media tree exactly as an upload would,
//! without touching the asset store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use ganache_core::{MediaManager, ResizeVariants, SavedMedia, VariantKind};
use serde::Serialize;
use tracing::info;

use crate::exit_codes::InputError;
use crate::OutputFormat;

/// Admission limits for the ingested file.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_bytes: u64,
    pub max_pixels: u64,
}

#[derive(Serialize)]
struct IngestReport<'a> {
    #[serde(flatten)]
    media: &'a SavedMedia,
    paths: VariantPaths,
}

#[derive(Serialize)]
struct VariantPaths {
    original: PathBuf,
    content: PathBuf,
    thumb: PathBuf,
}

impl VariantPaths {
    fn new(media: &MediaManager, saved: &SavedMedia) -> Self {
        let path = |kind| media.path_for_variant(&saved.sha256, kind, &saved.extension);
        Self {
            original: path(VariantKind::Original),
            content: path(VariantKind::Content),
            thumb: path(VariantKind::Thumb),
        }
    }
}

/// Execute the ingest command.
pub async fn execute(
    file: PathBuf,
    root: PathBuf,
    limits: Limits,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let input = tokio::fs::File::open(&file)
        .await
        .map_err(|e| InputError(format!("Failed to read file {}: {}", file.display(), e)))?;

    let media = MediaManager::with_generator(root, ResizeVariants::default());
    let filename = file_name(&file);

    let saved = media
        .save(input, &filename, limits.max_bytes, limits.max_pixels)
        .await
        .with_context(|| format!("Failed to ingest {}", file.display()))?;

    info!(sha256 = %saved.sha256, bytes = saved.bytes, "Ingested");

    let report = IngestReport {
        paths: VariantPaths::new(&media, &saved),
        media: &saved,
    };

    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{}", json);
        }
        OutputFormat::Text if !quiet => print_report(&report),
        OutputFormat::Text => {}
    }

    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_report(report: &IngestReport<'_>) {
    let media = report.media;
    println!();
    println!("{}", "Image stored".green().bold());
    println!();
    println!("   {} {}", "SHA-256:".dimmed(), media.sha256);
    println!("   {} {}", "Type:".dimmed(), media.mime);
    println!(
        "   {} {}x{} ({} bytes)",
        "Size:".dimmed(),
        media.width,
        media.height,
        media.bytes
    );
    println!("   {} {}", "Original:".dimmed(), report.paths.original.display());
    println!("   {} {}", "Content:".dimmed(), report.paths.content.display());
    println!("   {} {}", "Thumb:".dimmed(), report.paths.thumb.display());
}
