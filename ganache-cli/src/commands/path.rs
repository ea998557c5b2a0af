//! Path command implementation.

use std::path::PathBuf;

use anyhow::Result;
use ganache_core::{MediaManager, VariantKind};

use crate::exit_codes::UsageError;

/// Execute the path command.
pub fn execute(sha256: &str, variant: VariantKind, ext: &str, root: PathBuf) -> Result<()> {
    validate_sha256(sha256)?;

    let media = MediaManager::new(root);
    println!("{}", media.path_for_variant(sha256, variant, ext).display());
    Ok(())
}

fn validate_sha256(sha256: &str) -> Result<(), UsageError> {
    let valid = sha256.len() == 64
        && sha256
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
    if valid {
        Ok(())
    } else {
        Err(UsageError(format!(
            "'{}' is not a lowercase hex SHA-256 (64 characters)",
            sha256
        )))
    }
}
