//! Migrate command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use ganache_server::{PostgresAssetStore, StoreError, MIGRATOR};
use tracing::info;

use crate::Direction;

/// Execute the migrate command.
pub async fn execute(database_url: &str, direction: Direction, quiet: bool) -> Result<()> {
    let store = PostgresAssetStore::connect(database_url, 2, 1)
        .await
        .context("Failed to connect to PostgreSQL")?;

    let known = MIGRATOR.iter().count();
    match direction {
        Direction::Up => {
            MIGRATOR
                .run(store.pool())
                .await
                .map_err(StoreError::from)
                .context("Failed to apply migrations")?;
            info!(migrations = known, "Migrations applied");
        }
        Direction::Down => {
            MIGRATOR
                .undo(store.pool(), 0)
                .await
                .map_err(StoreError::from)
                .context("Failed to revert migrations")?;
            info!(migrations = known, "Migrations reverted");
        }
    }

    if !quiet {
        let verb = match direction {
            Direction::Up => "applied",
            Direction::Down => "reverted",
        };
        println!(
            "{} {} ({} known)",
            "Migrations".green().bold(),
            verb,
            known
        );
    }

    Ok(())
}
