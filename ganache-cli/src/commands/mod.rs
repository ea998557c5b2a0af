//! Subcommand implementations.

pub mod ingest;
pub mod migrate;
pub mod path;
