//! Ganache CLI - operator tool for the Ganache image catalog.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use ganache_core::{VariantKind, DEFAULT_MAX_PIXELS, DEFAULT_MAX_UPLOAD_BYTES};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (invalid arguments)
  65  Data error (not an image, over a limit, schema mismatch)
  66  Input file could not be opened
  69  Database unavailable
  74  I/O error writing to the media root";

#[derive(Parser)]
#[command(name = "ganache")]
#[command(author, version, about = "Ganache image catalog operator tool", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Suppress all non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// When to use colored output
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

/// Output format for command results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    #[default]
    Up,
    Down,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply (or revert) the embedded database migrations
    Migrate {
        /// up applies pending migrations, down reverts all of them
        #[arg(value_enum, default_value_t = Direction::Up)]
        direction: Direction,

        /// PostgreSQL connection string
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: String,
    },

    /// Store a local image in the content-addressed media tree
    Ingest {
        /// Path to the image
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Media storage root
        #[arg(long, env = "GANACHE_STORAGE_ROOT", default_value = "./data")]
        root: PathBuf,

        /// Largest accepted file in bytes
        #[arg(long, env = "GANACHE_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
        max_bytes: u64,

        /// Largest accepted image, width times height
        #[arg(long, env = "GANACHE_MAX_PIXELS", default_value_t = DEFAULT_MAX_PIXELS)]
        max_pixels: u64,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print where a variant of some content lives under the storage root
    Path {
        /// Lowercase hex SHA-256 of the original
        #[arg(value_name = "SHA256")]
        sha256: String,

        /// original, content or thumb
        #[arg(value_name = "VARIANT")]
        variant: VariantKind,

        /// Extension of the original (ignored for derived variants)
        #[arg(long, default_value = "jpg")]
        ext: String,

        /// Media storage root
        #[arg(long, env = "GANACHE_STORAGE_ROOT", default_value = "./data")]
        root: PathBuf,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(colored::control::SHOULD_COLORIZE.should_colorize())
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {}
    }
    init_tracing(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Migrate {
            direction,
            database_url,
        } => commands::migrate::execute(&database_url, direction, cli.quiet).await,
        Commands::Ingest {
            file,
            root,
            max_bytes,
            max_pixels,
            format,
        } => {
            let limits = commands::ingest::Limits {
                max_bytes,
                max_pixels,
            };
            commands::ingest::execute(file, root, limits, format, cli.quiet).await
        }
        Commands::Path {
            sha256,
            variant,
            ext,
            root,
        } => commands::path::execute(&sha256, variant, &ext, root),
    };

    let exit = match result {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };
    if let Some(message) = exit.message {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
