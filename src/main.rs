//! # Bookshelf CLI (`shelf`)
//!
//! The `shelf` binary drives the site's data tooling: fetching and
//! optimizing book covers, listing books and posts, and converting banner
//! images.
//!
//! ## Usage
//!
//! ```bash
//! shelf --config ./config/shelf.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `shelf covers` | Fetch, resize and re-encode covers for books in the export |
//! | `shelf books` | List books read since a date, with resolved cover paths |
//! | `shelf posts` | List published blog posts |
//! | `shelf convert` | Re-encode a directory of images to WebP |
//!
//! ## Examples
//!
//! ```bash
//! # Preview what would be fetched
//! shelf covers --since 2023-01-01 --dry-run
//!
//! # Re-fetch everything as progressive JPEG
//! shelf covers --format jpeg --overwrite
//!
//! # Book list as JSON for the templates
//! shelf books --json > books.json
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use bookshelf::books;
use bookshelf::config::{self, CoversConfig};
use bookshelf::convert;
use bookshelf::encode::CoverFormat;
use bookshelf::ingest::{self, CoverOptions};
use bookshelf::posts;
use bookshelf::progress::ProgressMode;

/// Bookshelf: cover ingestion and content loading for a personal site.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Missing files fall back to built-in defaults.
#[derive(Parser)]
#[command(
    name = "shelf",
    about = "Bookshelf: Goodreads cover ingestion and content loading for a personal site",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/shelf.toml")]
    config: PathBuf,

    /// More diagnostics on stderr (debug level). Ignored when RUST_LOG is set.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors on stderr. Ignored when RUST_LOG is set.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Fetch and optimize cover images for books in the Goodreads export.
    ///
    /// Books read since `--since` are processed newest first. Existing
    /// covers are skipped unless `--overwrite` is given, so interrupted runs
    /// can simply be restarted. After all books, undersized files in the
    /// output directory are removed.
    Covers {
        /// Goodreads CSV export.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Only books read on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Destination directory for cover files.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Payloads and files smaller than this many bytes are treated as placeholders.
        #[arg(long)]
        min_size: Option<u64>,

        /// Maximum number of books to process. 0 means no limit.
        #[arg(long)]
        limit: Option<usize>,

        /// Re-fetch covers that already exist.
        #[arg(long)]
        overwrite: bool,

        /// Show what would be fetched and deleted without touching network or disk.
        #[arg(long)]
        dry_run: bool,

        /// Output format. `avif` falls back to `webp` when unsupported.
        #[arg(long, value_enum)]
        format: Option<CoverFormat>,

        /// Encoding quality (0-100).
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
        quality: Option<u32>,

        /// Maximum width in pixels; wider covers are downscaled. 0 disables.
        #[arg(long)]
        max_width: Option<u32>,

        /// Progress output on stderr. Defaults to human on a terminal, JSON otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// List books read since a date, with cover paths resolved.
    Books {
        /// Only books read on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// List published blog posts, newest first.
    Posts {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Re-encode every jpg/jpeg/png in a directory to WebP.
    Convert {
        /// Directory with source images.
        #[arg(long)]
        input: PathBuf,

        /// Directory for `<name>.webp` outputs (created if missing).
        #[arg(long)]
        output: PathBuf,

        /// WebP quality (0-100).
        #[arg(long, default_value_t = convert::DEFAULT_QUALITY, value_parser = clap::value_parser!(u8).range(0..=100))]
        quality: u8,
    },
}

/// Install the stderr tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // Conversion takes explicit paths and needs no config.
    if let Commands::Convert {
        input,
        output,
        quality,
    } = &cli.command
    {
        return convert::run_convert(input, output, *quality);
    }

    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Covers {
            csv,
            since,
            out_dir,
            min_size,
            limit,
            overwrite,
            dry_run,
            format,
            quality,
            max_width,
            progress,
        } => {
            apply_overrides(
                &mut cfg.covers,
                csv,
                since,
                out_dir,
                min_size,
                limit,
                format,
                quality,
                max_width,
            );
            let mut opts = CoverOptions::from_config(&cfg.covers)?;
            opts.overwrite = overwrite;
            opts.dry_run = dry_run;

            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            ingest::run_covers(&cfg, &opts, reporter.as_ref()).await?;
        }
        Commands::Books { since, json } => {
            books::run_books(&cfg, since, json)?;
        }
        Commands::Posts { json } => {
            posts::run_posts(&cfg, json)?;
        }
        Commands::Convert { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

/// Command-line flags win over the config file.
#[allow(clippy::too_many_arguments)]
fn apply_overrides(
    covers: &mut CoversConfig,
    csv: Option<PathBuf>,
    since: Option<String>,
    out_dir: Option<PathBuf>,
    min_size: Option<u64>,
    limit: Option<usize>,
    format: Option<CoverFormat>,
    quality: Option<u32>,
    max_width: Option<u32>,
) {
    if let Some(v) = csv {
        covers.csv = v;
    }
    if let Some(v) = since {
        covers.since = v;
    }
    if let Some(v) = out_dir {
        covers.out_dir = v;
    }
    if let Some(v) = min_size {
        covers.min_size = v;
    }
    if limit.is_some() {
        covers.limit = limit;
    }
    if let Some(v) = format {
        covers.format = v;
    }
    if let Some(v) = quality {
        covers.quality = v;
    }
    if let Some(v) = max_width {
        covers.max_width = v;
    }
}
