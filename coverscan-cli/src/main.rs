//! Coverscan CLI - identify records from sleeve photos.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use coverscan_core::CoverscanConfig;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "Exit codes:
  0   Success
  1   General error
  64  Invalid configuration
  65  No match found
  66  Cannot read input image or frames
  69  Discogs or image CDN unavailable
  74  Catalog snapshot I/O error";

#[derive(Parser)]
#[command(name = "coverscan")]
#[command(author, version, about = "Record sleeve recognition by perceptual hashing", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Catalog snapshot path (overrides COVERSCAN_CATALOG_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    catalog: Option<PathBuf>,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the catalog from the Discogs collection
    Build {
        /// Download artwork and compute fingerprints
        #[arg(long)]
        hash: bool,

        /// Also fingerprint thumbnails of entries whose cover succeeded
        #[arg(long, requires = "hash")]
        hash_thumbnails: bool,

        /// Read release records from a JSON file instead of Discogs
        #[arg(long, value_name = "FILE")]
        records: Option<PathBuf>,
    },

    /// Find releases by artist and/or album name
    Search {
        #[arg(long)]
        artist: Option<String>,

        #[arg(long)]
        album: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show catalog statistics
    Stats {
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Match a square sleeve photo against the catalog
    Match {
        /// Image file (JPEG, PNG, GIF or WebP)
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Maximum Hamming distance for a match
        #[arg(long, value_name = "BITS")]
        threshold: Option<u32>,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run continuous recognition over a directory of captured frames
    Watch {
        /// Directory of frame images, served in file name order
        #[arg(value_name = "FRAMES_DIR")]
        frames: PathBuf,

        /// Milliseconds between samples
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,

        /// Milliseconds before giving up on a fingerprint match
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_filter = match (quiet, verbose) {
        (true, _) => "coverscan_core=error,coverscan=error",
        (false, 0) => "coverscan_core=info,coverscan=info",
        (false, 1) => "coverscan_core=debug,coverscan=debug",
        (false, _) => "coverscan_core=trace,coverscan=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(catalog: Option<PathBuf>) -> Result<CoverscanConfig> {
    let mut config = CoverscanConfig::from_env();
    if let Some(path) = catalog {
        config.catalog_path = path;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.catalog)?;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Build {
            hash,
            hash_thumbnails,
            records,
        } => commands::build::execute(&config, hash, hash_thumbnails, records, quiet).await,
        Commands::Search {
            artist,
            album,
            json,
        } => commands::search::execute(&config, artist, album, json, quiet),
        Commands::Stats { json } => commands::stats::execute(&config, json, quiet),
        Commands::Match {
            image,
            threshold,
            json,
        } => {
            if let Some(threshold) = threshold {
                config.policy.match_threshold = threshold;
            }
            commands::match_image::execute(&config, image, json, quiet)
        }
        Commands::Watch {
            frames,
            interval_ms,
            timeout_ms,
        } => {
            if let Some(ms) = interval_ms {
                config.sample_interval = Duration::from_millis(ms);
            }
            if let Some(ms) = timeout_ms {
                config.escalation_timeout = Duration::from_millis(ms);
            }
            config.validate().context("Invalid configuration")?;
            commands::watch::execute(&config, frames, quiet).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
