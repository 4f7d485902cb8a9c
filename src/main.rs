//! # feedmirror CLI
//!
//! The `feedmirror` binary mirrors a Piped subscription feed into
//! time-bucketed playlists on the same instance.
//!
//! ## Usage
//!
//! ```bash
//! feedmirror --config ./feedmirror.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `feedmirror init` | Create the SQLite database and run schema migrations |
//! | `feedmirror sync` | Run one synchronization pass |
//! | `feedmirror channels` | List tracked channels and their watermarks |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! feedmirror init --config ./feedmirror.toml
//!
//! # Synchronize, with debug diagnostics in the log file
//! feedmirror sync --debug --config ./feedmirror.toml
//!
//! # See what a run would discover, without writing anything
//! feedmirror sync --dry-run
//!
//! # Rescan the whole configured window (the ledger still dedups)
//! feedmirror sync --full
//! ```

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use feedmirror::api::PipedClient;
use feedmirror::config;
use feedmirror::db;
use feedmirror::lock::LockFile;
use feedmirror::logging;
use feedmirror::migrate;
use feedmirror::progress::ProgressMode;
use feedmirror::repo;
use feedmirror::sync::{self, SyncOptions};

const LOCK_FILE: &str = "feedmirror.lock";

/// feedmirror — mirror a Piped subscription feed into time-bucketed
/// playlists.
#[derive(Parser)]
#[command(
    name = "feedmirror",
    about = "Mirror a Piped subscription feed into time-bucketed playlists",
    version,
    long_about = "feedmirror discovers new videos across all subscribed channels of a Piped \
    account, files each one under a monthly or weekly playlist derived from its upload date, \
    and rebuilds the affected playlists so their membership exactly matches the local ledger."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./feedmirror.toml")]
    config: PathBuf,

    /// Path to the diagnostic log file (JSON lines, appended).
    #[arg(long, global = true, default_value = "./feedmirror.log")]
    log: PathBuf,

    /// Log debug details instead of warnings only.
    #[arg(long, global = true)]
    debug: bool,

    /// Hide progress output.
    #[arg(long, global = true)]
    silent: bool,

    /// Progress style: auto, off, human, or json.
    #[arg(long, global = true, default_value = "auto")]
    progress: String,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and both tables (channels, videos).
    /// This command is idempotent — running it multiple times is safe, and
    /// `sync` runs the same migrations itself.
    Init,

    /// Run one synchronization pass.
    ///
    /// Fetches the account's subscriptions, discovers new videos inside the
    /// configured window, indexes them into the local ledger, and rebuilds
    /// every playlist touched by a new video.
    Sync {
        /// Ignore per-channel watermarks — rescan the whole configured
        /// window. The ledger still deduplicates, so this can only
        /// re-discover, never duplicate.
        #[arg(long)]
        full: bool,

        /// Discover and report without writing to the database or the
        /// instance.
        #[arg(long)]
        dry_run: bool,
    },

    /// List tracked channels and their watermarks.
    Channels,
}

fn progress_mode(cli: &Cli) -> Result<ProgressMode> {
    if cli.silent {
        return Ok(ProgressMode::Off);
    }
    match cli.progress.as_str() {
        "auto" => Ok(ProgressMode::default_for_tty()),
        "off" => Ok(ProgressMode::Off),
        "human" => Ok(ProgressMode::Human),
        "json" => Ok(ProgressMode::Json),
        other => anyhow::bail!("Unknown progress mode: '{other}'. Must be auto, off, human, or json."),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log, cli.debug)?;
    let cfg = config::load_config(&cli.config).context("unable to get the configuration")?;
    let progress = progress_mode(&cli)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Channels => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            let channels = repo::list_channels(&pool).await?;
            println!("{:<28} LAST UPLOAD", "CHANNEL");
            for channel in &channels {
                let last = if channel.last_upload == 0 {
                    "-".to_string()
                } else {
                    DateTime::from_timestamp(channel.last_upload, 0)
                        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".to_string())
                };
                println!("{:<28} {}", channel.id, last);
            }
            pool.close().await;
        }
        Commands::Sync { full, dry_run } => {
            let _lock = LockFile::acquire(LOCK_FILE).context("unable to create the lock file")?;

            let pool = db::connect(&cfg)
                .await
                .context("unable to use a local database")?;
            migrate::run_migrations(&pool).await?;

            let api = PipedClient::login(
                &cfg.instance.base_url,
                &cfg.instance.username,
                &cfg.instance.password,
            )
            .await
            .context("unable to authenticate on the instance")?;

            let progress = progress.reporter();
            let summary = sync::run_sync(
                &cfg,
                &pool,
                Arc::new(api),
                progress.as_ref(),
                SyncOptions { full, dry_run },
            )
            .await
            .context("failed to synchronize")?;

            if dry_run {
                println!("sync (dry-run)");
                println!("  subscriptions: {}", summary.subscriptions);
                println!("  new videos: {}", summary.new_videos);
            } else {
                println!("sync");
                println!("  subscriptions: {}", summary.subscriptions);
                println!("  new videos: {}", summary.new_videos);
                println!("  videos indexed: {}", summary.indexed);
                println!("  playlists updated: {}", summary.playlists_pushed);
                if summary.removed_marked > 0 {
                    println!("  marked as removed: {}", summary.removed_marked);
                }
            }
            println!("ok");

            pool.close().await;
        }
    }

    Ok(())
}
