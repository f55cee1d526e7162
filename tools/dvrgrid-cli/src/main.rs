//! DvrGrid CLI: video walls across multiple DVRs.
//!
//! Usage:
//!   dvrgrid live                        Live wall of every channel
//!   dvrgrid timestamp <TIME>            Recorded wall starting at TIME
//!   dvrgrid highlights <DATE>           Recorded walls at fixed times of DATE
//!   dvrgrid list                        Probe which channels deliver frames
//!   dvrgrid channels [--at TIME]        Print the expanded channel table
//!   dvrgrid camera <NAME> [--at TIME]   View one channel

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dvrgrid_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "dvrgrid",
    about = "Tile live or recorded streams from several DVRs into one video wall",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// DVR list (JSON with a top-level `dvrs` array)
    #[arg(short, long, global = true, default_value = "dvr_config.json")]
    config: PathBuf,

    #[command(flatten)]
    viewer: ViewerArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Per-invocation overrides of the viewer settings.
#[derive(Args, Debug, Clone, Default)]
pub struct ViewerArgs {
    /// Cell width in pixels
    #[arg(long, global = true)]
    pub cell_width: Option<u32>,

    /// Cell height in pixels
    #[arg(long, global = true)]
    pub cell_height: Option<u32>,

    /// Maximum number of channels on the wall
    #[arg(long, global = true)]
    pub max_tiles: Option<usize>,

    /// Maximum channels derived per DVR
    #[arg(long, global = true)]
    pub max_channels: Option<usize>,

    /// Use main streams instead of substreams
    #[arg(long, global = true)]
    pub main_stream: bool,

    /// Compositor rate in Hz
    #[arg(long, global = true)]
    pub tick_hz: Option<u32>,

    /// Write the wall to this PNG (once per second) instead of opening a window
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,

    /// Run without any output (useful for soak tests)
    #[arg(long, global = true)]
    pub headless: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Live wall of every configured channel
    Live,

    /// Recorded wall of every channel, starting at a point in time
    Timestamp {
        /// Start time, ISO-8601 (e.g. 2025-01-11T10:15:00Z)
        timestamp: String,

        /// Length of the recorded window
        #[arg(long)]
        duration_minutes: Option<u32>,
    },

    /// Recorded walls at 08:00, 12:00, 16:00 and 20:00 (UTC) of one day
    Highlights {
        /// Day to sample, YYYY-MM-DD (e.g. 2025-01-11)
        date: String,

        /// Play only this highlight (1-4) instead of all in turn
        #[arg(long)]
        slot: Option<usize>,

        /// Length of each recorded window
        #[arg(long)]
        duration_minutes: Option<u32>,
    },

    /// Probe every channel and list those that deliver frames
    List,

    /// Print every expanded channel with its (redacted) address
    Channels {
        /// Also print playback addresses for a window starting here
        #[arg(long)]
        at: Option<String>,

        /// Length of the playback window
        #[arg(long)]
        duration_minutes: Option<u32>,
    },

    /// View a single channel by name (e.g. Hikvision1-CH2)
    Camera {
        /// Channel name, case-insensitive
        name: String,

        /// Play back from this time instead of viewing live
        #[arg(long)]
        at: Option<String>,

        /// Length of the playback window
        #[arg(long)]
        duration_minutes: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = AppConfig::try_load();
    let app = match &loaded {
        Ok(Some(app)) => app.clone(),
        _ => AppConfig::default(),
    };
    let mut logging = app.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    dvrgrid_common::logging::init_logging(&logging);
    if let Err(e) = loaded {
        tracing::warn!(error = %e, "Ignoring application config; using defaults");
    }

    let ctx = commands::Context::load(&cli.config, app.viewer, &cli.viewer)?;

    match cli.command {
        Commands::Live => commands::live::run(&ctx).await,
        Commands::Timestamp {
            timestamp,
            duration_minutes,
        } => commands::timestamp::run(&ctx, &timestamp, duration_minutes).await,
        Commands::Highlights {
            date,
            slot,
            duration_minutes,
        } => commands::highlights::run(&ctx, &date, slot, duration_minutes).await,
        Commands::List => commands::list::run(&ctx),
        Commands::Channels {
            at,
            duration_minutes,
        } => commands::channels::run(&ctx, at.as_deref(), duration_minutes),
        Commands::Camera {
            name,
            at,
            duration_minutes,
        } => commands::camera::run(&ctx, &name, at.as_deref(), duration_minutes).await,
    }
}
