use std::path::PathBuf;
use std::time::Duration;

use backup_core::RetentionConfig;
use chrono::Weekday;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod orchestrator;

#[derive(Parser)]
#[command(name = "mc-backup")]
#[command(
    about = "Quiesced world backups and tiered retention for wrapped Minecraft servers",
    long_about = None
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RetentionArgs {
    /// Days during which every backup is kept
    #[arg(long, default_value_t = 7)]
    daily: u32,

    /// Older weekly backups to keep beyond the daily window
    #[arg(long, default_value_t = 4)]
    weekly: u32,

    /// Weekday that qualifies an old backup for a weekly slot
    #[arg(long, default_value = "sunday", value_parser = parse_weekday)]
    anchor: Weekday,
}

impl From<RetentionArgs> for RetentionConfig {
    fn from(args: RetentionArgs) -> Self {
        Self {
            daily_count: args.daily,
            weekly_count: args.weekly,
            weekly_anchor: args.anchor,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Take a backup now, then cull old ones
    Run {
        /// Path to the control wrapper's settings.ini
        #[arg(short, long)]
        config: PathBuf,

        /// Path to the server directory (must contain server.properties)
        #[arg(short, long)]
        server: PathBuf,

        /// Seconds to let the server settle after each save command
        #[arg(long, default_value_t = 5)]
        settle_secs: u64,

        #[command(flatten)]
        retention: RetentionArgs,
    },
    /// Cull old backups without taking a new one
    Cull {
        /// Path to the server directory
        #[arg(short, long)]
        server: PathBuf,

        #[command(flatten)]
        retention: RetentionArgs,
    },
    /// Force persistence back on after an interrupted run
    Resume {
        /// Path to the control wrapper's settings.ini
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn parse_weekday(s: &str) -> Result<Weekday, String> {
    s.parse()
        .map_err(|_| format!("unrecognized weekday `{s}`"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Run {
            config,
            server,
            settle_secs,
            retention,
        } => {
            commands::run::exec(
                &config,
                &server,
                Duration::from_secs(settle_secs),
                retention.into(),
            )
            .await
        }
        Commands::Cull { server, retention } => commands::cull::exec(&server, retention.into()),
        Commands::Resume { config } => commands::resume::exec(&config).await,
    }
}
