use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "pulsekit-cli", version, about = "Pulsekit CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Session lifecycle
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Inspect or clear the event queue
    Queue {
        #[command(subcommand)]
        action: commands::queue::QueueAction,
    },
    /// Log a custom event
    Log(commands::log::LogArgs),
    /// Deliver queued events
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Campaign settings
    Campaign {
        #[command(subcommand)]
        action: commands::campaign::CampaignAction,
    },
    /// Turn session tracking on or off
    Tracking {
        #[command(subcommand)]
        action: commands::tracking::TrackingAction,
    },
}

/// Log to stderr, filtered by `PULSEKIT_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_env("PULSEKIT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action),
        Commands::Queue { action } => commands::queue::run(action),
        Commands::Log(args) => commands::log::run(args),
        Commands::Sync { action } => commands::sync::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Campaign { action } => commands::campaign::run(action),
        Commands::Tracking { action } => commands::tracking::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
