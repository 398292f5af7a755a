use clap::Subcommand;

use super::{open_context, CliResult};

#[derive(Subcommand)]
pub enum TrackingAction {
    /// Resume session tracking
    On,
    /// Stop tracking new sessions
    Off,
    /// Print whether tracking is enabled
    Status,
}

pub fn run(action: TrackingAction) -> CliResult {
    let ctx = open_context()?;

    match action {
        TrackingAction::On => {
            ctx.set_tracking_enabled(true)?;
            println!("tracking enabled");
        }
        TrackingAction::Off => {
            ctx.set_tracking_enabled(false)?;
            println!("tracking disabled");
        }
        TrackingAction::Status => {
            let enabled = ctx.prefs().tracking_enabled()?;
            println!("{}", if enabled { "enabled" } else { "disabled" });
        }
    }
    Ok(())
}
