//! Sync subcommand for delivering the event queue.

use clap::Subcommand;

use super::{open_context, print_json, CliResult};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Run one sync pass now
    Now,
    /// Show sync status
    Status,
}

pub fn run(action: SyncAction) -> CliResult {
    let ctx = open_context()?;

    match action {
        SyncAction::Now => {
            let outcome = ctx.runtime().block_on(ctx.sync().sync_now());
            print_json(&outcome)?;
        }
        SyncAction::Status => {
            print_json(&ctx.sync().status())?;
        }
    }
    Ok(())
}
