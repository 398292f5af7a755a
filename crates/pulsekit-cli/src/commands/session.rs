use clap::Subcommand;
use serde_json::json;

use super::{open_context, print_json, CliResult};
use pulsekit_core::SessionState;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start a session (app foregrounded)
    Start,
    /// Pause the session (app backgrounded)
    Pause,
    /// End the session for good
    End,
    /// Print session state as JSON
    Status,
    /// Emit a heartbeat for the active session
    Heartbeat,
}

pub fn run(action: SessionAction) -> CliResult {
    let mut ctx = open_context()?;

    match action {
        SessionAction::Start => match ctx.lifecycle().on_foreground() {
            Some(event) => print_json(&event)?,
            None => eprintln!("session not started (already active or tracking disabled)"),
        },
        SessionAction::Pause => {
            let emitted = ctx.lifecycle().on_background();
            if emitted.is_empty() {
                eprintln!("no active session");
            }
            print_json(&emitted)?;
        }
        SessionAction::End => {
            let emitted = ctx.shutdown();
            print_json(&emitted)?;
            return Ok(());
        }
        SessionAction::Status => {
            let pending = ctx.queue().len();
            let tracking = ctx.prefs().tracking_enabled()?;
            let tracker = ctx.lifecycle().tracker();
            let state = match tracker.state() {
                SessionState::Active => "active",
                SessionState::Inactive => "inactive",
            };
            print_json(&json!({
                "state": state,
                "session_start_ms": tracker.session_start_ms(),
                "current_session_seconds": tracker.current_session_duration(),
                "daily_seconds": tracker.daily_accumulated_seconds(),
                "tracking_enabled": tracking,
                "pending_events": pending,
            }))?;
        }
        SessionAction::Heartbeat => {
            let emitted = ctx.lifecycle().tracker_mut().emit_heartbeat();
            if emitted.is_empty() {
                eprintln!("no active session");
            }
            print_json(&emitted)?;
        }
    }
    Ok(())
}
