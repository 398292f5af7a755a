use chrono::{TimeZone, Utc};
use clap::Subcommand;

use super::{open_context, print_json, CliResult};

#[derive(Subcommand)]
pub enum QueueAction {
    /// List queued events, oldest first
    List {
        /// Maximum number of events to show
        #[arg(long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the number of queued events
    Count,
    /// Drop every queued event
    Clear,
}

pub fn run(action: QueueAction) -> CliResult {
    let ctx = open_context()?;

    match action {
        QueueAction::List { limit, json } => {
            let events = ctx.queue().pending_events(limit);
            if json {
                print_json(&events)?;
            } else if events.is_empty() {
                println!("queue is empty");
            } else {
                for event in &events {
                    let at = Utc
                        .timestamp_millis_opt(event.timestamp)
                        .single()
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| event.timestamp.to_string());
                    println!("{at}  {:<16} {}", event.event_type.as_str(), event.id);
                }
            }
        }
        QueueAction::Count => println!("{}", ctx.queue().len()),
        QueueAction::Clear => {
            let dropped = ctx.queue().len();
            ctx.queue().clear();
            println!("cleared {dropped} events");
        }
    }
    Ok(())
}
