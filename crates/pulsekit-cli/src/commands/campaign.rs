use chrono::Utc;
use clap::Subcommand;

use super::{open_context, CliResult};

#[derive(Subcommand)]
pub enum CampaignAction {
    /// Record the campaign start
    Start {
        /// Epoch milliseconds (defaults to now)
        #[arg(long)]
        at: Option<i64>,
    },
}

pub fn run(action: CampaignAction) -> CliResult {
    let ctx = open_context()?;

    match action {
        CampaignAction::Start { at } => {
            let at = at.unwrap_or_else(|| Utc::now().timestamp_millis());
            if at <= 0 {
                return Err("campaign start must be a positive epoch ms value".into());
            }
            ctx.set_campaign_start(at)?;
            println!("campaign start: {at}");
        }
    }
    Ok(())
}
