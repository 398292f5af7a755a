use clap::Args;

use super::{open_context, print_json, CliResult};

#[derive(Args)]
pub struct LogArgs {
    /// Event name, stored as `data.name`
    pub name: String,
    /// Extra payload as a JSON object
    #[arg(long)]
    pub data: Option<String>,
}

pub fn run(args: LogArgs) -> CliResult {
    let data = match args.data.as_deref() {
        Some(raw) => match serde_json::from_str::<serde_json::Value>(raw)? {
            serde_json::Value::Object(map) => map,
            _ => return Err("--data must be a JSON object".into()),
        },
        None => serde_json::Map::new(),
    };

    let ctx = open_context()?;
    let event = ctx.log_custom_event(&args.name, data);
    print_json(&event)
}
