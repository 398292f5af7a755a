pub mod campaign;
pub mod config;
pub mod log;
pub mod queue;
pub mod session;
pub mod sync;
pub mod tracking;

use pulsekit_core::SdkContext;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Context over the default data directory. The periodic sync loop is not
/// started; each invocation exits right after its command.
pub fn open_context() -> Result<SdkContext, Box<dyn std::error::Error>> {
    Ok(SdkContext::builder().start_sync(false).build()?)
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
