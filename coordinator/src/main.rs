//! Entrypoint for the `scheduled_events` binary.

use clap::Parser as _;
use eyre::Result;
use scheduled_events_coordinator::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    scheduled_events_coordinator::inner_main(Cli::parse()).await
}
