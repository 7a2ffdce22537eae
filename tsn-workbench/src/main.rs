use crate::config::cli::{CliOpt, Command};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod config;
mod routes;
mod simulation;
mod util;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr, so stdout only carries the report
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let options = CliOpt::parse();
    match &options.command {
        Command::Routes => routes::print_routes(&options),
        Command::Simulate(simulate_options) => {
            simulation::run_and_report_stats(&options, simulate_options)
        }
    }
}
