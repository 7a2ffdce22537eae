use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct CliOpt {
    /// Path to the JSON file containing the network graph (nodes and their queue definitions)
    #[arg(long)]
    pub network_graph: PathBuf,

    /// Whether the run should be non-deterministic, i.e. using a non-constant seed for the random
    /// number generator
    #[arg(long)]
    pub non_deterministic: bool,

    /// The random seed used for the simulated network (governing sporadic releases, random
    /// destinations, emergency redirects and the order in which simultaneous arrivals are handled)
    #[arg(long, default_value_t = 42)]
    pub rng_seed: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Resolve and print the routing table of every switch
    Routes,
    /// Run the simulation and report its statistics
    Simulate(SimulateOpt),
}

#[derive(Parser, Debug, Clone)]
pub struct SimulateOpt {
    /// Path to the JSON file containing the gate control list
    #[arg(long)]
    pub gcl: PathBuf,

    /// Path to the JSON file containing the traffic rules and their mapping to end stations
    #[arg(long)]
    pub traffic: PathBuf,

    /// The amount of ticks to simulate
    #[arg(long, default_value_t = 100)]
    pub ticks: u64,

    /// The amount of bytes a link transfers per tick (larger packets are fragmented)
    #[arg(long, default_value_t = 16)]
    pub byte_budget: u32,

    /// The chance that a switch redirects an incoming ST packet to its emergency lanes (the value
    /// must be between 0 and 1)
    #[arg(long, default_value_t = 0.0)]
    pub emergency_probability: f64,

    /// Path where the replay log (every recorded simulation step) should be stored
    #[arg(long)]
    pub replay_log: Option<PathBuf>,
}
