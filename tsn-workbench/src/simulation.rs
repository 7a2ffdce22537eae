use crate::config::cli::{CliOpt, SimulateOpt};
use crate::config::gcl::GateControlListJson;
use crate::config::load_json;
use crate::config::network::NetworkSpecJson;
use crate::config::traffic::TrafficSpecJson;
use crate::util::{
    print_bursts, print_dropped_packets, print_latency_stats, print_network_summary,
    print_node_stats, print_soft_deadline_misses, print_switch_stats,
};
use anyhow::Context;
use fastrand::Rng;
use std::fs;
use tracing::{error, info};
use tsn_network::network::gcl::GateControlListSpec;
use tsn_network::network::spec::{NetworkSpec, TrafficSpec};
use tsn_network::simulation::{Simulation, SimulationConfig};

pub fn run_and_report_stats(options: &CliOpt, simulate_options: &SimulateOpt) -> anyhow::Result<()> {
    println!("--- Params ---");
    let rng_seed = if options.non_deterministic {
        Rng::new().u64(..)
    } else {
        options.rng_seed
    };
    println!("* Network seed: {rng_seed}");
    println!("* Network graph path: {}", options.network_graph.display());
    println!("* GCL path: {}", simulate_options.gcl.display());
    println!("* Traffic path: {}", simulate_options.traffic.display());
    println!("* Ticks: {}", simulate_options.ticks);
    println!("* Byte budget per tick: {}", simulate_options.byte_budget);
    println!(
        "* Emergency probability: {}",
        simulate_options.emergency_probability
    );

    let network_spec: NetworkSpec =
        load_json::<NetworkSpecJson>(&options.network_graph, "network graph")?.into();
    let gcl: GateControlListSpec =
        load_json::<GateControlListJson>(&simulate_options.gcl, "gate control list")?.into();
    let traffic: TrafficSpec =
        load_json::<TrafficSpecJson>(&simulate_options.traffic, "traffic definition")?.into();

    let config = SimulationConfig {
        ticks: simulate_options.ticks,
        byte_budget: simulate_options.byte_budget,
        emergency_probability: simulate_options.emergency_probability,
        rng_seed,
    };
    let mut simulation = Simulation::new(network_spec, traffic, gcl, config)
        .context("invalid simulation configuration")?;
    info!(
        "loaded network with {} switches and {} end stations (seed {rng_seed})",
        simulation.network().switches().len(),
        simulation.network().end_stations().len()
    );

    print_network_summary(&simulation);

    // The report covers everything up to a fatal error, which is returned afterwards
    let result = simulation.run();

    if let Some(replay_log_path) = &simulate_options.replay_log {
        println!("--- Replay log ---");
        let json_steps = serde_json::to_vec_pretty(&simulation.tracer().steps())
            .context("failed to serialize replay log")?;
        fs::write(replay_log_path, json_steps).context("failed to store replay log")?;
        info!(
            "stored {} replay log steps at {}",
            simulation.tracer().steps().len(),
            replay_log_path.display()
        );
        println!(
            "* Replay log available at {}",
            replay_log_path.display()
        );
    }

    println!("--- Run ---");
    let ticks_run = match simulation.halted_by() {
        Some(_) => simulation.clock() + 1,
        None => simulation.clock(),
    };
    info!(
        "simulation ran {ticks_run} ticks: {} packets generated, {} delivered",
        simulation.stats().generated,
        simulation.stats().latencies.len()
    );
    println!("* Ticks run: {ticks_run}");
    println!("* Packets generated: {}", simulation.stats().generated);
    println!(
        "* Packets delivered: {}",
        simulation.stats().latencies.len()
    );
    println!(
        "* Packets still in flight: {}",
        simulation.network().packets_in_flight()
    );

    print_switch_stats(&simulation);
    print_latency_stats(simulation.stats());
    print_soft_deadline_misses(simulation.stats());
    print_dropped_packets(simulation.stats());
    print_bursts(simulation.stats());

    let verified_simulation = simulation
        .verifier()
        .verify()
        .context("failed to verify simulation")?;
    print_node_stats(&verified_simulation, simulation.network());

    if let Err(e) = &result {
        error!("simulation halted at tick {}: {e}", simulation.clock());
        println!("--- Fatal error ---");
        println!("* {e}");
    }

    result.context("simulation halted")
}
