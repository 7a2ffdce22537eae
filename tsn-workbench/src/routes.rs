use crate::config::cli::CliOpt;
use crate::config::load_json;
use crate::config::network::NetworkSpecJson;
use fastrand::Rng;
use tsn_network::network::TsnNetwork;
use tsn_network::network::spec::{NetworkSpec, TrafficSpec};
use tracing::info;

pub fn print_routes(options: &CliOpt) -> anyhow::Result<()> {
    let network_spec: NetworkSpec =
        load_json::<NetworkSpecJson>(&options.network_graph, "network graph")?.into();

    // Without traffic the network draws no random numbers, so any seed will do
    let network = TsnNetwork::initialize(
        &network_spec,
        TrafficSpec::default(),
        &mut Rng::with_seed(options.rng_seed),
    )?;
    info!(
        "computed routing tables for {} switches",
        network.switches().len()
    );

    println!("--- Routing tables ---");
    for switch in network.switches() {
        println!("* {} ({})", switch.id(), switch.name());
        for route in switch.routing_table().routes() {
            if route.next_hop == switch.id() {
                println!("  | {} -> direct", route.end_station);
            } else {
                println!("  | {} -> via {}", route.end_station, route.next_hop);
            }
        }
    }

    Ok(())
}
