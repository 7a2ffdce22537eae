use tsn_network::network::TsnNetwork;
use tsn_network::network::queue::QueueType;
use tsn_network::simulation::Simulation;
use tsn_network::stats_tracker::{LatencySummary, NetworkStats};
use tsn_network::trace::simulation_verifier::VerifiedSimulation;

pub fn print_network_summary(simulation: &Simulation) {
    let network = simulation.network();
    println!("--- Network ---");
    println!(
        "* {} switches (controller included) and {} end stations",
        network.switches().len(),
        network.end_stations().len()
    );
    println!(
        "* Gate control list cycle: {} ticks",
        simulation.gcl().cycle_length()
    );

    for end_station in network.end_stations() {
        let (Some(rule), Some(destination)) =
            (end_station.traffic_rule(), end_station.destination())
        else {
            println!("* {} ({}): no traffic", end_station.id(), end_station.name());
            continue;
        };

        println!(
            "* {} ({}): {} traffic `{}` ({} bytes) to {destination}",
            end_station.id(),
            end_station.name(),
            rule.kind.class(),
            rule.name,
            rule.size_bytes
        );
    }
}

pub fn print_switch_stats(simulation: &Simulation) {
    let network = simulation.network();
    println!("--- Switch stats ---");
    for (switch_id, stats) in &simulation.stats().by_switch {
        let Some(switch) = network.switch(*switch_id) else {
            continue;
        };

        println!("* {switch_id} ({})", switch.name());
        println!("  | Packets transmitted: {}", stats.packets_transmitted);
        println!(
            "  | Average queue delay: {:.2} ticks",
            stats.average_queue_delay
        );

        let depths = switch.lane_depths();
        if depths.iter().any(|&depth| depth > 0) {
            println!("  | Packets left in lanes: {depths:?}");
        }
    }
}

pub fn print_latency_stats(stats: &NetworkStats) {
    println!("--- Latencies ---");
    match LatencySummary::of(&stats.latencies) {
        Some(summary) => print_latency_summary("all", &summary),
        None => {
            println!("* No packets delivered");
            return;
        }
    }

    for (class, latencies) in &stats.latencies_by_class {
        if let Some(summary) = LatencySummary::of(latencies) {
            print_latency_summary(&class.to_string(), &summary);
        }
    }

    if let Some(summary) = LatencySummary::of(&stats.queue_delays) {
        println!(
            "* Queue delay per hop: min {}, max {}, mean {:.2} ({} hops)",
            summary.min, summary.max, summary.mean, summary.count
        );
    }
}

fn print_latency_summary(label: &str, summary: &LatencySummary) {
    println!(
        "* {label}: {} packets, min {}, max {}, mean {:.2}",
        summary.count, summary.min, summary.max, summary.mean
    );
}

pub fn print_soft_deadline_misses(stats: &NetworkStats) {
    if stats.soft_deadline_misses.is_empty() {
        return;
    }

    println!("--- Soft deadline misses ---");
    for miss in &stats.soft_deadline_misses {
        println!(
            "* Tick {}: packet #{} ({} -> {}) took {} ticks (deadline {})",
            miss.tick, miss.packet, miss.origin, miss.destination, miss.latency, miss.deadline
        );
    }
}

pub fn print_dropped_packets(stats: &NetworkStats) {
    if stats.dropped.is_empty() {
        return;
    }

    println!("--- Dropped packets ---");
    for dropped in &stats.dropped {
        println!(
            "* Tick {}: packet #{} ({}) rejected by the {} lanes of {}",
            dropped.tick,
            dropped.packet,
            dropped.class,
            QueueType::Emergency,
            dropped.switch
        );
    }
}

pub fn print_bursts(stats: &NetworkStats) {
    if stats.bursts_by_end_station.is_empty() {
        return;
    }

    println!("--- Bursts ---");
    for (end_station, ticks) in &stats.bursts_by_end_station {
        println!("* {end_station}: {ticks} ticks with more than one packet waiting to be sent");
    }
}

pub fn print_node_stats(verified_simulation: &VerifiedSimulation, network: &TsnNetwork) {
    println!("--- Node stats ---");
    for (node_id, stats) in &verified_simulation.stats_by_node {
        if let Some(end_station) = network.end_station(*node_id) {
            println!("* {node_id} ({}, end station)", end_station.name());
            println!(
                "  * Generated packets: {} ({} bytes)",
                stats.generated.packets, stats.generated.bytes
            );
            println!(
                "  * Sent packets: {} ({} bytes)",
                stats.sent.packets, stats.sent.bytes
            );
            println!(
                "  * Delivered packets: {} ({} bytes)",
                stats.delivered.packets, stats.delivered.bytes
            );
            println!(
                "    | {} packets missed their deadline ({} bytes)",
                stats.deadline_misses.packets, stats.deadline_misses.bytes
            );
        } else if let Some(switch) = network.switch(*node_id) {
            println!("* {node_id} ({}, switch)", switch.name());
            println!(
                "  * Received packets: {} ({} bytes)",
                stats.received.packets, stats.received.bytes
            );
            println!(
                "  * Enqueued packets: {} ({} bytes)",
                stats.enqueued.packets, stats.enqueued.bytes
            );
            println!(
                "  * Sent packets: {} ({} bytes)",
                stats.sent.packets, stats.sent.bytes
            );
            println!(
                "    | {} packets dropped ({} bytes)",
                stats.dropped.packets, stats.dropped.bytes
            );
        }
    }
}
