use crate::packet::{Packet, TrafficClass};
use crate::{NodeId, Tick};
use std::collections::BTreeMap;

/// Collects the metrics observed while the simulation runs
#[derive(Debug, Default)]
pub(crate) struct NetworkStatsTracker {
    stats: NetworkStats,
}

impl NetworkStatsTracker {
    pub(crate) fn new(switches: impl Iterator<Item = NodeId>) -> Self {
        Self {
            stats: NetworkStats {
                by_switch: switches.map(|id| (id, SwitchStats::default())).collect(),
                ..NetworkStats::default()
            },
        }
    }

    pub(crate) fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub(crate) fn track_generated(&mut self) {
        self.stats.generated += 1;
    }

    pub(crate) fn track_forwarded(&mut self, switch: NodeId, queue_delay: Tick) {
        self.stats.queue_delays.push(queue_delay);
        self.stats
            .by_switch
            .entry(switch)
            .or_default()
            .track_forwarded(queue_delay);
    }

    pub(crate) fn track_delivered(&mut self, packet: &Packet, latency: Tick) {
        self.stats.latencies.push(latency);
        self.stats
            .latencies_by_class
            .entry(packet.class())
            .or_default()
            .push(latency);
    }

    pub(crate) fn track_soft_deadline_miss(
        &mut self,
        tick: Tick,
        packet: &Packet,
        latency: Tick,
        deadline: Tick,
    ) {
        self.stats.soft_deadline_misses.push(DeadlineMiss {
            tick,
            packet: packet.number(),
            origin: packet.origin(),
            destination: packet.destination(),
            latency,
            deadline,
        });
    }

    pub(crate) fn track_dropped(&mut self, tick: Tick, switch: NodeId, packet: &Packet) {
        self.stats.dropped.push(DroppedPacket {
            tick,
            switch,
            packet: packet.number(),
            class: packet.class(),
        });
    }

    pub(crate) fn track_burst(&mut self, end_station: NodeId) {
        *self
            .stats
            .bursts_by_end_station
            .entry(end_station)
            .or_default() += 1;
    }
}

#[derive(Clone, Debug, Default)]
pub struct NetworkStats {
    /// Number of packets released by end stations
    pub generated: u64,
    /// End-to-end latency of every delivered packet, in delivery order
    pub latencies: Vec<Tick>,
    pub latencies_by_class: BTreeMap<TrafficClass, Vec<Tick>>,
    /// Ticks every forwarded packet spent at the switch that forwarded it
    pub queue_delays: Vec<Tick>,
    pub by_switch: BTreeMap<NodeId, SwitchStats>,
    pub soft_deadline_misses: Vec<DeadlineMiss>,
    /// Packets refused by the emergency admission policy
    pub dropped: Vec<DroppedPacket>,
    /// Ticks during which an end station had more than one packet waiting to be sent
    pub bursts_by_end_station: BTreeMap<NodeId, u64>,
}

#[derive(Clone, Debug, Default)]
pub struct SwitchStats {
    pub packets_transmitted: u64,
    /// Running average of the ticks packets spent at this switch
    pub average_queue_delay: f64,
}

impl SwitchStats {
    fn track_forwarded(&mut self, queue_delay: Tick) {
        self.packets_transmitted += 1;
        self.average_queue_delay +=
            (queue_delay as f64 - self.average_queue_delay) / self.packets_transmitted as f64;
    }
}

#[derive(Clone, Debug)]
pub struct DeadlineMiss {
    pub tick: Tick,
    pub packet: u64,
    pub origin: NodeId,
    pub destination: NodeId,
    pub latency: Tick,
    pub deadline: Tick,
}

#[derive(Clone, Debug)]
pub struct DroppedPacket {
    pub tick: Tick,
    pub switch: NodeId,
    pub packet: u64,
    pub class: TrafficClass,
}

/// Summary of a series of latencies
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LatencySummary {
    pub count: usize,
    pub min: Tick,
    pub max: Tick,
    pub mean: f64,
}

impl LatencySummary {
    pub fn of(latencies: &[Tick]) -> Option<Self> {
        let min = *latencies.iter().min()?;
        let max = *latencies.iter().max()?;
        let sum: Tick = latencies.iter().sum();
        Some(Self {
            count: latencies.len(),
            min,
            max,
            mean: sum as f64 / latencies.len() as f64,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_running_average_queue_delay() {
        let mut tracker = NetworkStatsTracker::new([NodeId(10)].into_iter());
        tracker.track_forwarded(NodeId(10), 0);
        tracker.track_forwarded(NodeId(10), 3);
        tracker.track_forwarded(NodeId(10), 3);

        let switch = &tracker.stats().by_switch[&NodeId(10)];
        assert_eq!(switch.packets_transmitted, 3);
        assert!((switch.average_queue_delay - 2.0).abs() < 1e-9);
        assert_eq!(tracker.stats().queue_delays, vec![0, 3, 3]);
    }

    #[test]
    fn test_latency_summary() {
        assert_eq!(LatencySummary::of(&[]), None);

        let summary = LatencySummary::of(&[3, 1, 2, 6]).unwrap();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.min, 1);
        assert_eq!(summary.max, 6);
        assert!((summary.mean - 3.0).abs() < 1e-9);
    }
}
