use crate::network::spec::NodeKind;
use crate::trace::simulation_step::{SimulationStep, SimulationStepKind};
use crate::trace::stats::NodeStats;
use crate::{NodeId, Tick};
use std::collections::{BTreeMap, HashMap};
use std::mem;
use thiserror::Error;

pub struct VerifiedSimulation {
    pub stats_by_node: BTreeMap<NodeId, NodeStats>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InvalidSimulation {
    #[error("network node `{node_id}` was referenced but does not exist")]
    MissingNode { node_id: NodeId },
    #[error("packet #{packet_number} was referenced before it was generated")]
    UnknownPacket { packet_number: u64 },
    #[error("packet #{packet_number} was generated more than once")]
    PacketGeneratedTwice { packet_number: u64 },
    #[error("switch `{node_id}` created a packet out of thin air (packet #{packet_number})")]
    PacketCreatedBySwitch { node_id: NodeId, packet_number: u64 },
    #[error("network node `{node_id}` handled packet #{packet_number}, but the packet was at `{holder}`")]
    PacketNotHeld {
        node_id: NodeId,
        packet_number: u64,
        holder: NodeId,
    },
    #[error("end station `{node_id}` enqueued packet #{packet_number}, but only switches have lanes")]
    PacketEnqueuedAtEndStation { node_id: NodeId, packet_number: u64 },
    #[error("switch `{node_id}` forwarded packet #{packet_number} without enqueuing it first")]
    PacketForwardedWithoutQueue { node_id: NodeId, packet_number: u64 },
    #[error("network node `{node_id}` sent more than one packet at tick {tick}")]
    MultipleSendsInOneTick { node_id: NodeId, tick: Tick },
    #[error("packet #{packet_number} for `{destination}` was delivered to `{node_id}`")]
    PacketDeliveredToWrongNode {
        node_id: NodeId,
        packet_number: u64,
        destination: NodeId,
    },
    #[error("packet #{packet_number} was delivered more than once")]
    PacketAlreadyDelivered { packet_number: u64 },
    #[error("packet #{packet_number} missed its deadline before being delivered")]
    DeadlineMissedBeforeDelivery { packet_number: u64 },
}

struct ReplayedPacket {
    size_bytes: u32,
    destination: NodeId,
    holder: NodeId,
    queued: bool,
    delivered: bool,
}

/// Replays the steps of a simulation, checking that packets only move in ways the network allows
pub struct SimulationVerifier {
    steps: Vec<SimulationStep>,
    node_kinds: BTreeMap<NodeId, NodeKind>,
    packets: HashMap<u64, ReplayedPacket>,
    last_send: HashMap<NodeId, Tick>,
    stats_by_node: BTreeMap<NodeId, NodeStats>,
}

impl SimulationVerifier {
    pub fn new(mut steps: Vec<SimulationStep>, node_kinds: BTreeMap<NodeId, NodeKind>) -> Self {
        if !steps.is_sorted_by_key(|s| s.tick) {
            steps.sort_by_key(|s| s.tick);
        }

        Self {
            steps,
            stats_by_node: node_kinds
                .keys()
                .map(|&id| (id, NodeStats::default()))
                .collect(),
            node_kinds,
            packets: HashMap::new(),
            last_send: HashMap::new(),
        }
    }

    pub fn verify(mut self) -> Result<VerifiedSimulation, InvalidSimulation> {
        let steps = mem::take(&mut self.steps);
        for step in steps {
            match &step.kind {
                SimulationStepKind::PacketGenerated(s) => {
                    if self.kind(s.node_id)? != NodeKind::EndStation {
                        return Err(InvalidSimulation::PacketCreatedBySwitch {
                            node_id: s.node_id,
                            packet_number: s.packet_number,
                        });
                    }

                    let previous = self.packets.insert(
                        s.packet_number,
                        ReplayedPacket {
                            size_bytes: s.packet_size_bytes,
                            destination: s.destination,
                            holder: s.node_id,
                            queued: false,
                            delivered: false,
                        },
                    );
                    if previous.is_some() {
                        return Err(InvalidSimulation::PacketGeneratedTwice {
                            packet_number: s.packet_number,
                        });
                    }

                    self.node_stats(s.node_id)?
                        .generated
                        .track_one(s.packet_size_bytes);
                }
                SimulationStepKind::PacketSent(s) => {
                    let sender_kind = self.kind(s.node_id)?;
                    self.kind(s.next_hop)?;

                    if self.last_send.insert(s.node_id, step.tick) == Some(step.tick) {
                        return Err(InvalidSimulation::MultipleSendsInOneTick {
                            node_id: s.node_id,
                            tick: step.tick,
                        });
                    }

                    let packet = self.held_packet(s.packet_number, s.node_id)?;
                    if sender_kind.is_switch() && !packet.queued {
                        return Err(InvalidSimulation::PacketForwardedWithoutQueue {
                            node_id: s.node_id,
                            packet_number: s.packet_number,
                        });
                    }

                    packet.holder = s.next_hop;
                    packet.queued = false;
                    let size_bytes = packet.size_bytes;

                    self.node_stats(s.node_id)?.sent.track_one(size_bytes);
                    self.node_stats(s.next_hop)?.received.track_one(size_bytes);
                }
                SimulationStepKind::PacketEnqueued(s) => {
                    if !self.kind(s.node_id)?.is_switch() {
                        return Err(InvalidSimulation::PacketEnqueuedAtEndStation {
                            node_id: s.node_id,
                            packet_number: s.packet_number,
                        });
                    }

                    let packet = self.held_packet(s.packet_number, s.node_id)?;
                    packet.queued = true;
                    let size_bytes = packet.size_bytes;

                    self.node_stats(s.node_id)?.enqueued.track_one(size_bytes);
                }
                SimulationStepKind::PacketDropped(s) => {
                    let size_bytes = self.held_packet(s.packet_number, s.node_id)?.size_bytes;
                    self.packets.remove(&s.packet_number);

                    self.node_stats(s.node_id)?.dropped.track_one(size_bytes);
                }
                SimulationStepKind::PacketDelivered(s) => {
                    let packet = self.held_packet(s.packet_number, s.node_id)?;
                    if packet.destination != s.node_id {
                        return Err(InvalidSimulation::PacketDeliveredToWrongNode {
                            node_id: s.node_id,
                            packet_number: s.packet_number,
                            destination: packet.destination,
                        });
                    }

                    if packet.delivered {
                        return Err(InvalidSimulation::PacketAlreadyDelivered {
                            packet_number: s.packet_number,
                        });
                    }

                    packet.delivered = true;
                    let size_bytes = packet.size_bytes;

                    self.node_stats(s.node_id)?.delivered.track_one(size_bytes);
                }
                SimulationStepKind::DeadlineMissed(s) => {
                    let packet = self.held_packet(s.packet_number, s.node_id)?;
                    if !packet.delivered {
                        return Err(InvalidSimulation::DeadlineMissedBeforeDelivery {
                            packet_number: s.packet_number,
                        });
                    }

                    let size_bytes = packet.size_bytes;
                    self.node_stats(s.node_id)?
                        .deadline_misses
                        .track_one(size_bytes);
                }
            }
        }

        Ok(VerifiedSimulation {
            stats_by_node: self.stats_by_node,
        })
    }

    fn kind(&self, node_id: NodeId) -> Result<NodeKind, InvalidSimulation> {
        self.node_kinds
            .get(&node_id)
            .copied()
            .ok_or(InvalidSimulation::MissingNode { node_id })
    }

    fn node_stats(&mut self, node_id: NodeId) -> Result<&mut NodeStats, InvalidSimulation> {
        self.stats_by_node
            .get_mut(&node_id)
            .ok_or(InvalidSimulation::MissingNode { node_id })
    }

    /// The replayed packet, provided it is currently at `node_id`
    fn held_packet(
        &mut self,
        packet_number: u64,
        node_id: NodeId,
    ) -> Result<&mut ReplayedPacket, InvalidSimulation> {
        let packet = self
            .packets
            .get_mut(&packet_number)
            .ok_or(InvalidSimulation::UnknownPacket { packet_number })?;

        if packet.holder != node_id {
            return Err(InvalidSimulation::PacketNotHeld {
                node_id,
                packet_number,
                holder: packet.holder,
            });
        }

        Ok(packet)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::packet::TrafficClass;
    use crate::trace::simulation_step::{
        GenericPacketEvent, PacketDelivered, PacketEnqueued, PacketGenerated, PacketSent,
    };
    use crate::network::queue::QueueType;

    fn kinds() -> BTreeMap<NodeId, NodeKind> {
        BTreeMap::from([
            (NodeId(0), NodeKind::Controller),
            (NodeId(10), NodeKind::Switch),
            (NodeId(1), NodeKind::EndStation),
            (NodeId(2), NodeKind::EndStation),
        ])
    }

    fn generated(number: u64, node: u32) -> SimulationStep {
        SimulationStep {
            tick: 0,
            kind: SimulationStepKind::PacketGenerated(PacketGenerated {
                packet_number: number,
                packet_name: "test".into(),
                packet_size_bytes: 16,
                class: TrafficClass::St,
                node_id: NodeId(node),
                destination: NodeId(2),
            }),
        }
    }

    fn sent(tick: Tick, number: u64, from: u32, to: u32) -> SimulationStep {
        SimulationStep {
            tick,
            kind: SimulationStepKind::PacketSent(PacketSent {
                packet_number: number,
                node_id: NodeId(from),
                next_hop: NodeId(to),
            }),
        }
    }

    fn enqueued(tick: Tick, number: u64, node: u32) -> SimulationStep {
        SimulationStep {
            tick,
            kind: SimulationStepKind::PacketEnqueued(PacketEnqueued {
                packet_number: number,
                node_id: NodeId(node),
                queue_type: QueueType::St,
                lane: 0,
            }),
        }
    }

    fn delivered(tick: Tick, number: u64, node: u32) -> SimulationStep {
        SimulationStep {
            tick,
            kind: SimulationStepKind::PacketDelivered(PacketDelivered {
                packet_number: number,
                node_id: NodeId(node),
                latency: tick,
            }),
        }
    }

    #[test]
    fn test_valid_trace() {
        let steps = vec![
            generated(0, 1),
            sent(0, 0, 1, 10),
            enqueued(1, 0, 10),
            sent(1, 0, 10, 2),
            delivered(1, 0, 2),
        ];

        let verified = SimulationVerifier::new(steps, kinds()).verify().unwrap();
        assert_eq!(verified.stats_by_node[&NodeId(1)].sent.packets, 1);
        assert_eq!(verified.stats_by_node[&NodeId(10)].enqueued.bytes, 16);
        assert_eq!(verified.stats_by_node[&NodeId(2)].delivered.packets, 1);
    }

    #[test]
    fn test_switch_cannot_create_packets() {
        let result = SimulationVerifier::new(vec![generated(0, 10)], kinds()).verify();
        assert_eq!(
            result.err(),
            Some(InvalidSimulation::PacketCreatedBySwitch {
                node_id: NodeId(10),
                packet_number: 0
            })
        );
    }

    #[test]
    fn test_switch_must_enqueue_before_forwarding() {
        let steps = vec![generated(0, 1), sent(0, 0, 1, 10), sent(1, 0, 10, 2)];
        let result = SimulationVerifier::new(steps, kinds()).verify();
        assert!(matches!(
            result,
            Err(InvalidSimulation::PacketForwardedWithoutQueue { .. })
        ));
    }

    #[test]
    fn test_delivery_at_wrong_node() {
        let steps = vec![
            generated(0, 1),
            sent(0, 0, 1, 10),
            enqueued(1, 0, 10),
            sent(1, 0, 10, 1),
            delivered(1, 0, 1),
        ];
        let result = SimulationVerifier::new(steps, kinds()).verify();
        assert!(matches!(
            result,
            Err(InvalidSimulation::PacketDeliveredToWrongNode { .. })
        ));
    }

    #[test]
    fn test_one_send_per_tick() {
        let steps = vec![
            generated(0, 1),
            generated(1, 1),
            sent(0, 0, 1, 10),
            sent(0, 1, 1, 10),
        ];
        let result = SimulationVerifier::new(steps, kinds()).verify();
        assert_eq!(
            result.err(),
            Some(InvalidSimulation::MultipleSendsInOneTick {
                node_id: NodeId(1),
                tick: 0
            })
        );
    }

    #[test]
    fn test_dropped_packets_disappear() {
        let steps = vec![
            generated(0, 1),
            sent(0, 0, 1, 10),
            SimulationStep {
                tick: 1,
                kind: SimulationStepKind::PacketDropped(GenericPacketEvent {
                    packet_number: 0,
                    node_id: NodeId(10),
                }),
            },
            sent(2, 0, 10, 2),
        ];
        let result = SimulationVerifier::new(steps, kinds()).verify();
        assert_eq!(
            result.err(),
            Some(InvalidSimulation::UnknownPacket { packet_number: 0 })
        );
    }
}
