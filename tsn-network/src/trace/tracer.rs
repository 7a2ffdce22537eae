use crate::network::queue::QueueType;
use crate::network::spec::{NetworkSpec, NodeKind};
use crate::packet::{Deadline, Packet};
use crate::trace::simulation_step::{
    DeadlineMissed, GenericPacketEvent, PacketDelivered, PacketEnqueued, PacketGenerated,
    PacketSent, SimulationStep, SimulationStepKind,
};
use crate::trace::simulation_stepper::SimulationStepper;
use crate::trace::simulation_verifier::SimulationVerifier;
use crate::{NodeId, Tick};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

pub struct SimulationStepTracer {
    recorded_steps: Vec<SimulationStep>,
    node_kinds: BTreeMap<NodeId, NodeKind>,
    already_warned_dropped: HashSet<NodeId>,
}

impl SimulationStepTracer {
    pub fn new(spec: &NetworkSpec) -> Self {
        Self {
            recorded_steps: Vec::new(),
            node_kinds: spec.nodes.iter().map(|n| (n.id, n.kind)).collect(),
            already_warned_dropped: HashSet::new(),
        }
    }

    pub fn steps(&self) -> Vec<SimulationStep> {
        self.recorded_steps.clone()
    }

    pub fn stepper(&self) -> SimulationStepper {
        SimulationStepper::new(self.recorded_steps.clone())
    }

    pub fn verifier(&self) -> SimulationVerifier {
        SimulationVerifier::new(self.recorded_steps.clone(), self.node_kinds.clone())
    }

    fn record(&mut self, tick: Tick, kind: SimulationStepKind) {
        self.recorded_steps.push(SimulationStep { tick, kind });
    }

    pub(crate) fn track_packet_generated(&mut self, tick: Tick, packet: &Packet) {
        self.record(
            tick,
            SimulationStepKind::PacketGenerated(PacketGenerated {
                packet_number: packet.number(),
                packet_name: packet.name().clone(),
                packet_size_bytes: packet.size_bytes(),
                class: packet.class(),
                node_id: packet.origin(),
                destination: packet.destination(),
            }),
        );
    }

    pub(crate) fn track_packet_sent(
        &mut self,
        tick: Tick,
        node_id: NodeId,
        next_hop: NodeId,
        packet: &Packet,
    ) {
        self.record(
            tick,
            SimulationStepKind::PacketSent(PacketSent {
                packet_number: packet.number(),
                node_id,
                next_hop,
            }),
        );
    }

    pub(crate) fn track_packet_enqueued(
        &mut self,
        tick: Tick,
        node_id: NodeId,
        queue_type: QueueType,
        lane: usize,
        packet: &Packet,
    ) {
        self.record(
            tick,
            SimulationStepKind::PacketEnqueued(PacketEnqueued {
                packet_number: packet.number(),
                node_id,
                queue_type,
                lane,
            }),
        );
    }

    pub(crate) fn track_packet_dropped(&mut self, tick: Tick, node_id: NodeId, packet: &Packet) {
        self.record(
            tick,
            SimulationStepKind::PacketDropped(GenericPacketEvent {
                packet_number: packet.number(),
                node_id,
            }),
        );

        if self.already_warned_dropped.insert(node_id) {
            warn!(
                "tick {tick}: packet #{} dropped by switch `{node_id}` because its emergency lanes refused it (further drops at this switch will not be reported)",
                packet.number()
            );
        }
    }

    pub(crate) fn track_packet_delivered(
        &mut self,
        tick: Tick,
        node_id: NodeId,
        packet: &Packet,
        latency: Tick,
    ) {
        self.record(
            tick,
            SimulationStepKind::PacketDelivered(PacketDelivered {
                packet_number: packet.number(),
                node_id,
                latency,
            }),
        );
    }

    pub(crate) fn track_deadline_missed(
        &mut self,
        tick: Tick,
        node_id: NodeId,
        packet: &Packet,
        latency: Tick,
        deadline: Deadline,
    ) {
        self.record(
            tick,
            SimulationStepKind::DeadlineMissed(DeadlineMissed {
                packet_number: packet.number(),
                node_id,
                latency,
                deadline: deadline.ticks(),
                hard: matches!(deadline, Deadline::Hard(_)),
            }),
        );
    }
}
