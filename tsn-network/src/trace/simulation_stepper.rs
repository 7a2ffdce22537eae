use crate::trace::simulation_step::{SimulationStep, SimulationStepKind};
use crate::{NodeId, Tick};

#[derive(Clone)]
pub struct SimulationStepper {
    steps: Vec<SimulationStep>,
}

impl SimulationStepper {
    pub fn new(steps: Vec<SimulationStep>) -> Self {
        Self { steps }
    }

    /// The nodes the packet was seen at: its origin, every switch that enqueued it, and its
    /// destination once delivered
    pub fn get_packet_hops(&self, packet_number: u64) -> Vec<(Tick, NodeId)> {
        let mut hops = Vec::new();
        for step in &self.steps {
            let node_id = match &step.kind {
                SimulationStepKind::PacketGenerated(s) if s.packet_number == packet_number => {
                    s.node_id
                }
                SimulationStepKind::PacketEnqueued(s) if s.packet_number == packet_number => {
                    s.node_id
                }
                SimulationStepKind::PacketDelivered(s) if s.packet_number == packet_number => {
                    s.node_id
                }
                _ => continue,
            };

            hops.push((step.tick, node_id));
        }

        hops
    }

    pub fn get_packet_path(&self, packet_number: u64) -> Vec<NodeId> {
        self.get_packet_hops(packet_number)
            .into_iter()
            .map(|(_, node_id)| node_id)
            .collect()
    }

    pub fn get_packet_arrived_at(&self, packet_number: u64, node_id: NodeId) -> Option<Tick> {
        self.get_packet_hops(packet_number)
            .into_iter()
            .find(|&(_, hop)| hop == node_id)
            .map(|(tick, _)| tick)
    }
}
