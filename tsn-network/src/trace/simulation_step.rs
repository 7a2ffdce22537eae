use crate::network::queue::QueueType;
use crate::packet::TrafficClass;
use crate::{NodeId, Tick};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationStep {
    pub tick: Tick,
    #[serde(flatten)]
    pub kind: SimulationStepKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
pub enum SimulationStepKind {
    /// An end station released a new packet
    PacketGenerated(PacketGenerated),
    /// A node put the packet on its outgoing link
    PacketSent(PacketSent),
    /// A switch placed the packet in one of its lanes
    PacketEnqueued(PacketEnqueued),
    /// A switch refused to admit the packet to its emergency lanes
    PacketDropped(GenericPacketEvent),
    /// The packet reached its destination
    PacketDelivered(PacketDelivered),
    /// The packet reached its destination after its deadline expired
    DeadlineMissed(DeadlineMissed),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketGenerated {
    pub packet_number: u64,
    pub packet_name: Arc<str>,
    pub packet_size_bytes: u32,
    pub class: TrafficClass,
    pub node_id: NodeId,
    pub destination: NodeId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenericPacketEvent {
    pub packet_number: u64,
    pub node_id: NodeId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketSent {
    pub packet_number: u64,
    pub node_id: NodeId,
    pub next_hop: NodeId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketEnqueued {
    pub packet_number: u64,
    pub node_id: NodeId,
    pub queue_type: QueueType,
    pub lane: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketDelivered {
    pub packet_number: u64,
    pub node_id: NodeId,
    pub latency: Tick,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeadlineMissed {
    pub packet_number: u64,
    pub node_id: NodeId,
    pub latency: Tick,
    pub deadline: Tick,
    pub hard: bool,
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_replay_log_step_shape() {
        let step = SimulationStep {
            tick: 3,
            kind: SimulationStepKind::PacketGenerated(PacketGenerated {
                packet_number: 7,
                packet_name: Arc::from("control-loop"),
                packet_size_bytes: 16,
                class: TrafficClass::St,
                node_id: NodeId(1),
                destination: NodeId(2),
            }),
        };

        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(
            value,
            json!({
                "tick": 3,
                "type": "packetGenerated",
                "data": {
                    "packet_number": 7,
                    "packet_name": "control-loop",
                    "packet_size_bytes": 16,
                    "class": "ST",
                    "node_id": 1,
                    "destination": 2
                }
            })
        );

        let parsed: SimulationStep = serde_json::from_value(value).unwrap();
        let SimulationStepKind::PacketGenerated(generated) = parsed.kind else {
            panic!("unexpected step kind");
        };
        assert_eq!(&*generated.packet_name, "control-loop");
    }
}
