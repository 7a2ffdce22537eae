use crate::network::queue::QueueType;
use crate::packet::TrafficClass;
use crate::{NodeId, Tick};
use thiserror::Error;

/// Problems with the network, traffic or gate control configuration, detected before the first tick
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("the topology contains {count} nodes, but at most {max} are supported")]
    TooManyNodes { count: usize, max: usize },
    #[error("network node `{node_id}` is defined more than once")]
    DuplicateNodeId { node_id: NodeId },
    #[error("the topology has no controller")]
    MissingController,
    #[error("network node `{node_id}` is a controller, but only node 0 may be the controller")]
    UnexpectedController { node_id: NodeId },
    #[error("node 0 is reserved for the controller, but it was defined as a {kind}")]
    ReservedControllerId { kind: String },
    #[error("the controller cannot have a parent (found parent `{parent}`)")]
    ControllerWithParent { parent: NodeId },
    #[error("network node `{node_id}` has no parent")]
    MissingParent { node_id: NodeId },
    #[error("network node `{node_id}` references unknown parent `{parent}`")]
    UnknownParent { node_id: NodeId, parent: NodeId },
    #[error("network node `{node_id}` has end station `{parent}` as its parent")]
    ParentIsEndStation { node_id: NodeId, parent: NodeId },
    #[error("network node `{node_id}` is a child of the controller, but is not a switch")]
    ControllerChildNotSwitch { node_id: NodeId },
    #[error("the controller must have at least one switch as a child")]
    ControllerWithoutSwitches,
    #[error("switch `{switch_id}` has no children")]
    SwitchWithoutChildren { switch_id: NodeId },
    #[error("network node `{node_id}` is not connected to the controller")]
    DetachedNode { node_id: NodeId },
    #[error("network node `{node_id}` defines queues, but it is not a switch")]
    UnexpectedQueueDefinition { node_id: NodeId },
    #[error("switch `{switch_id}` has no lanes for {queue_type} traffic")]
    EmptyQueueGroup {
        switch_id: NodeId,
        queue_type: QueueType,
    },
    #[error("switch `{switch_id}` defines {total} lanes, but exactly 8 are required")]
    InvalidLaneCount { switch_id: NodeId, total: usize },
    #[error("routing for switch `{switch_id}` did not converge")]
    RoutingDidNotConverge { switch_id: NodeId },
    #[error("switch `{switch_id}` has no route to end station `{end_station}`")]
    UnreachableEndStation {
        switch_id: NodeId,
        end_station: NodeId,
    },
    #[error(
        "routing table of switch `{switch_id}` has {entries} entries, but the topology has {end_stations} end stations"
    )]
    IncompleteRoutingTable {
        switch_id: NodeId,
        entries: usize,
        end_stations: usize,
    },
    #[error("the gate control list has no entries")]
    EmptyGateControlList,
    #[error("the gate control list must start at tick 0 (first entry is at tick {tick})")]
    GateControlListStartsLate { tick: Tick },
    #[error("gate control list entry at tick {tick} is not after its predecessor")]
    UnorderedGateControlEntry { tick: Tick },
    #[error("gate control list entry at tick {tick} lies beyond the cycle length {cycle_length}")]
    GateControlEntryBeyondCycle { tick: Tick, cycle_length: Tick },
    #[error("the gate control list must repeat after at least one tick")]
    EmptyGateControlCycle,
    #[error("traffic rule `{rule}` is defined more than once")]
    DuplicateTrafficRule { rule: u32 },
    #[error("end station `{end_station}` is mapped to unknown traffic rule `{rule}`")]
    UnknownTrafficRule { end_station: NodeId, rule: u32 },
    #[error("traffic rule `{rule}` is mapped to `{node_id}`, which is not an end station")]
    MappedNodeNotEndStation { node_id: NodeId, rule: u32 },
    #[error("end station `{end_station}` is mapped to more than one traffic rule")]
    DuplicateTrafficMapping { end_station: NodeId },
    #[error("traffic rule `{rule}` targets `{destination}`, which is not an end station")]
    UnknownDestination { rule: u32, destination: NodeId },
    #[error("end station `{end_station}` would send traffic rule `{rule}` to itself")]
    SelfDestination { end_station: NodeId, rule: u32 },
    #[error("end station `{end_station}` has no other end station to send random traffic to")]
    NoRandomDestination { end_station: NodeId },
    #[error("traffic rule `{rule}` has a zero period or inter-release time")]
    ZeroPeriod { rule: u32 },
    #[error("traffic rule `{rule}` has a zero packet size")]
    ZeroPacketSize { rule: u32 },
    #[error("traffic rule `{rule}` has release probability {probability}, outside of [0, 1]")]
    InvalidReleaseProbability { rule: u32, probability: f64 },
    #[error("the emergency probability {probability} is outside of [0, 1]")]
    InvalidEmergencyProbability { probability: f64 },
    #[error("the byte budget per tick must be positive")]
    ZeroByteBudget,
}

/// Conditions that halt a running simulation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error(
        "hard deadline missed at tick {tick}: packet #{packet} ({class}) from `{origin}` to `{destination}` arrived after {latency} ticks, but its deadline is {deadline} ticks"
    )]
    HardDeadlineMissed {
        tick: Tick,
        packet: u64,
        class: TrafficClass,
        origin: NodeId,
        destination: NodeId,
        latency: Tick,
        deadline: Tick,
    },
    #[error("switch `{switch_id}` has no route towards `{destination}`")]
    MissingRoute {
        switch_id: NodeId,
        destination: NodeId,
    },
    #[error("switch `{switch_id}` chose lane {lane} for transmission, but the lane has no such packet")]
    StaleCandidate { switch_id: NodeId, lane: usize },
    #[error("packet forwarded to unknown node `{node_id}`")]
    UnknownNode { node_id: NodeId },
    #[error("switch `{switch_id}` was asked to forward at tick {tick} while its link was busy")]
    ForwardWhileBusy { switch_id: NodeId, tick: Tick },
    #[error("packet #{packet} for `{destination}` was delivered to end station `{end_station}`")]
    MisdeliveredPacket {
        end_station: NodeId,
        packet: u64,
        destination: NodeId,
    },
    #[error("switch `{switch_id}` has no lane for {queue_type} traffic")]
    NoLaneForQueueType {
        switch_id: NodeId,
        queue_type: QueueType,
    },
}
