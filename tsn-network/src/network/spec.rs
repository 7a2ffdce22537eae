use crate::network::queue::QueueDefinition;
use crate::traffic::TrafficRule;
use crate::NodeId;
use std::fmt::{Display, Formatter};

#[derive(Clone, Debug)]
pub struct NetworkSpec {
    pub nodes: Vec<NetworkNodeSpec>,
}

#[derive(Clone, Debug)]
pub struct NetworkNodeSpec {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// Absent only for the controller
    pub parent: Option<NodeId>,
    /// Lane layout of a switch (the default layout is used when absent)
    pub queues: Option<QueueDefinition>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The root of the topology, which also acts as a switch
    Controller,
    Switch,
    EndStation,
}

impl NodeKind {
    /// Whether nodes of this kind forward packets
    pub fn is_switch(self) -> bool {
        matches!(self, NodeKind::Controller | NodeKind::Switch)
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Controller => f.write_str("controller"),
            NodeKind::Switch => f.write_str("switch"),
            NodeKind::EndStation => f.write_str("end station"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TrafficSpec {
    pub rules: Vec<TrafficRule>,
    pub mapping: Vec<TrafficMapping>,
}

/// Assigns a traffic rule to the end station that releases its packets
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TrafficMapping {
    pub end_station: NodeId,
    pub rule: u32,
}
