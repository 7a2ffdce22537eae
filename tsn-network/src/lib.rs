#![allow(clippy::type_complexity)]

pub mod error;
pub mod network;
pub mod packet;
pub mod simulation;
pub mod stats_tracker;
pub mod trace;
pub mod traffic;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A point in simulated time (one tick is the smallest unit the simulator knows about)
pub type Tick = u64;

/// The id reserved for the controller, which is the root of the topology
pub const CONTROLLER_ID: NodeId = NodeId(0);

/// Upper bound on the amount of nodes a topology may contain
pub const MAX_NODE_COUNT: usize = 100;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        NodeId(value)
    }
}
