use crate::error::ConfigError;
use crate::network::spec::{NetworkNodeSpec, NodeKind};
use crate::{CONTROLLER_ID, MAX_NODE_COUNT, NodeId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

struct TopologyNode {
    kind: NodeKind,
    name: Arc<str>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// The validated tree of nodes, rooted at the controller
pub struct Topology {
    nodes: BTreeMap<NodeId, TopologyNode>,
}

impl Topology {
    pub fn new(specs: &[NetworkNodeSpec]) -> Result<Self, ConfigError> {
        if specs.len() > MAX_NODE_COUNT {
            return Err(ConfigError::TooManyNodes {
                count: specs.len(),
                max: MAX_NODE_COUNT,
            });
        }

        let mut nodes = BTreeMap::new();
        for spec in specs {
            let node = TopologyNode {
                kind: spec.kind,
                name: spec.name.as_str().into(),
                parent: spec.parent,
                children: Vec::new(),
            };

            if nodes.insert(spec.id, node).is_some() {
                return Err(ConfigError::DuplicateNodeId { node_id: spec.id });
            }
        }

        match nodes.get(&CONTROLLER_ID) {
            None => return Err(ConfigError::MissingController),
            Some(controller) if controller.kind != NodeKind::Controller => {
                return Err(ConfigError::ReservedControllerId {
                    kind: controller.kind.to_string(),
                });
            }
            Some(controller) => {
                if let Some(parent) = controller.parent {
                    return Err(ConfigError::ControllerWithParent { parent });
                }
            }
        }

        let mut links = Vec::new();
        for (&id, node) in &nodes {
            if id == CONTROLLER_ID {
                continue;
            }

            if node.kind == NodeKind::Controller {
                return Err(ConfigError::UnexpectedController { node_id: id });
            }

            let parent = node.parent.ok_or(ConfigError::MissingParent { node_id: id })?;
            let parent_kind = nodes
                .get(&parent)
                .map(|p| p.kind)
                .ok_or(ConfigError::UnknownParent {
                    node_id: id,
                    parent,
                })?;

            if parent_kind == NodeKind::EndStation {
                return Err(ConfigError::ParentIsEndStation {
                    node_id: id,
                    parent,
                });
            }

            if parent == CONTROLLER_ID && node.kind != NodeKind::Switch {
                return Err(ConfigError::ControllerChildNotSwitch { node_id: id });
            }

            links.push((parent, id));
        }

        // Node ids are visited in ascending order, so children lists come out sorted
        for (parent, child) in links {
            if let Some(parent) = nodes.get_mut(&parent) {
                parent.children.push(child);
            }
        }

        let topology = Self { nodes };
        if topology.children(CONTROLLER_ID).is_empty() {
            return Err(ConfigError::ControllerWithoutSwitches);
        }

        for (&id, node) in &topology.nodes {
            if node.kind == NodeKind::Switch && node.children.is_empty() {
                return Err(ConfigError::SwitchWithoutChildren { switch_id: id });
            }
        }

        // Every node must reach the controller, otherwise the parent links form a cycle
        let mut connected = BTreeSet::from([CONTROLLER_ID]);
        let mut pending = vec![CONTROLLER_ID];
        while let Some(id) = pending.pop() {
            for &child in topology.children(id) {
                if connected.insert(child) {
                    pending.push(child);
                }
            }
        }

        if let Some(&detached) = topology.nodes.keys().find(|id| !connected.contains(id)) {
            return Err(ConfigError::DetachedNode { node_id: detached });
        }

        Ok(topology)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&id).map(|n| n.kind)
    }

    pub fn is_switch(&self, id: NodeId) -> bool {
        self.kind(id).is_some_and(NodeKind::is_switch)
    }

    pub fn is_end_station(&self, id: NodeId) -> bool {
        self.kind(id) == Some(NodeKind::EndStation)
    }

    pub fn name(&self, id: NodeId) -> Option<&Arc<str>> {
        self.nodes.get(&id).map(|n| &n.name)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    /// Ids of the controller and all switches, in ascending order
    pub fn switches(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|(_, n)| n.kind.is_switch())
            .map(|(&id, _)| id)
    }

    /// Ids of all end stations, in ascending order
    pub fn end_stations(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|(_, n)| n.kind == NodeKind::EndStation)
            .map(|(&id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The amount of links between the node and the controller
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            current = parent;
        }

        depth
    }
}
