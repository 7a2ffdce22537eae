use crate::NodeId;
use crate::error::ConfigError;
use crate::network::topology::Topology;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Route {
    pub end_station: NodeId,
    /// The neighbor to forward to, or the switch itself if the end station is one of its children
    pub next_hop: NodeId,
}

/// One route per end station, ordered by end station id
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    #[cfg(test)]
    pub(crate) fn from_routes(mut routes: Vec<Route>) -> Self {
        routes.sort_by_key(|r| r.end_station);
        Self { routes }
    }

    pub fn next_hop(&self, destination: NodeId) -> Option<NodeId> {
        self.routes
            .binary_search_by_key(&destination, |r| r.end_station)
            .ok()
            .map(|index| self.routes[index].next_hop)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Computes the routing table of every switch (the controller included)
///
/// Each switch starts out knowing its direct children. Entries pointing at a child switch are
/// then replaced by that switch's own entries, until only end stations remain. End stations
/// outside of a switch's subtree are reached through its parent.
pub fn resolve_routing_tables(
    topology: &Topology,
) -> Result<BTreeMap<NodeId, RoutingTable>, ConfigError> {
    let mut tables: BTreeMap<NodeId, Vec<Route>> = topology
        .switches()
        .map(|switch| {
            let routes = topology
                .children(switch)
                .iter()
                .map(|&child| Route {
                    end_station: child,
                    next_hop: switch,
                })
                .collect();
            (switch, routes)
        })
        .collect();

    let switch_ids: Vec<_> = tables.keys().copied().collect();
    let max_splices = switch_ids.len();
    for &switch in &switch_ids {
        let mut splices = 0;
        loop {
            let routes = &tables[&switch];
            let Some(stale) = routes.iter().position(|r| topology.is_switch(r.end_station)) else {
                break;
            };

            splices += 1;
            if splices > max_splices {
                return Err(ConfigError::RoutingDidNotConverge { switch_id: switch });
            }

            let stale = tables
                .get_mut(&switch)
                .map(|routes| routes.remove(stale))
                .ok_or(ConfigError::RoutingDidNotConverge { switch_id: switch })?;

            // Direct children are reached through themselves, anything deeper keeps its hop
            let next_hop = if stale.next_hop == switch {
                stale.end_station
            } else {
                stale.next_hop
            };

            let spliced: Vec<_> = tables
                .get(&stale.end_station)
                .map(|routes| {
                    routes
                        .iter()
                        .map(|r| Route {
                            end_station: r.end_station,
                            next_hop,
                        })
                        .collect()
                })
                .unwrap_or_default();

            if let Some(routes) = tables.get_mut(&switch) {
                routes.extend(spliced);
            }
        }
    }

    let end_stations: Vec<_> = topology.end_stations().collect();
    let mut resolved = BTreeMap::new();
    for (switch, mut routes) in tables {
        for &end_station in &end_stations {
            if routes.iter().any(|r| r.end_station == end_station) {
                continue;
            }

            let Some(parent) = topology.parent(switch) else {
                return Err(ConfigError::UnreachableEndStation {
                    switch_id: switch,
                    end_station,
                });
            };

            routes.push(Route {
                end_station,
                next_hop: parent,
            });
        }

        routes.sort_by_key(|r| r.end_station);
        routes.dedup_by_key(|r| r.end_station);
        if routes.len() != end_stations.len() {
            return Err(ConfigError::IncompleteRoutingTable {
                switch_id: switch,
                entries: routes.len(),
                end_stations: end_stations.len(),
            });
        }

        resolved.insert(switch, RoutingTable { routes });
    }

    Ok(resolved)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::spec::{NetworkNodeSpec, NodeKind};

    fn node(id: u32, kind: NodeKind, parent: Option<u32>) -> NetworkNodeSpec {
        NetworkNodeSpec {
            id: NodeId(id),
            name: format!("node-{id}"),
            kind,
            parent: parent.map(NodeId),
            queues: None,
        }
    }

    fn tree() -> Topology {
        Topology::new(&[
            node(0, NodeKind::Controller, None),
            node(10, NodeKind::Switch, Some(0)),
            node(20, NodeKind::Switch, Some(0)),
            node(30, NodeKind::Switch, Some(10)),
            node(40, NodeKind::Switch, Some(30)),
            node(1, NodeKind::EndStation, Some(10)),
            node(2, NodeKind::EndStation, Some(10)),
            node(3, NodeKind::EndStation, Some(30)),
            node(4, NodeKind::EndStation, Some(20)),
            node(5, NodeKind::EndStation, Some(20)),
            node(6, NodeKind::EndStation, Some(40)),
        ])
        .unwrap()
    }

    /// Amount of links between two nodes of the tree
    fn distance(topology: &Topology, a: NodeId, b: NodeId) -> usize {
        let ancestors = |mut id: NodeId| {
            let mut path = vec![id];
            while let Some(parent) = topology.parent(id) {
                path.push(parent);
                id = parent;
            }
            path
        };

        let path_a = ancestors(a);
        let path_b = ancestors(b);
        let common = path_a.iter().find(|id| path_b.contains(id)).unwrap();
        topology.depth(a) + topology.depth(b) - 2 * topology.depth(*common)
    }

    #[test]
    fn test_expected_next_hops() {
        let tables = resolve_routing_tables(&tree()).unwrap();
        let hops = |switch: u32| -> Vec<u32> {
            tables[&NodeId(switch)]
                .routes()
                .iter()
                .map(|r| r.next_hop.0)
                .collect()
        };

        // Routes for end stations 1 to 6
        assert_eq!(hops(0), vec![10, 10, 10, 20, 20, 10]);
        assert_eq!(hops(10), vec![10, 10, 30, 0, 0, 30]);
        assert_eq!(hops(20), vec![0, 0, 0, 20, 20, 0]);
        assert_eq!(hops(30), vec![10, 10, 30, 10, 10, 40]);
        assert_eq!(hops(40), vec![30, 30, 30, 30, 30, 40]);
    }

    #[test]
    fn test_one_entry_per_end_station() {
        let topology = tree();
        let tables = resolve_routing_tables(&topology).unwrap();
        let end_stations: Vec<_> = topology.end_stations().collect();

        assert_eq!(tables.len(), 5);
        for table in tables.values() {
            let destinations: Vec<_> = table.routes().iter().map(|r| r.end_station).collect();
            assert_eq!(destinations, end_stations);
        }
    }

    #[test]
    fn test_hops_get_closer_to_destination() {
        let topology = tree();
        let tables = resolve_routing_tables(&topology).unwrap();

        for (&switch, table) in &tables {
            for route in table.routes() {
                if route.next_hop == switch {
                    assert_eq!(topology.parent(route.end_station), Some(switch));
                    continue;
                }

                assert!(
                    distance(&topology, route.next_hop, route.end_station)
                        < distance(&topology, switch, route.end_station),
                    "switch {switch} routes {} through {}",
                    route.end_station,
                    route.next_hop
                );
            }
        }
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let topology = tree();
        let first = resolve_routing_tables(&topology).unwrap();
        let second = resolve_routing_tables(&topology).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_lookup() {
        let tables = resolve_routing_tables(&tree()).unwrap();
        let table = &tables[&NodeId(20)];
        assert_eq!(table.next_hop(NodeId(5)), Some(NodeId(20)));
        assert_eq!(table.next_hop(NodeId(6)), Some(NodeId(0)));
        assert_eq!(table.next_hop(NodeId(99)), None);
    }
}
