//! The simulated network
//!
//! Switches form a tree rooted at the controller (which forwards packets like any other switch),
//! with end stations as leaves. Every phase of a tick is exposed as a separate method, so the
//! simulation can run them in a fixed order.

pub mod end_station;
pub mod gcl;
pub mod link;
pub mod queue;
pub mod route;
pub mod spec;
pub mod switch;
pub mod topology;

use crate::error::{ConfigError, SimulationError};
use crate::network::end_station::EndStation;
use crate::network::route::{RoutingTable, resolve_routing_tables};
use crate::network::spec::{NetworkSpec, TrafficSpec};
use crate::network::switch::Switch;
use crate::network::topology::Topology;
use crate::packet::Packet;
use crate::simulation::SimulationContext;
use crate::traffic::{Destination, TrafficGenerator};
use crate::NodeId;
use fastrand::Rng;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

#[derive(Copy, Clone)]
enum NodeIndex {
    Switch(usize),
    EndStation(usize),
}

pub struct TsnNetwork {
    topology: Topology,
    /// Ordered by id, so phases visit switches in a deterministic order
    switches: Vec<Switch>,
    /// Ordered by id
    end_stations: Vec<EndStation>,
    index: HashMap<NodeId, NodeIndex>,
    next_packet_number: u64,
}

impl TsnNetwork {
    /// Validates the configuration and builds the network, routing tables included
    ///
    /// Random traffic destinations are drawn from `rng` here, once, in mapping order.
    pub fn initialize(
        spec: &NetworkSpec,
        traffic: TrafficSpec,
        rng: &mut Rng,
    ) -> Result<Self, ConfigError> {
        let topology = Topology::new(&spec.nodes)?;

        let mut queue_definitions = BTreeMap::new();
        for node in &spec.nodes {
            if !node.kind.is_switch() {
                if node.queues.is_some() {
                    return Err(ConfigError::UnexpectedQueueDefinition { node_id: node.id });
                }

                continue;
            }

            let definition = node.queues.clone().unwrap_or_default();
            definition.validate(node.id)?;
            queue_definitions.insert(node.id, definition);
        }

        let mut routing_tables = resolve_routing_tables(&topology)?;
        let mut generators = traffic_generators(&topology, traffic, rng)?;

        let mut switches = Vec::new();
        for (id, definition) in &queue_definitions {
            let routing_table = routing_tables.remove(id).unwrap_or_default();
            let name = topology.name(*id).cloned().unwrap_or_else(|| id.to_string().into());
            switches.push(Switch::new(*id, name, routing_table, definition));
        }

        let mut end_stations = Vec::new();
        for id in topology.end_stations() {
            let parent = topology
                .parent(id)
                .ok_or(ConfigError::MissingParent { node_id: id })?;
            let name = topology.name(id).cloned().unwrap_or_else(|| id.to_string().into());
            end_stations.push(EndStation::new(id, name, parent, generators.remove(&id)));
        }

        let index = switches
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id(), NodeIndex::Switch(i)))
            .chain(
                end_stations
                    .iter()
                    .enumerate()
                    .map(|(i, e)| (e.id(), NodeIndex::EndStation(i))),
            )
            .collect();

        info!(
            "network initialized with {} switches and {} end stations",
            switches.len(),
            end_stations.len()
        );

        Ok(Self {
            topology,
            switches,
            end_stations,
            index,
            next_packet_number: 0,
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// The controller and all switches, ordered by id
    pub fn switches(&self) -> &[Switch] {
        &self.switches
    }

    pub fn end_stations(&self) -> &[EndStation] {
        &self.end_stations
    }

    pub fn switch(&self, id: NodeId) -> Option<&Switch> {
        match self.index.get(&id)? {
            NodeIndex::Switch(i) => self.switches.get(*i),
            NodeIndex::EndStation(_) => None,
        }
    }

    pub fn end_station(&self, id: NodeId) -> Option<&EndStation> {
        match self.index.get(&id)? {
            NodeIndex::EndStation(i) => self.end_stations.get(*i),
            NodeIndex::Switch(_) => None,
        }
    }

    pub fn routing_tables(&self) -> BTreeMap<NodeId, &RoutingTable> {
        self.switches
            .iter()
            .map(|s| (s.id(), s.routing_table()))
            .collect()
    }

    /// Packets that are still queued, in transit, or waiting to be sent
    pub fn packets_in_flight(&self) -> usize {
        let at_switches: usize = self
            .switches
            .iter()
            .map(|s| s.inbox_len() + s.queued_packets())
            .sum();
        let at_end_stations: usize = self
            .end_stations
            .iter()
            .map(|e| e.backlog() + e.inbox_len())
            .sum();
        at_switches + at_end_stations
    }

    pub(crate) fn generate_traffic(&mut self, ctx: &mut SimulationContext<'_>) {
        for end_station in &mut self.end_stations {
            end_station.generate(ctx, &mut self.next_packet_number);
        }
    }

    pub(crate) fn classify_ingress(
        &mut self,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<(), SimulationError> {
        for switch in &mut self.switches {
            switch.classify_ingress(ctx)?;
        }

        Ok(())
    }

    pub(crate) fn schedule_lanes(&mut self, ctx: &SimulationContext<'_>) {
        for switch in &mut self.switches {
            switch.schedule(ctx);
        }
    }

    /// Lets every switch forward at most one packet
    ///
    /// Forwarded packets are only handed over once all switches are done, so no packet crosses
    /// more than one switch per tick.
    pub(crate) fn arbitrate_egress(
        &mut self,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<(), SimulationError> {
        let mut forwards = Vec::new();
        for switch in &mut self.switches {
            if let Some(forward) = switch.arbitrate(ctx)? {
                forwards.push(forward);
            }
        }

        for forward in forwards {
            self.deliver(forward.recipient, forward.packet)?;
        }

        Ok(())
    }

    /// Sends the next packet of every end station and consumes the packets that reached them
    pub(crate) fn flush_and_digest(
        &mut self,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<(), SimulationError> {
        let mut sent = Vec::new();
        let mut errors = Vec::new();
        for end_station in &mut self.end_stations {
            if let Some(packet) = end_station.flush(ctx) {
                sent.push((end_station.parent(), packet));
            }

            if let Err(error) = end_station.digest(ctx) {
                errors.push(error);
            }
        }

        for (parent, packet) in sent {
            self.deliver(parent, packet)?;
        }

        match errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn deliver(&mut self, recipient: NodeId, packet: Packet) -> Result<(), SimulationError> {
        match self.index.get(&recipient) {
            Some(&NodeIndex::Switch(i)) => self.switches[i].receive(packet),
            Some(&NodeIndex::EndStation(i)) => self.end_stations[i].receive(packet),
            None => return Err(SimulationError::UnknownNode { node_id: recipient }),
        }

        Ok(())
    }
}

/// Builds the generator of every mapped end station, resolving random destinations
fn traffic_generators(
    topology: &Topology,
    traffic: TrafficSpec,
    rng: &mut Rng,
) -> Result<BTreeMap<NodeId, TrafficGenerator>, ConfigError> {
    let mut rules = BTreeMap::new();
    for rule in traffic.rules {
        rule.validate()?;
        let id = rule.id;
        if rules.insert(id, rule).is_some() {
            return Err(ConfigError::DuplicateTrafficRule { rule: id });
        }
    }

    let end_stations: Vec<_> = topology.end_stations().collect();
    let mut generators = BTreeMap::new();
    for mapping in traffic.mapping {
        let end_station = mapping.end_station;
        if !topology.is_end_station(end_station) {
            return Err(ConfigError::MappedNodeNotEndStation {
                node_id: end_station,
                rule: mapping.rule,
            });
        }

        let rule = rules
            .get(&mapping.rule)
            .cloned()
            .ok_or(ConfigError::UnknownTrafficRule {
                end_station,
                rule: mapping.rule,
            })?;

        let destination = match rule.destination {
            Destination::Fixed(destination) => {
                if !topology.is_end_station(destination) {
                    return Err(ConfigError::UnknownDestination {
                        rule: rule.id,
                        destination,
                    });
                }

                if destination == end_station {
                    return Err(ConfigError::SelfDestination {
                        end_station,
                        rule: rule.id,
                    });
                }

                destination
            }
            Destination::Random => {
                let others: Vec<_> = end_stations
                    .iter()
                    .copied()
                    .filter(|&id| id != end_station)
                    .collect();
                if others.is_empty() {
                    return Err(ConfigError::NoRandomDestination { end_station });
                }

                others[rng.usize(..others.len())]
            }
        };

        if generators
            .insert(end_station, TrafficGenerator::new(rule, destination))
            .is_some()
        {
            return Err(ConfigError::DuplicateTrafficMapping { end_station });
        }
    }

    Ok(generators)
}
