use crate::error::ConfigError;
use crate::network::gcl::{GATE_COUNT, GateVector};
use crate::packet::{Packet, TrafficClass};
use crate::{NodeId, Tick};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

/// The queue groups of a switch, in lane order
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueueType {
    St,
    Emergency,
    SporadicHard,
    SporadicSoft,
    BestEffort,
}

impl QueueType {
    pub const ALL: [QueueType; 5] = [
        QueueType::St,
        QueueType::Emergency,
        QueueType::SporadicHard,
        QueueType::SporadicSoft,
        QueueType::BestEffort,
    ];

    /// The queue group a class lands in, unless it is redirected to the emergency lanes
    pub fn for_class(class: TrafficClass) -> QueueType {
        match class {
            TrafficClass::St => QueueType::St,
            TrafficClass::SporadicHard => QueueType::SporadicHard,
            TrafficClass::SporadicSoft => QueueType::SporadicSoft,
            TrafficClass::BestEffort => QueueType::BestEffort,
        }
    }

    fn index(self) -> usize {
        match self {
            QueueType::St => 0,
            QueueType::Emergency => 1,
            QueueType::SporadicHard => 2,
            QueueType::SporadicSoft => 3,
            QueueType::BestEffort => 4,
        }
    }
}

impl Display for QueueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QueueType::St => "ST",
            QueueType::Emergency => "emergency",
            QueueType::SporadicHard => "sporadic hard",
            QueueType::SporadicSoft => "sporadic soft",
            QueueType::BestEffort => "best effort",
        };
        f.write_str(name)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingPolicy {
    #[default]
    #[serde(rename = "FIFO")]
    Fifo,
    #[serde(rename = "EDF")]
    Edf,
}

impl Display for SchedulingPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulingPolicy::Fifo => f.write_str("FIFO"),
            SchedulingPolicy::Edf => f.write_str("EDF"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueGroupSpec {
    pub count: usize,
    pub policy: SchedulingPolicy,
}

/// Lane counts and scheduling policies of a switch, per queue type
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueDefinition {
    groups: [QueueGroupSpec; 5],
}

impl Default for QueueDefinition {
    /// One lane for every queue type, except best effort, which gets the remaining four
    fn default() -> Self {
        let fifo = |count| QueueGroupSpec {
            count,
            policy: SchedulingPolicy::Fifo,
        };

        Self {
            groups: [fifo(1), fifo(1), fifo(1), fifo(1), fifo(4)],
        }
    }
}

impl QueueDefinition {
    pub fn group(&self, queue_type: QueueType) -> QueueGroupSpec {
        self.groups[queue_type.index()]
    }

    pub fn with_group(mut self, queue_type: QueueType, group: QueueGroupSpec) -> Self {
        self.groups[queue_type.index()] = group;
        self
    }

    pub fn with_count(mut self, queue_type: QueueType, count: usize) -> Self {
        self.groups[queue_type.index()].count = count;
        self
    }

    pub fn with_policy(mut self, queue_type: QueueType, policy: SchedulingPolicy) -> Self {
        self.groups[queue_type.index()].policy = policy;
        self
    }

    pub fn total_lanes(&self) -> usize {
        self.groups.iter().map(|g| g.count).sum()
    }

    pub(crate) fn validate(&self, switch_id: NodeId) -> Result<(), ConfigError> {
        for queue_type in QueueType::ALL {
            if self.group(queue_type).count == 0 {
                return Err(ConfigError::EmptyQueueGroup {
                    switch_id,
                    queue_type,
                });
            }
        }

        let total = self.total_lanes();
        if total != GATE_COUNT {
            return Err(ConfigError::InvalidLaneCount { switch_id, total });
        }

        Ok(())
    }
}

/// Decides whether a packet may be redirected to the emergency lanes
pub trait EmergencyAdmission {
    /// `emergency_depths` holds the amount of packets queued in each emergency lane
    fn admit(&self, packet: &Packet, emergency_depths: &[usize]) -> bool;
}

/// Admits every emergency redirect
pub struct AlwaysAdmit;

impl EmergencyAdmission for AlwaysAdmit {
    fn admit(&self, _packet: &Packet, _emergency_depths: &[usize]) -> bool {
        true
    }
}

/// Admits emergency redirects while at least one emergency lane holds fewer packets than the limit
pub struct MaxLaneDepth(pub usize);

impl EmergencyAdmission for MaxLaneDepth {
    fn admit(&self, _packet: &Packet, emergency_depths: &[usize]) -> bool {
        emergency_depths.iter().any(|&depth| depth < self.0)
    }
}

pub(crate) struct Lane {
    queue_type: QueueType,
    policy: SchedulingPolicy,
    packets: VecDeque<Packet>,
}

impl Lane {
    /// The position of the packet this lane would transmit next
    fn select(&self, now: Tick) -> Option<usize> {
        match self.policy {
            SchedulingPolicy::Fifo => (!self.packets.is_empty()).then_some(0),
            SchedulingPolicy::Edf => select_earliest_deadline(&self.packets, now),
        }
    }
}

/// Picks the packet with the least slack, the first one among equals
///
/// Packets without a deadline are only picked if no other packet has one.
fn select_earliest_deadline(packets: &VecDeque<Packet>, now: Tick) -> Option<usize> {
    let mut best: Option<(usize, i64)> = None;
    let mut without_deadline = None;
    for (position, packet) in packets.iter().enumerate() {
        match packet.slack(now) {
            Some(slack) => {
                if best.is_none_or(|(_, best_slack)| slack < best_slack) {
                    best = Some((position, slack));
                }
            }
            None if without_deadline.is_none() => without_deadline = Some(position),
            None => {}
        }
    }

    best.map(|(position, _)| position).or(without_deadline)
}

/// A packet a lane has offered for transmission in the current tick
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct TransmitCandidate {
    pub(crate) lane: usize,
    pub(crate) position: usize,
    pub(crate) priority: u8,
    pub(crate) emergency: bool,
}

/// The eight lanes of a switch, flattened in gate order
pub(crate) struct SwitchQueues {
    lanes: Vec<Lane>,
}

impl SwitchQueues {
    pub(crate) fn new(definition: &QueueDefinition) -> Self {
        let mut lanes = Vec::with_capacity(GATE_COUNT);
        for queue_type in QueueType::ALL {
            let group = definition.group(queue_type);
            for _ in 0..group.count {
                lanes.push(Lane {
                    queue_type,
                    policy: group.policy,
                    packets: VecDeque::new(),
                });
            }
        }

        Self { lanes }
    }

    /// The least occupied lane of the group, the lowest index among equals
    pub(crate) fn emptiest_lane(&self, queue_type: QueueType) -> Option<usize> {
        self.lanes
            .iter()
            .enumerate()
            .filter(|(_, lane)| lane.queue_type == queue_type)
            .min_by_key(|(_, lane)| lane.packets.len())
            .map(|(index, _)| index)
    }

    pub(crate) fn push(&mut self, lane: usize, packet: Packet) {
        self.lanes[lane].packets.push_back(packet);
    }

    pub(crate) fn depths_of(&self, queue_type: QueueType) -> Vec<usize> {
        self.lanes
            .iter()
            .filter(|lane| lane.queue_type == queue_type)
            .map(|lane| lane.packets.len())
            .collect()
    }

    pub(crate) fn depths(&self) -> Vec<usize> {
        self.lanes.iter().map(|lane| lane.packets.len()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lanes.iter().map(|lane| lane.packets.len()).sum()
    }

    /// Lets every lane with an open gate offer one packet
    pub(crate) fn select_candidates(&self, gates: GateVector, now: Tick) -> Vec<TransmitCandidate> {
        let mut candidates = Vec::new();
        for (index, lane) in self.lanes.iter().enumerate() {
            if !gates.is_open(index) {
                continue;
            }

            if let Some(position) = lane.select(now) {
                candidates.push(TransmitCandidate {
                    lane: index,
                    position,
                    priority: lane.packets[position].priority(),
                    emergency: lane.queue_type == QueueType::Emergency,
                });
            }
        }

        candidates
    }

    #[cfg(test)]
    pub(crate) fn peek(&self, candidate: &TransmitCandidate) -> Option<&Packet> {
        self.lanes.get(candidate.lane)?.packets.get(candidate.position)
    }

    pub(crate) fn remove(&mut self, candidate: &TransmitCandidate) -> Option<Packet> {
        self.lanes
            .get_mut(candidate.lane)?
            .packets
            .remove(candidate.position)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::packet::{PacketKind, test_packet};

    fn sporadic_hard(deadline: Tick) -> PacketKind {
        PacketKind::SporadicHard {
            min_inter_release: 10,
            hard_deadline: deadline,
            max_release_jitter: 0,
        }
    }

    fn st() -> PacketKind {
        PacketKind::St {
            period: 4,
            hard_deadline: 4,
            max_release_jitter: 0,
        }
    }

    fn soft() -> PacketKind {
        PacketKind::SporadicSoft {
            min_inter_release: 10,
            soft_deadline: 10,
            max_release_jitter: 0,
        }
    }

    #[test]
    fn test_default_layout() {
        let queues = SwitchQueues::new(&QueueDefinition::default());
        let types: Vec<_> = queues.lanes.iter().map(|lane| lane.queue_type).collect();
        assert_eq!(
            types,
            vec![
                QueueType::St,
                QueueType::Emergency,
                QueueType::SporadicHard,
                QueueType::SporadicSoft,
                QueueType::BestEffort,
                QueueType::BestEffort,
                QueueType::BestEffort,
                QueueType::BestEffort,
            ]
        );
    }

    #[test]
    fn test_definition_validation() {
        assert!(QueueDefinition::default().validate(NodeId(1)).is_ok());

        let empty_group = QueueDefinition::default()
            .with_count(QueueType::Emergency, 0)
            .with_count(QueueType::BestEffort, 5);
        assert_eq!(
            empty_group.validate(NodeId(1)),
            Err(ConfigError::EmptyQueueGroup {
                switch_id: NodeId(1),
                queue_type: QueueType::Emergency
            })
        );

        let too_few = QueueDefinition::default().with_count(QueueType::BestEffort, 3);
        assert_eq!(
            too_few.validate(NodeId(1)),
            Err(ConfigError::InvalidLaneCount {
                switch_id: NodeId(1),
                total: 7
            })
        );
    }

    #[test]
    fn test_enqueue_balances_lanes() {
        let mut queues = SwitchQueues::new(&QueueDefinition::default());
        let mut chosen = Vec::new();
        for number in 0..6 {
            let lane = queues.emptiest_lane(QueueType::BestEffort).unwrap();
            queues.push(lane, test_packet(number, PacketKind::BestEffort, 0));
            chosen.push(lane);
        }

        assert_eq!(chosen, vec![4, 5, 6, 7, 4, 5]);
        assert_eq!(queues.depths_of(QueueType::BestEffort), vec![2, 2, 1, 1]);
        assert_eq!(queues.len(), 6);
    }

    #[test]
    fn test_edf_picks_least_slack() {
        let mut packets = VecDeque::new();
        packets.push_back(test_packet(0, sporadic_hard(5), 0));
        packets.push_back(test_packet(1, sporadic_hard(3), 0));

        assert_eq!(select_earliest_deadline(&packets, 2), Some(1));
    }

    #[test]
    fn test_edf_ties_go_to_the_front() {
        let mut packets = VecDeque::new();
        packets.push_back(test_packet(0, PacketKind::BestEffort, 0));
        packets.push_back(test_packet(1, sporadic_hard(4), 1));
        packets.push_back(test_packet(2, sporadic_hard(3), 2));

        assert_eq!(select_earliest_deadline(&packets, 3), Some(1));
    }

    #[test]
    fn test_edf_falls_back_to_packets_without_deadline() {
        let mut packets = VecDeque::new();
        packets.push_back(test_packet(0, PacketKind::BestEffort, 0));
        packets.push_back(test_packet(1, PacketKind::BestEffort, 0));

        assert_eq!(select_earliest_deadline(&packets, 3), Some(0));
        assert_eq!(select_earliest_deadline(&VecDeque::new(), 3), None);
    }

    #[test]
    fn test_edf_lane_candidate() {
        let definition = QueueDefinition::default()
            .with_policy(QueueType::SporadicHard, SchedulingPolicy::Edf);
        let mut queues = SwitchQueues::new(&definition);
        queues.push(2, test_packet(0, sporadic_hard(5), 0));
        queues.push(2, test_packet(1, sporadic_hard(3), 0));

        let candidates = queues.select_candidates(GateVector::ALL_OPEN, 2);
        assert_eq!(candidates.len(), 1);
        assert_eq!(queues.peek(&candidates[0]).unwrap().number(), 1);
    }

    #[test]
    fn test_closed_gates_offer_nothing() {
        let mut queues = SwitchQueues::new(&QueueDefinition::default());
        queues.push(0, test_packet(0, st(), 0));
        queues.push(3, test_packet(1, soft(), 0));
        queues.push(4, test_packet(2, PacketKind::BestEffort, 0));

        let gates: GateVector = "01011111".parse().unwrap();
        let candidates = queues.select_candidates(gates, 0);
        let lanes: Vec<_> = candidates.iter().map(|c| c.lane).collect();
        assert_eq!(lanes, vec![3, 4]);

        let candidates = queues.select_candidates(GateVector::ALL_CLOSED, 0);
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_removal() {
        let mut queues = SwitchQueues::new(&QueueDefinition::default());
        queues.push(0, test_packet(0, st(), 0));
        queues.push(0, test_packet(1, st(), 0));

        let candidate = queues.select_candidates(GateVector::ALL_OPEN, 0)[0];
        assert_eq!(queues.remove(&candidate).unwrap().number(), 0);
        assert_eq!(queues.depths(), vec![1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_admission_policies() {
        let packet = test_packet(0, st(), 0);
        assert!(AlwaysAdmit.admit(&packet, &[100]));
        assert!(MaxLaneDepth(2).admit(&packet, &[2, 1]));
        assert!(!MaxLaneDepth(2).admit(&packet, &[2, 3]));
    }
}
