use crate::{NodeId, Tick};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// The traffic classes understood by the network, from most to least urgent
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrafficClass {
    #[serde(rename = "ST")]
    St,
    #[serde(rename = "Sporadic_Hard")]
    SporadicHard,
    #[serde(rename = "Sporadic_Soft")]
    SporadicSoft,
    #[serde(rename = "BE")]
    BestEffort,
}

impl TrafficClass {
    pub const ALL: [TrafficClass; 4] = [
        TrafficClass::St,
        TrafficClass::SporadicHard,
        TrafficClass::SporadicSoft,
        TrafficClass::BestEffort,
    ];

    /// Arbitration priority, lower values win
    pub fn priority(self) -> u8 {
        match self {
            TrafficClass::St => 1,
            TrafficClass::SporadicHard => 2,
            TrafficClass::SporadicSoft => 3,
            TrafficClass::BestEffort => 4,
        }
    }
}

impl Display for TrafficClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrafficClass::St => "ST",
            TrafficClass::SporadicHard => "Sporadic_Hard",
            TrafficClass::SporadicSoft => "Sporadic_Soft",
            TrafficClass::BestEffort => "BE",
        };
        f.write_str(name)
    }
}

/// Class-specific timing attributes carried by every packet
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PacketKind {
    St {
        period: Tick,
        hard_deadline: Tick,
        max_release_jitter: Tick,
    },
    SporadicHard {
        min_inter_release: Tick,
        hard_deadline: Tick,
        max_release_jitter: Tick,
    },
    SporadicSoft {
        min_inter_release: Tick,
        soft_deadline: Tick,
        max_release_jitter: Tick,
    },
    BestEffort,
}

impl PacketKind {
    pub fn class(&self) -> TrafficClass {
        match self {
            PacketKind::St { .. } => TrafficClass::St,
            PacketKind::SporadicHard { .. } => TrafficClass::SporadicHard,
            PacketKind::SporadicSoft { .. } => TrafficClass::SporadicSoft,
            PacketKind::BestEffort => TrafficClass::BestEffort,
        }
    }

    pub fn deadline(&self) -> Option<Deadline> {
        match *self {
            PacketKind::St { hard_deadline, .. } | PacketKind::SporadicHard { hard_deadline, .. } => {
                Some(Deadline::Hard(hard_deadline))
            }
            PacketKind::SporadicSoft { soft_deadline, .. } => Some(Deadline::Soft(soft_deadline)),
            PacketKind::BestEffort => None,
        }
    }
}

/// The end-to-end latency bound of a packet, in ticks since its creation
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Deadline {
    /// Missing it halts the simulation
    Hard(Tick),
    /// Missing it is only recorded
    Soft(Tick),
}

impl Deadline {
    pub fn ticks(self) -> Tick {
        match self {
            Deadline::Hard(ticks) | Deadline::Soft(ticks) => ticks,
        }
    }
}

/// Tracks when the current hop first saw the packet
///
/// The timer is reset every time a switch forwards the packet, so the next hop starts from a
/// clean slate.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HopTimer {
    first_seen: Option<Tick>,
}

impl HopTimer {
    /// Returns the tick at which the current hop first saw the packet, recording `now` if this is
    /// the first time
    pub(crate) fn first_seen(&mut self, now: Tick) -> Tick {
        *self.first_seen.get_or_insert(now)
    }

    /// Whether all fragments of a frame spanning `transfer_ticks` have reached the current hop
    pub(crate) fn is_fully_arrived(&mut self, now: Tick, transfer_ticks: Tick) -> bool {
        let first_seen = self.first_seen(now);
        now - first_seen + 1 >= transfer_ticks
    }

    /// Marks the packet as leaving the current hop and returns how long it stayed there
    pub(crate) fn leave(&mut self, now: Tick) -> Tick {
        let delay = now - self.first_seen.unwrap_or(now);
        self.first_seen = None;
        delay
    }
}

#[derive(Clone, Debug)]
pub struct Packet {
    /// Sequential number, unique within a simulation
    pub(crate) number: u64,
    pub(crate) origin: NodeId,
    pub(crate) destination: NodeId,
    pub(crate) name: Arc<str>,
    pub(crate) size_bytes: u32,
    pub(crate) kind: PacketKind,
    /// The tick at which the packet was created at its end station
    pub(crate) transmission_tick: Tick,
    pub(crate) hop: HopTimer,
}

impl Packet {
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn origin(&self) -> NodeId {
        self.origin
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn size_bytes(&self) -> u32 {
        self.size_bytes
    }

    pub fn class(&self) -> TrafficClass {
        self.kind.class()
    }

    pub fn priority(&self) -> u8 {
        self.class().priority()
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.kind.deadline()
    }

    pub fn transmission_tick(&self) -> Tick {
        self.transmission_tick
    }

    /// Ticks left before the deadline expires, negative once it has passed
    ///
    /// Packets without a deadline have no slack.
    pub fn slack(&self, now: Tick) -> Option<i64> {
        let deadline = self.deadline()?;
        Some(self.transmission_tick as i64 + deadline.ticks() as i64 - now as i64)
    }
}

#[cfg(test)]
pub(crate) fn test_packet(number: u64, kind: PacketKind, transmission_tick: Tick) -> Packet {
    Packet {
        number,
        origin: NodeId(1),
        destination: NodeId(2),
        name: "test".into(),
        size_bytes: 16,
        kind,
        transmission_tick,
        hop: HopTimer::default(),
    }
}
