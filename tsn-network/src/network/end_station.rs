use crate::error::SimulationError;
use crate::network::link::{LinkOccupancy, transfer_ticks};
use crate::packet::{Deadline, Packet};
use crate::simulation::SimulationContext;
use crate::traffic::{TrafficGenerator, TrafficRule};
use crate::NodeId;
use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use tracing::{debug, warn};

/// A leaf of the topology, which releases packets according to its traffic rule and consumes the
/// packets addressed to it
pub struct EndStation {
    pub(crate) id: NodeId,
    pub(crate) name: Arc<str>,
    pub(crate) parent: NodeId,
    generator: Option<TrafficGenerator>,
    /// Packets released but not yet sent
    egress: VecDeque<Packet>,
    /// Packets that reached the station, possibly not all of their fragments yet
    inbox: Vec<Packet>,
    link: LinkOccupancy,
    warned_about_burst: bool,
}

impl EndStation {
    pub(crate) fn new(
        id: NodeId,
        name: Arc<str>,
        parent: NodeId,
        generator: Option<TrafficGenerator>,
    ) -> Self {
        Self {
            id,
            name,
            parent,
            generator,
            egress: VecDeque::new(),
            inbox: Vec::new(),
            link: LinkOccupancy::default(),
            warned_about_burst: false,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn traffic_rule(&self) -> Option<&TrafficRule> {
        self.generator.as_ref().map(|g| g.rule())
    }

    /// The destination of the station's traffic, with random destinations already resolved
    pub fn destination(&self) -> Option<NodeId> {
        self.generator.as_ref().map(|g| g.destination())
    }

    pub fn backlog(&self) -> usize {
        self.egress.len()
    }

    pub fn inbox_len(&self) -> usize {
        self.inbox.len()
    }

    pub(crate) fn receive(&mut self, packet: Packet) {
        self.inbox.push(packet);
    }

    /// Releases a packet into the egress queue if the traffic rule says so
    pub(crate) fn generate(&mut self, ctx: &mut SimulationContext<'_>, next_number: &mut u64) {
        let Some(generator) = &mut self.generator else {
            return;
        };

        if !generator.poll_release(ctx.now, ctx.rng) {
            return;
        }

        let packet = generator.build_packet(*next_number, self.id, ctx.now);
        *next_number += 1;

        debug!(
            "tick {}: end station `{}` released packet #{} ({}) for `{}`",
            ctx.now,
            self.id,
            packet.number(),
            packet.class(),
            packet.destination()
        );

        ctx.stats.track_generated();
        ctx.tracer.track_packet_generated(ctx.now, &packet);
        self.egress.push_back(packet);
    }

    /// Sends the oldest waiting packet to the parent switch, if the link is free
    pub(crate) fn flush(&mut self, ctx: &mut SimulationContext<'_>) -> Option<Packet> {
        let link_free = self.link.advance();

        if self.egress.len() > 1 {
            ctx.stats.track_burst(self.id);
            if !self.warned_about_burst {
                self.warned_about_burst = true;
                warn!(
                    "tick {}: end station `{}` has {} packets waiting to be sent (further bursts of this station will not be reported)",
                    ctx.now,
                    self.id,
                    self.egress.len()
                );
            }
        }

        if !link_free {
            return None;
        }

        let packet = self.egress.pop_front()?;
        self.link
            .occupy(transfer_ticks(packet.size_bytes, ctx.byte_budget));
        ctx.tracer
            .track_packet_sent(ctx.now, self.id, self.parent, &packet);

        Some(packet)
    }

    /// Consumes the fully arrived packets in the inbox, checking their deadlines
    ///
    /// All arrived packets are consumed even if one of them misses a hard deadline, in which case
    /// the first miss is reported.
    pub(crate) fn digest(&mut self, ctx: &mut SimulationContext<'_>) -> Result<(), SimulationError> {
        let mut errors = Vec::new();
        for mut packet in mem::take(&mut self.inbox) {
            let transfer = transfer_ticks(packet.size_bytes, ctx.byte_budget);
            if !packet.hop.is_fully_arrived(ctx.now, transfer) {
                self.inbox.push(packet);
                continue;
            }

            if packet.destination != self.id {
                errors.push(SimulationError::MisdeliveredPacket {
                    end_station: self.id,
                    packet: packet.number,
                    destination: packet.destination,
                });
                continue;
            }

            let latency = ctx.now - packet.transmission_tick;
            ctx.stats.track_delivered(&packet, latency);
            ctx.tracer
                .track_packet_delivered(ctx.now, self.id, &packet, latency);

            match packet.deadline() {
                Some(deadline @ Deadline::Hard(ticks)) if latency > ticks => {
                    ctx.tracer
                        .track_deadline_missed(ctx.now, self.id, &packet, latency, deadline);
                    errors.push(SimulationError::HardDeadlineMissed {
                        tick: ctx.now,
                        packet: packet.number,
                        class: packet.class(),
                        origin: packet.origin,
                        destination: packet.destination,
                        latency,
                        deadline: ticks,
                    });
                }
                Some(deadline @ Deadline::Soft(ticks)) if latency > ticks => {
                    warn!(
                        "tick {}: packet #{} from `{}` missed its soft deadline ({latency} > {ticks} ticks)",
                        ctx.now, packet.number, packet.origin
                    );
                    ctx.stats
                        .track_soft_deadline_miss(ctx.now, &packet, latency, ticks);
                    ctx.tracer
                        .track_deadline_missed(ctx.now, self.id, &packet, latency, deadline);
                }
                _ => {}
            }
        }

        match errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::gcl::GateVector;
    use crate::packet::{PacketKind, test_packet};
    use crate::simulation::test_context::TestContext;

    fn station() -> EndStation {
        EndStation::new(NodeId(2), "sink".into(), NodeId(10), None)
    }

    fn st_packet(transmission_tick: u64) -> Packet {
        test_packet(
            0,
            PacketKind::St {
                period: 4,
                hard_deadline: 5,
                max_release_jitter: 0,
            },
            transmission_tick,
        )
    }

    #[test]
    fn test_hard_deadline_exceeded() {
        let mut context = TestContext::new();
        let mut station = station();
        station.receive(st_packet(0));

        let result = station.digest(&mut context.at(7, GateVector::ALL_OPEN));
        assert!(matches!(
            result,
            Err(SimulationError::HardDeadlineMissed {
                latency: 7,
                deadline: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_hard_deadline_met() {
        let mut context = TestContext::new();
        let mut station = station();
        station.receive(st_packet(0));

        station
            .digest(&mut context.at(5, GateVector::ALL_OPEN))
            .unwrap();
        assert_eq!(context.stats.stats().latencies, vec![5]);
    }

    #[test]
    fn test_misdelivery_is_fatal() {
        let mut context = TestContext::new();
        let mut station = EndStation::new(NodeId(3), "other".into(), NodeId(10), None);
        station.receive(st_packet(0));

        let result = station.digest(&mut context.at(1, GateVector::ALL_OPEN));
        assert!(matches!(
            result,
            Err(SimulationError::MisdeliveredPacket { end_station: NodeId(3), .. })
        ));
    }

    #[test]
    fn test_fragmented_packet_waits_for_all_fragments() {
        let mut context = TestContext::new();
        let mut station = station();
        let mut packet = st_packet(0);
        packet.size_bytes = 40;
        station.receive(packet);

        station.digest(&mut context.at(1, GateVector::ALL_OPEN)).unwrap();
        station.digest(&mut context.at(2, GateVector::ALL_OPEN)).unwrap();
        assert!(context.stats.stats().latencies.is_empty());

        station.digest(&mut context.at(3, GateVector::ALL_OPEN)).unwrap();
        assert_eq!(context.stats.stats().latencies, vec![3]);
    }
}
