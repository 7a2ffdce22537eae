use crate::error::SimulationError;
use crate::network::link::{LinkOccupancy, transfer_ticks};
use crate::network::queue::{QueueDefinition, QueueType, SwitchQueues, TransmitCandidate};
use crate::network::route::RoutingTable;
use crate::packet::Packet;
use crate::simulation::SimulationContext;
use crate::NodeId;
use std::mem;
use std::sync::Arc;
use tracing::debug;

/// A packet leaving a switch, addressed to the neighbor that receives it
pub(crate) struct Forward {
    pub(crate) recipient: NodeId,
    pub(crate) packet: Packet,
}

pub struct Switch {
    pub(crate) id: NodeId,
    pub(crate) name: Arc<str>,
    pub(crate) routing_table: RoutingTable,
    queues: SwitchQueues,
    /// Packets that reached the switch, possibly not all of their fragments yet
    inbox: Vec<Packet>,
    link: LinkOccupancy,
    candidates: Vec<TransmitCandidate>,
}

impl Switch {
    pub(crate) fn new(
        id: NodeId,
        name: Arc<str>,
        routing_table: RoutingTable,
        queues: &QueueDefinition,
    ) -> Self {
        Self {
            id,
            name,
            routing_table,
            queues: SwitchQueues::new(queues),
            inbox: Vec::new(),
            link: LinkOccupancy::default(),
            candidates: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    /// Amount of packets waiting in each lane, in gate order
    pub fn lane_depths(&self) -> Vec<usize> {
        self.queues.depths()
    }

    pub fn queued_packets(&self) -> usize {
        self.queues.len()
    }

    pub fn inbox_len(&self) -> usize {
        self.inbox.len()
    }

    pub(crate) fn receive(&mut self, packet: Packet) {
        self.inbox.push(packet);
    }

    /// Moves fully arrived packets from the inbox into the lanes of their queue type
    ///
    /// ST packets may be redirected to the emergency lanes, subject to the admission policy.
    pub(crate) fn classify_ingress(
        &mut self,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<(), SimulationError> {
        ctx.rng.shuffle(&mut self.inbox);

        for mut packet in mem::take(&mut self.inbox) {
            let transfer = transfer_ticks(packet.size_bytes, ctx.byte_budget);
            if !packet.hop.is_fully_arrived(ctx.now, transfer) {
                self.inbox.push(packet);
                continue;
            }

            let mut queue_type = QueueType::for_class(packet.class());
            if queue_type == QueueType::St
                && ctx.emergency_probability > 0.0
                && ctx.rng.f64() < ctx.emergency_probability
            {
                let depths = self.queues.depths_of(QueueType::Emergency);
                if !ctx.admission.admit(&packet, &depths) {
                    ctx.stats.track_dropped(ctx.now, self.id, &packet);
                    ctx.tracer.track_packet_dropped(ctx.now, self.id, &packet);
                    continue;
                }

                queue_type = QueueType::Emergency;
            }

            let lane = self
                .queues
                .emptiest_lane(queue_type)
                .ok_or(SimulationError::NoLaneForQueueType {
                    switch_id: self.id,
                    queue_type,
                })?;

            ctx.tracer
                .track_packet_enqueued(ctx.now, self.id, queue_type, lane, &packet);
            self.queues.push(lane, packet);
        }

        Ok(())
    }

    /// Collects the packet each lane with an open gate would transmit
    pub(crate) fn schedule(&mut self, ctx: &SimulationContext<'_>) {
        self.candidates = self.queues.select_candidates(ctx.gates, ctx.now);
    }

    /// Forwards the most urgent candidate, provided the outgoing link is free
    ///
    /// Candidates are discarded at the end of the tick, whether one was forwarded or not.
    pub(crate) fn arbitrate(
        &mut self,
        ctx: &mut SimulationContext<'_>,
    ) -> Result<Option<Forward>, SimulationError> {
        let link_free = self.link.advance();
        let candidates = mem::take(&mut self.candidates);
        if !link_free {
            if !candidates.is_empty() {
                debug!(
                    "tick {}: switch `{}` holds {} candidates while its link is busy",
                    ctx.now,
                    self.id,
                    candidates.len()
                );
            }

            return Ok(None);
        }

        // Lowest priority value wins, the lowest lane among equals
        let Some(chosen) = candidates.iter().min_by_key(|c| c.priority).copied() else {
            return Ok(None);
        };

        if chosen.emergency {
            debug!(
                "tick {}: switch `{}` forwards from emergency lane {}",
                ctx.now, self.id, chosen.lane
            );
        }

        self.transmit(ctx, &chosen).map(Some)
    }

    fn transmit(
        &mut self,
        ctx: &mut SimulationContext<'_>,
        chosen: &TransmitCandidate,
    ) -> Result<Forward, SimulationError> {
        if !self.link.is_idle() {
            return Err(SimulationError::ForwardWhileBusy {
                switch_id: self.id,
                tick: ctx.now,
            });
        }

        let mut packet =
            self.queues
                .remove(chosen)
                .ok_or(SimulationError::StaleCandidate {
                    switch_id: self.id,
                    lane: chosen.lane,
                })?;

        let next_hop = self.routing_table.next_hop(packet.destination).ok_or(
            SimulationError::MissingRoute {
                switch_id: self.id,
                destination: packet.destination,
            },
        )?;

        // The switch itself as next hop means the destination is a direct child
        let recipient = if next_hop == self.id {
            packet.destination
        } else {
            next_hop
        };

        let queue_delay = packet.hop.leave(ctx.now);
        self.link
            .occupy(transfer_ticks(packet.size_bytes, ctx.byte_budget));

        ctx.stats.track_forwarded(self.id, queue_delay);
        ctx.tracer
            .track_packet_sent(ctx.now, self.id, recipient, &packet);

        Ok(Forward { recipient, packet })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::gcl::GateVector;
    use crate::network::route::Route;
    use crate::packet::{PacketKind, TrafficClass, test_packet};
    use crate::simulation::test_context::TestContext;

    const SWITCH: NodeId = NodeId(10);

    fn switch() -> Switch {
        let routes = vec![
            Route {
                end_station: NodeId(1),
                next_hop: SWITCH,
            },
            Route {
                end_station: NodeId(2),
                next_hop: SWITCH,
            },
            Route {
                end_station: NodeId(3),
                next_hop: NodeId(0),
            },
        ];

        Switch::new(
            SWITCH,
            "switch".into(),
            RoutingTable::from_routes(routes),
            &QueueDefinition::default(),
        )
    }

    fn st() -> PacketKind {
        PacketKind::St {
            period: 4,
            hard_deadline: 10,
            max_release_jitter: 0,
        }
    }

    fn soft() -> PacketKind {
        PacketKind::SporadicSoft {
            min_inter_release: 4,
            soft_deadline: 10,
            max_release_jitter: 0,
        }
    }

    #[test]
    fn test_highest_priority_wins() {
        let mut context = TestContext::new();
        let mut switch = switch();
        switch.queues.push(4, test_packet(0, PacketKind::BestEffort, 0));
        switch.queues.push(0, test_packet(1, st(), 0));
        switch.queues.push(3, test_packet(2, soft(), 0));

        let mut forwarded = Vec::new();
        for now in 0..3 {
            let mut ctx = context.at(now, GateVector::ALL_OPEN);
            switch.schedule(&ctx);
            let forward = switch.arbitrate(&mut ctx).unwrap().unwrap();
            forwarded.push(forward.packet.class());
        }

        assert_eq!(
            forwarded,
            vec![
                TrafficClass::St,
                TrafficClass::SporadicSoft,
                TrafficClass::BestEffort
            ]
        );
        assert_eq!(switch.queued_packets(), 0);
    }

    #[test]
    fn test_next_hop_resolution() {
        let mut context = TestContext::new();
        let mut switch = switch();
        switch.queues.push(0, test_packet(0, st(), 0));

        let mut ctx = context.at(0, GateVector::ALL_OPEN);
        switch.schedule(&ctx);
        let forward = switch.arbitrate(&mut ctx).unwrap().unwrap();
        assert_eq!(forward.recipient, NodeId(2));

        let mut packet = test_packet(1, st(), 0);
        packet.destination = NodeId(3);
        switch.queues.push(0, packet);

        let mut ctx = context.at(1, GateVector::ALL_OPEN);
        switch.schedule(&ctx);
        let forward = switch.arbitrate(&mut ctx).unwrap().unwrap();
        assert_eq!(forward.recipient, NodeId(0));
    }

    #[test]
    fn test_missing_route_is_fatal() {
        let mut context = TestContext::new();
        let mut switch = switch();
        let mut packet = test_packet(0, st(), 0);
        packet.destination = NodeId(99);
        switch.queues.push(0, packet);

        let mut ctx = context.at(0, GateVector::ALL_OPEN);
        switch.schedule(&ctx);
        let result = switch.arbitrate(&mut ctx);
        assert!(matches!(
            result,
            Err(SimulationError::MissingRoute {
                destination: NodeId(99),
                ..
            })
        ));
    }

    #[test]
    fn test_busy_link_holds_candidates() {
        let mut context = TestContext::new();
        let mut switch = switch();
        let mut large = test_packet(0, st(), 0);
        large.size_bytes = 40;
        switch.queues.push(0, large);
        switch.queues.push(0, test_packet(1, st(), 0));

        let mut sent_at = Vec::new();
        for now in 0..5 {
            let mut ctx = context.at(now, GateVector::ALL_OPEN);
            switch.schedule(&ctx);
            if switch.arbitrate(&mut ctx).unwrap().is_some() {
                sent_at.push(now);
            }
        }

        assert_eq!(sent_at, vec![0, 3]);
    }

    #[test]
    fn test_closed_gate_blocks_lane() {
        let mut context = TestContext::new();
        let mut switch = switch();
        switch.queues.push(0, test_packet(0, st(), 0));

        let mut ctx = context.at(0, "01111111".parse().unwrap());
        switch.schedule(&ctx);
        assert!(switch.arbitrate(&mut ctx).unwrap().is_none());
        assert_eq!(switch.lane_depths()[0], 1);
    }

    #[test]
    fn test_ingress_waits_for_fragments() {
        let mut context = TestContext::new();
        let mut switch = switch();
        let mut packet = test_packet(0, st(), 0);
        packet.size_bytes = 32;
        switch.receive(packet);

        switch
            .classify_ingress(&mut context.at(1, GateVector::ALL_OPEN))
            .unwrap();
        assert_eq!(switch.inbox_len(), 1);
        assert_eq!(switch.queued_packets(), 0);

        switch
            .classify_ingress(&mut context.at(2, GateVector::ALL_OPEN))
            .unwrap();
        assert_eq!(switch.inbox_len(), 0);
        assert_eq!(switch.lane_depths(), vec![1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_emergency_redirect_uses_emergency_lane() {
        let mut context = TestContext::new();
        let mut switch = switch();
        switch.receive(test_packet(0, st(), 0));
        switch.receive(test_packet(1, PacketKind::BestEffort, 0));

        let mut ctx = context.at(0, GateVector::ALL_OPEN);
        ctx.emergency_probability = 1.0;
        switch.classify_ingress(&mut ctx).unwrap();

        // Only ST packets are redirected
        assert_eq!(switch.lane_depths(), vec![0, 1, 0, 0, 1, 0, 0, 0]);
    }
}
