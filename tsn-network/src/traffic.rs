use crate::error::ConfigError;
use crate::packet::{HopTimer, Packet, PacketKind, TrafficClass};
use crate::{NodeId, Tick};
use fastrand::Rng;
use std::sync::Arc;

/// Where the packets of a traffic rule go
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    Fixed(NodeId),
    /// Any end station other than the sender, picked once when the simulation starts
    Random,
}

/// Describes the packets an end station releases into the network
#[derive(Clone, Debug)]
pub struct TrafficRule {
    pub id: u32,
    pub name: String,
    /// First tick at which the rule may release packets
    pub offset: Tick,
    pub destination: Destination,
    pub size_bytes: u32,
    pub kind: TrafficRuleKind,
}

#[derive(Clone, Debug)]
pub enum TrafficRuleKind {
    St {
        period: Tick,
        hard_deadline: Tick,
        max_release_jitter: Tick,
    },
    SporadicHard {
        min_inter_release: Tick,
        hard_deadline: Tick,
        max_release_jitter: Tick,
        release_probability: f64,
    },
    SporadicSoft {
        min_inter_release: Tick,
        soft_deadline: Tick,
        max_release_jitter: Tick,
        release_probability: f64,
    },
    BestEffort {
        release_probability: f64,
    },
}

impl TrafficRuleKind {
    pub fn class(&self) -> TrafficClass {
        self.packet_kind().class()
    }

    fn packet_kind(&self) -> PacketKind {
        match *self {
            TrafficRuleKind::St {
                period,
                hard_deadline,
                max_release_jitter,
            } => PacketKind::St {
                period,
                hard_deadline,
                max_release_jitter,
            },
            TrafficRuleKind::SporadicHard {
                min_inter_release,
                hard_deadline,
                max_release_jitter,
                ..
            } => PacketKind::SporadicHard {
                min_inter_release,
                hard_deadline,
                max_release_jitter,
            },
            TrafficRuleKind::SporadicSoft {
                min_inter_release,
                soft_deadline,
                max_release_jitter,
                ..
            } => PacketKind::SporadicSoft {
                min_inter_release,
                soft_deadline,
                max_release_jitter,
            },
            TrafficRuleKind::BestEffort { .. } => PacketKind::BestEffort,
        }
    }

    fn release_probability(&self) -> Option<f64> {
        match *self {
            TrafficRuleKind::St { .. } => None,
            TrafficRuleKind::SporadicHard {
                release_probability,
                ..
            }
            | TrafficRuleKind::SporadicSoft {
                release_probability,
                ..
            }
            | TrafficRuleKind::BestEffort {
                release_probability,
            } => Some(release_probability),
        }
    }
}

impl TrafficRule {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.size_bytes == 0 {
            return Err(ConfigError::ZeroPacketSize { rule: self.id });
        }

        let interval = match self.kind {
            TrafficRuleKind::St { period, .. } => Some(period),
            TrafficRuleKind::SporadicHard {
                min_inter_release, ..
            }
            | TrafficRuleKind::SporadicSoft {
                min_inter_release, ..
            } => Some(min_inter_release),
            TrafficRuleKind::BestEffort { .. } => None,
        };
        if interval == Some(0) {
            return Err(ConfigError::ZeroPeriod { rule: self.id });
        }

        if let Some(probability) = self.kind.release_probability() {
            if !(0.0..=1.0).contains(&probability) {
                return Err(ConfigError::InvalidReleaseProbability {
                    rule: self.id,
                    probability,
                });
            }
        }

        Ok(())
    }
}

/// Decides, tick by tick, whether an end station releases a new packet
#[derive(Clone, Debug)]
pub(crate) struct TrafficGenerator {
    rule: TrafficRule,
    name: Arc<str>,
    destination: NodeId,
    last_release: Option<Tick>,
}

impl TrafficGenerator {
    pub(crate) fn new(rule: TrafficRule, destination: NodeId) -> Self {
        Self {
            name: rule.name.as_str().into(),
            rule,
            destination,
            last_release: None,
        }
    }

    pub(crate) fn destination(&self) -> NodeId {
        self.destination
    }

    pub(crate) fn rule(&self) -> &TrafficRule {
        &self.rule
    }

    /// Returns true if a packet must be released at `now`
    ///
    /// Probabilistic rules only draw from `rng` on ticks where they are eligible to release.
    pub(crate) fn poll_release(&mut self, now: Tick, rng: &mut Rng) -> bool {
        if now < self.rule.offset {
            return false;
        }

        let release = match self.rule.kind {
            TrafficRuleKind::St { period, .. } => (now - self.rule.offset) % period == 0,
            TrafficRuleKind::SporadicHard {
                min_inter_release,
                release_probability,
                ..
            }
            | TrafficRuleKind::SporadicSoft {
                min_inter_release,
                release_probability,
                ..
            } => {
                let eligible = self
                    .last_release
                    .is_none_or(|last| now - last >= min_inter_release);
                eligible && rng.f64() < release_probability
            }
            TrafficRuleKind::BestEffort {
                release_probability,
            } => rng.f64() < release_probability,
        };

        if release {
            self.last_release = Some(now);
        }

        release
    }

    pub(crate) fn build_packet(&self, number: u64, origin: NodeId, now: Tick) -> Packet {
        Packet {
            number,
            origin,
            destination: self.destination,
            name: self.name.clone(),
            size_bytes: self.rule.size_bytes,
            kind: self.rule.kind.packet_kind(),
            transmission_tick: now,
            hop: HopTimer::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn rule(offset: Tick, kind: TrafficRuleKind) -> TrafficRule {
        TrafficRule {
            id: 1,
            name: "test".to_string(),
            offset,
            destination: Destination::Fixed(NodeId(2)),
            size_bytes: 16,
            kind,
        }
    }

    fn releases(generator: &mut TrafficGenerator, ticks: Tick) -> Vec<Tick> {
        let mut rng = Rng::with_seed(42);
        (0..ticks)
            .filter(|&tick| generator.poll_release(tick, &mut rng))
            .collect()
    }

    #[test]
    fn test_st_releases_every_period_after_offset() {
        let mut generator = TrafficGenerator::new(
            rule(
                3,
                TrafficRuleKind::St {
                    period: 4,
                    hard_deadline: 4,
                    max_release_jitter: 0,
                },
            ),
            NodeId(2),
        );

        assert_eq!(releases(&mut generator, 16), vec![3, 7, 11, 15]);
    }

    #[test]
    fn test_sporadic_respects_min_inter_release() {
        let mut generator = TrafficGenerator::new(
            rule(
                0,
                TrafficRuleKind::SporadicHard {
                    min_inter_release: 3,
                    hard_deadline: 10,
                    max_release_jitter: 0,
                    release_probability: 1.0,
                },
            ),
            NodeId(2),
        );

        assert_eq!(releases(&mut generator, 10), vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_sporadic_never_releases_with_zero_probability() {
        let mut generator = TrafficGenerator::new(
            rule(
                0,
                TrafficRuleKind::SporadicSoft {
                    min_inter_release: 1,
                    soft_deadline: 10,
                    max_release_jitter: 0,
                    release_probability: 0.0,
                },
            ),
            NodeId(2),
        );

        assert!(releases(&mut generator, 100).is_empty());
    }

    #[test]
    fn test_best_effort_honors_offset() {
        let mut generator = TrafficGenerator::new(
            rule(
                5,
                TrafficRuleKind::BestEffort {
                    release_probability: 1.0,
                },
            ),
            NodeId(2),
        );

        assert_eq!(releases(&mut generator, 8), vec![5, 6, 7]);
    }

    #[test]
    fn test_built_packet_carries_rule_attributes() {
        let generator = TrafficGenerator::new(
            rule(
                0,
                TrafficRuleKind::St {
                    period: 4,
                    hard_deadline: 6,
                    max_release_jitter: 1,
                },
            ),
            NodeId(2),
        );

        let packet = generator.build_packet(7, NodeId(1), 12);
        assert_eq!(packet.number(), 7);
        assert_eq!(packet.origin(), NodeId(1));
        assert_eq!(packet.destination(), NodeId(2));
        assert_eq!(packet.transmission_tick(), 12);
        assert_eq!(packet.class(), TrafficClass::St);
        assert_eq!(packet.deadline().map(|d| d.ticks()), Some(6));
    }

    #[test]
    fn test_validation() {
        let zero_period = rule(
            0,
            TrafficRuleKind::St {
                period: 0,
                hard_deadline: 4,
                max_release_jitter: 0,
            },
        );
        assert_eq!(
            zero_period.validate(),
            Err(ConfigError::ZeroPeriod { rule: 1 })
        );

        let bad_probability = rule(
            0,
            TrafficRuleKind::BestEffort {
                release_probability: 1.5,
            },
        );
        assert!(matches!(
            bad_probability.validate(),
            Err(ConfigError::InvalidReleaseProbability { rule: 1, .. })
        ));
    }
}
