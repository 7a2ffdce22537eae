use serde::Deserialize;
use tsn_network::network::spec::{TrafficMapping, TrafficSpec};
use tsn_network::traffic::{Destination, TrafficRule, TrafficRuleKind};
use tsn_network::{NodeId, Tick};

#[derive(Deserialize, Clone)]
pub struct TrafficSpecJson {
    rules: Vec<TrafficRuleJson>,
    #[serde(default)]
    mapping: Vec<TrafficMappingJson>,
}

#[derive(Deserialize, Clone)]
struct TrafficRuleJson {
    id: u32,
    #[serde(default = "default_rule_name")]
    name: String,
    #[serde(default)]
    offset: Tick,
    /// The end station receiving the packets, `0` meaning a random one other than the sender
    #[serde(default)]
    destination_id: u32,
    /// The size of each packet, in bytes
    #[serde(default = "default_packet_size")]
    size: u32,
    #[serde(flatten)]
    kind: TrafficRuleKindJson,
}

fn default_rule_name() -> String {
    "unnamed".to_string()
}

fn default_packet_size() -> u32 {
    16
}

#[derive(Deserialize, Clone)]
#[serde(tag = "type")]
enum TrafficRuleKindJson {
    #[serde(rename = "ST")]
    St {
        period: Tick,
        hard_deadline: Tick,
        #[serde(default)]
        max_release_jitter: Tick,
    },
    #[serde(rename = "Sporadic_Hard")]
    SporadicHard {
        min_inter_release: Tick,
        hard_deadline: Tick,
        #[serde(default)]
        max_release_jitter: Tick,
        /// Chance of a release at every tick past the minimum inter-release time
        release_probability: f64,
    },
    #[serde(rename = "Sporadic_Soft")]
    SporadicSoft {
        min_inter_release: Tick,
        soft_deadline: Tick,
        #[serde(default)]
        max_release_jitter: Tick,
        release_probability: f64,
    },
    #[serde(rename = "BE")]
    BestEffort { release_probability: f64 },
}

#[derive(Deserialize, Clone, Copy)]
struct TrafficMappingJson {
    end_station: u32,
    rule: u32,
}

impl From<TrafficRuleKindJson> for TrafficRuleKind {
    fn from(json: TrafficRuleKindJson) -> Self {
        match json {
            TrafficRuleKindJson::St {
                period,
                hard_deadline,
                max_release_jitter,
            } => TrafficRuleKind::St {
                period,
                hard_deadline,
                max_release_jitter,
            },
            TrafficRuleKindJson::SporadicHard {
                min_inter_release,
                hard_deadline,
                max_release_jitter,
                release_probability,
            } => TrafficRuleKind::SporadicHard {
                min_inter_release,
                hard_deadline,
                max_release_jitter,
                release_probability,
            },
            TrafficRuleKindJson::SporadicSoft {
                min_inter_release,
                soft_deadline,
                max_release_jitter,
                release_probability,
            } => TrafficRuleKind::SporadicSoft {
                min_inter_release,
                soft_deadline,
                max_release_jitter,
                release_probability,
            },
            TrafficRuleKindJson::BestEffort {
                release_probability,
            } => TrafficRuleKind::BestEffort {
                release_probability,
            },
        }
    }
}

impl From<TrafficSpecJson> for TrafficSpec {
    fn from(json: TrafficSpecJson) -> Self {
        let rules = json
            .rules
            .into_iter()
            .map(|r| TrafficRule {
                id: r.id,
                name: r.name,
                offset: r.offset,
                destination: match r.destination_id {
                    0 => Destination::Random,
                    id => Destination::Fixed(NodeId(id)),
                },
                size_bytes: r.size,
                kind: r.kind.into(),
            })
            .collect();

        let mapping = json
            .mapping
            .into_iter()
            .map(|m| TrafficMapping {
                end_station: NodeId(m.end_station),
                rule: m.rule,
            })
            .collect();

        TrafficSpec { rules, mapping }
    }
}
