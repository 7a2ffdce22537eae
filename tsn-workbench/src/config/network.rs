use serde::Deserialize;
use tsn_network::NodeId;
use tsn_network::network::queue::{QueueDefinition, QueueGroupSpec, QueueType, SchedulingPolicy};
use tsn_network::network::spec::{NetworkNodeSpec, NetworkSpec, NodeKind};

#[derive(Deserialize, Clone)]
pub struct NetworkSpecJson {
    nodes: Vec<NetworkNodeJson>,
}

#[derive(Deserialize, Clone)]
struct NetworkNodeJson {
    id: u32,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    kind: NetworkNodeKindJson,
    #[serde(default)]
    parent: Option<u32>,
    /// Only meaningful for switches and the controller
    #[serde(default)]
    queues: Option<QueueDefinitionJson>,
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
enum NetworkNodeKindJson {
    Controller,
    Switch,
    EndStation,
}

/// Queue types left out keep their default lane layout
#[derive(Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct QueueDefinitionJson {
    st: Option<QueueGroupJson>,
    emergency: Option<QueueGroupJson>,
    sporadic_hard: Option<QueueGroupJson>,
    sporadic_soft: Option<QueueGroupJson>,
    be: Option<QueueGroupJson>,
}

#[derive(Deserialize, Clone, Copy)]
struct QueueGroupJson {
    count: usize,
    #[serde(default)]
    schedule: SchedulingPolicy,
}

impl From<QueueDefinitionJson> for QueueDefinition {
    fn from(json: QueueDefinitionJson) -> Self {
        let groups = [
            (QueueType::St, json.st),
            (QueueType::Emergency, json.emergency),
            (QueueType::SporadicHard, json.sporadic_hard),
            (QueueType::SporadicSoft, json.sporadic_soft),
            (QueueType::BestEffort, json.be),
        ];

        groups
            .into_iter()
            .fold(QueueDefinition::default(), |definition, (queue_type, group)| {
                match group {
                    Some(group) => definition.with_group(
                        queue_type,
                        QueueGroupSpec {
                            count: group.count,
                            policy: group.schedule,
                        },
                    ),
                    None => definition,
                }
            })
    }
}

impl From<NetworkSpecJson> for NetworkSpec {
    fn from(json: NetworkSpecJson) -> Self {
        let nodes = json
            .nodes
            .into_iter()
            .map(|n| NetworkNodeSpec {
                id: NodeId(n.id),
                name: n.name.unwrap_or_else(|| format!("node-{}", n.id)),
                kind: match n.kind {
                    NetworkNodeKindJson::Controller => NodeKind::Controller,
                    NetworkNodeKindJson::Switch => NodeKind::Switch,
                    NetworkNodeKindJson::EndStation => NodeKind::EndStation,
                },
                parent: n.parent.map(NodeId),
                queues: n.queues.map(QueueDefinition::from),
            })
            .collect();

        NetworkSpec { nodes }
    }
}
