use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use tsn_network::Tick;
use tsn_network::network::gcl::{GateControlListSpec, GateVector};

#[derive(Deserialize, Clone, Debug)]
pub struct GateControlListJson {
    entries: Vec<GateControlEntryJson>,
    /// The length of the cycle, after which the entries apply again
    repeat: Tick,
}

#[serde_as]
#[derive(Deserialize, Clone, Debug)]
struct GateControlEntryJson {
    tick: Tick,
    /// Eight `0` / `1` characters, the leftmost one controlling lane 0
    #[serde_as(as = "DisplayFromStr")]
    gates: GateVector,
}

impl From<GateControlListJson> for GateControlListSpec {
    fn from(json: GateControlListJson) -> Self {
        GateControlListSpec {
            entries: json.entries.into_iter().map(|e| (e.tick, e.gates)).collect(),
            repeat: json.repeat,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_gcl() {
        let json = r#"{
            "entries": [
                { "tick": 0, "gates": "10000000" },
                { "tick": 3, "gates": "01111111" }
            ],
            "repeat": 6
        }"#;

        let spec: GateControlListSpec = serde_json::from_str::<GateControlListJson>(json)
            .unwrap()
            .into();
        assert_eq!(spec.repeat, 6);
        assert_eq!(spec.entries.len(), 2);
        assert!(spec.entries[0].1.is_open(0));
        assert!(!spec.entries[0].1.is_open(1));
        assert_eq!(spec.entries[1].0, 3);
        assert_eq!(spec.entries[1].1.to_string(), "01111111");
    }

    #[test]
    fn test_malformed_gate_vector() {
        let json = r#"{ "entries": [{ "tick": 0, "gates": "1012" }], "repeat": 1 }"#;
        assert!(serde_json::from_str::<GateControlListJson>(json).is_err());
    }
}
