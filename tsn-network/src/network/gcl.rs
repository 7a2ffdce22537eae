use crate::Tick;
use crate::error::ConfigError;
use anyhow::bail;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use tracing::debug;

/// The amount of gates (and lanes) every switch has
pub const GATE_COUNT: usize = 8;

/// Open / closed state of the eight gates, where gate `i` guards lane `i`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GateVector(u8);

impl GateVector {
    pub const ALL_OPEN: GateVector = GateVector(u8::MAX);
    pub const ALL_CLOSED: GateVector = GateVector(0);

    pub fn is_open(self, lane: usize) -> bool {
        lane < GATE_COUNT && self.0 & (1 << lane) != 0
    }
}

impl FromStr for GateVector {
    type Err = anyhow::Error;

    // Parse a string of eight `0` / `1` characters, the leftmost one being gate 0
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.chars().count() != GATE_COUNT {
            bail!("gate vector must have exactly {GATE_COUNT} characters, found `{s}`");
        }

        let mut bits = 0;
        for (gate, c) in s.chars().enumerate() {
            match c {
                '1' => bits |= 1 << gate,
                '0' => {}
                other => bail!("invalid gate state `{other}` in `{s}` (expected `0` or `1`)"),
            }
        }

        Ok(GateVector(bits))
    }
}

impl Display for GateVector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for gate in 0..GATE_COUNT {
            f.write_str(if self.is_open(gate) { "1" } else { "0" })?;
        }

        Ok(())
    }
}

/// A gate schedule as provided by the user, with entries relative to the start of a cycle
#[derive(Clone, Debug)]
pub struct GateControlListSpec {
    pub entries: Vec<(Tick, GateVector)>,
    /// The cycle length, after which the schedule starts over
    pub repeat: Tick,
}

impl GateControlListSpec {
    /// A one-tick cycle in which every gate is always open
    pub fn always_open() -> Self {
        Self {
            entries: vec![(0, GateVector::ALL_OPEN)],
            repeat: 1,
        }
    }
}

/// The gate control list shared by all switches
///
/// Each entry holds until the next one. Once the clock runs past the end of the current cycle,
/// the schedule is re-anchored at the current tick.
pub struct GateControlList {
    /// Cycle-relative schedule, expanded so every tick of the cycle has an entry
    original: BTreeMap<Tick, GateVector>,
    /// The schedule shifted to the start of the current cycle
    active: BTreeMap<Tick, GateVector>,
    cycle_length: Tick,
    cycle_start: Tick,
}

impl GateControlList {
    pub fn new(spec: GateControlListSpec) -> Result<Self, ConfigError> {
        if spec.repeat == 0 {
            return Err(ConfigError::EmptyGateControlCycle);
        }

        let Some(&(first_tick, _)) = spec.entries.first() else {
            return Err(ConfigError::EmptyGateControlList);
        };
        if first_tick != 0 {
            return Err(ConfigError::GateControlListStartsLate { tick: first_tick });
        }

        for window in spec.entries.windows(2) {
            if window[1].0 <= window[0].0 {
                return Err(ConfigError::UnorderedGateControlEntry { tick: window[1].0 });
            }
        }

        let mut explicit = BTreeMap::new();
        for (tick, gates) in spec.entries {
            if tick >= spec.repeat {
                return Err(ConfigError::GateControlEntryBeyondCycle {
                    tick,
                    cycle_length: spec.repeat,
                });
            }

            explicit.insert(tick, gates);
        }

        // Fill the gaps, so the schedule has one entry per tick of the cycle
        let mut original = BTreeMap::new();
        let mut current = GateVector::ALL_CLOSED;
        for tick in 0..spec.repeat {
            if let Some(&gates) = explicit.get(&tick) {
                current = gates;
            }

            original.insert(tick, current);
        }

        Ok(Self {
            active: original.clone(),
            original,
            cycle_length: spec.repeat,
            cycle_start: 0,
        })
    }

    pub fn cycle_length(&self) -> Tick {
        self.cycle_length
    }

    pub fn cycle_start(&self) -> Tick {
        self.cycle_start
    }

    /// Re-anchors the schedule at `tick` if it lies past the end of the current cycle
    ///
    /// Returns true if a new cycle started.
    pub fn advance_to(&mut self, tick: Tick) -> bool {
        if tick < self.cycle_start + self.cycle_length {
            return false;
        }

        self.cycle_start = tick;
        self.active = self
            .original
            .iter()
            .map(|(&offset, &gates)| (offset + tick, gates))
            .collect();

        debug!("gate control list cycle restarted at tick {tick}");
        true
    }

    /// The gate states in force at `tick`, if the current cycle has started
    pub fn state_at(&self, tick: Tick) -> Option<GateVector> {
        self.active
            .range(..=tick)
            .next_back()
            .map(|(_, &gates)| gates)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn gates(s: &str) -> GateVector {
        s.parse().unwrap()
    }

    #[test]
    fn test_gate_vector_parsing() {
        let vector = gates("10110011");
        assert!(vector.is_open(0));
        assert!(!vector.is_open(1));
        assert!(vector.is_open(2));
        assert!(vector.is_open(7));
        assert!(!vector.is_open(8));
        assert_eq!(vector.to_string(), "10110011");

        assert!("1011".parse::<GateVector>().is_err());
        assert!("1011001x".parse::<GateVector>().is_err());
    }

    #[test]
    fn test_entries_hold_until_the_next_one() {
        let gcl = GateControlList::new(GateControlListSpec {
            entries: vec![(0, gates("10000000")), (3, gates("01000000"))],
            repeat: 5,
        })
        .unwrap();

        assert_eq!(gcl.state_at(2), Some(gates("10000000")));
        assert_eq!(gcl.state_at(3), Some(gates("01000000")));
        assert_eq!(gcl.state_at(4), Some(gates("01000000")));
    }

    #[test]
    fn test_schedule_repeats_after_cycle() {
        let entries = vec![
            (0, gates("10000000")),
            (1, gates("01000000")),
            (2, gates("00100000")),
            (3, gates("00010000")),
        ];
        let mut gcl = GateControlList::new(GateControlListSpec {
            entries,
            repeat: 4,
        })
        .unwrap();

        let first_cycle: Vec<_> = (0..4).map(|k| gcl.state_at(k)).collect();

        assert!(!gcl.advance_to(3));
        assert!(gcl.advance_to(4));
        assert_eq!(gcl.cycle_start(), 4);

        let second_cycle: Vec<_> = (0..4).map(|k| gcl.state_at(4 + k)).collect();
        assert_eq!(first_cycle, second_cycle);
    }

    #[test]
    fn test_validation() {
        let late_start = GateControlList::new(GateControlListSpec {
            entries: vec![(1, GateVector::ALL_OPEN)],
            repeat: 4,
        });
        assert!(matches!(
            late_start,
            Err(ConfigError::GateControlListStartsLate { tick: 1 })
        ));

        let unordered = GateControlList::new(GateControlListSpec {
            entries: vec![(0, GateVector::ALL_OPEN), (2, GateVector::ALL_OPEN), (2, GateVector::ALL_CLOSED)],
            repeat: 4,
        });
        assert!(matches!(
            unordered,
            Err(ConfigError::UnorderedGateControlEntry { tick: 2 })
        ));

        let beyond_cycle = GateControlList::new(GateControlListSpec {
            entries: vec![(0, GateVector::ALL_OPEN), (4, GateVector::ALL_OPEN)],
            repeat: 4,
        });
        assert!(matches!(
            beyond_cycle,
            Err(ConfigError::GateControlEntryBeyondCycle { tick: 4, .. })
        ));
    }
}
