//! Module description schema types for JSON deserialization.
//!
//! These mirror the on-disk format one to one. The loader converts them into
//! the runtime graph in `modules::state` / `modules::graph` and validates the
//! result; nothing here is used while simulating.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::fmt;

use crate::core::calendar::{Quantity, TimeUnit};
use crate::core::types::Code;
use crate::entity::attributes::Value;
use crate::rules::condition::Condition;

/// Top-level module description
#[derive(Debug, Deserialize)]
pub struct ModuleDef {
    pub name: String,
    #[serde(default)]
    pub submodule: bool,
    /// Free-form notes; ignored
    #[serde(default)]
    pub remarks: Vec<String>,
    pub states: StateEntries,
}

/// The `states` object, in declaration order and with duplicate keys kept
///
/// A plain map would silently let a later duplicate overwrite an earlier one;
/// the loader needs to see both to reject the module.
#[derive(Debug, Default)]
pub struct StateEntries(pub Vec<(String, JsonValue)>);

impl<'de> Deserialize<'de> for StateEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = StateEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of state names to state definitions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<StateEntries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, def)) = map.next_entry::<String, JsonValue>()? {
                    entries.push((name, def));
                }
                Ok(StateEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Counter direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterAction {
    Increment,
    Decrement,
}

fn default_amount() -> f64 {
    1.0
}

/// `{"quantity": 3, "unit": "days"}`; the unit is required for durations only
#[derive(Debug, Clone, Deserialize)]
pub struct ExactDef {
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<TimeUnit>,
}

/// `{"low": 1, "high": 3, "unit": "weeks"}`; the unit is required for durations only
#[derive(Debug, Clone, Deserialize)]
pub struct RangeDef {
    pub low: f64,
    pub high: f64,
    #[serde(default)]
    pub unit: Option<TimeUnit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GaussianDef {
    pub mean: f64,
    pub standard_deviation: f64,
}

/// The kind-specific part of a state, tagged by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum StateDef {
    Initial,
    Terminal,
    Simple,
    Delay {
        exact: Option<ExactDef>,
        range: Option<RangeDef>,
    },
    Guard {
        allow: Condition,
    },
    SetAttribute {
        attribute: String,
        #[serde(default)]
        value: Option<Value>,
    },
    Counter {
        attribute: String,
        action: CounterAction,
        #[serde(default = "default_amount")]
        amount: f64,
    },
    Encounter {
        #[serde(default)]
        encounter_class: Option<String>,
        #[serde(default)]
        codes: Vec<Code>,
    },
    EncounterEnd,
    ConditionOnset {
        codes: Vec<Code>,
        #[serde(default)]
        assign_to_attribute: Option<String>,
    },
    ConditionEnd {
        condition_onset: Option<String>,
        referenced_by_attribute: Option<String>,
        codes: Option<Vec<Code>>,
    },
    MedicationOrder {
        codes: Vec<Code>,
        #[serde(default)]
        assign_to_attribute: Option<String>,
    },
    MedicationEnd {
        medication_order: Option<String>,
        referenced_by_attribute: Option<String>,
        codes: Option<Vec<Code>>,
    },
    Procedure {
        codes: Vec<Code>,
        duration: Option<RangeDef>,
    },
    Observation {
        codes: Vec<Code>,
        unit: Option<String>,
        exact: Option<ExactDef>,
        range: Option<RangeDef>,
        gaussian: Option<GaussianDef>,
        attribute: Option<String>,
        vital_sign: Option<String>,
    },
    VitalSign {
        vital_sign: String,
        unit: Option<String>,
        exact: Option<ExactDef>,
        range: Option<RangeDef>,
        gaussian: Option<GaussianDef>,
    },
    Symptom {
        symptom: String,
        cause: Option<String>,
        exact: Option<ExactDef>,
        range: Option<RangeDef>,
        gaussian: Option<GaussianDef>,
    },
    CallSubmodule {
        submodule: String,
    },
    Death {
        #[serde(default)]
        codes: Vec<Code>,
    },
}

impl StateDef {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StateDef::Terminal)
    }

    pub fn is_death(&self) -> bool {
        matches!(self, StateDef::Death { .. })
    }
}

/// `{"transition": "A", "distribution": 0.25}`
#[derive(Debug, Clone, Deserialize)]
pub struct WeightedDef {
    pub transition: String,
    pub distribution: f64,
}

/// One clause of a conditional or complex transition
///
/// A clause without `condition` is the default clause. Conditional clauses name
/// a single `transition`; complex clauses may instead carry `distributions`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClauseDef {
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub transition: Option<String>,
    #[serde(default)]
    pub distributions: Option<Vec<WeightedDef>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookupTransitionDef {
    pub table: String,
    pub attributes: Vec<String>,
    #[serde(default)]
    pub default_probability: f64,
    pub transition: String,
    pub alternate: String,
}

/// The transition part of a state; at most one field may be set
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransitionDef {
    pub direct_transition: Option<String>,
    pub distributed_transition: Option<Vec<WeightedDef>>,
    pub conditional_transition: Option<Vec<ClauseDef>>,
    pub complex_transition: Option<Vec<ClauseDef>>,
    pub lookup_table_transition: Option<LookupTransitionDef>,
}

impl TransitionDef {
    /// Number of transition fields present
    pub fn declared(&self) -> usize {
        [
            self.direct_transition.is_some(),
            self.distributed_transition.is_some(),
            self.conditional_transition.is_some(),
            self.complex_transition.is_some(),
            self.lookup_table_transition.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

impl ExactDef {
    /// Duration form; `None` when the unit is missing
    pub fn as_quantity(&self) -> Option<Quantity> {
        self.unit.map(|unit| Quantity {
            quantity: self.quantity,
            unit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_state_keys_are_kept() {
        let def: ModuleDef = serde_json::from_str(
            r#"{
                "name": "dup",
                "states": {
                    "Initial": {"type": "Initial", "direct_transition": "Terminal"},
                    "Terminal": {"type": "Terminal"},
                    "Terminal": {"type": "Terminal"}
                }
            }"#,
        )
        .unwrap();
        let names: Vec<_> = def.states.0.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Initial", "Terminal", "Terminal"]);
    }

    #[test]
    fn test_state_and_transition_parse_from_same_object() {
        let raw: JsonValue = serde_json::from_str(
            r#"{
                "type": "Counter",
                "attribute": "visits",
                "action": "increment",
                "direct_transition": "Next"
            }"#,
        )
        .unwrap();
        let state: StateDef = serde_json::from_value(raw.clone()).unwrap();
        let transition: TransitionDef = serde_json::from_value(raw).unwrap();

        match state {
            StateDef::Counter { amount, action, .. } => {
                assert_eq!(amount, 1.0);
                assert_eq!(action, CounterAction::Increment);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(transition.direct_transition.as_deref(), Some("Next"));
        assert_eq!(transition.declared(), 1);
    }

    #[test]
    fn test_complex_clause_with_distributions() {
        let clauses: Vec<ClauseDef> = serde_json::from_str(
            r#"[
                {
                    "condition": {"condition_type": "Attribute", "attribute": "urban_rural_status", "operator": "==", "value": "urban"},
                    "distributions": [
                        {"transition": "Onset", "distribution": 0.25},
                        {"transition": "No_Onset", "distribution": 0.75}
                    ]
                },
                {"transition": "No_Onset"}
            ]"#,
        )
        .unwrap();
        assert_eq!(clauses.len(), 2);
        assert!(clauses[0].condition.is_some());
        assert_eq!(clauses[0].distributions.as_ref().map(Vec::len), Some(2));
        assert!(clauses[1].condition.is_none());
    }

    #[test]
    fn test_unknown_state_type_fails() {
        let raw: JsonValue = serde_json::from_str(r#"{"type": "Teleport"}"#).unwrap();
        assert!(serde_json::from_value::<StateDef>(raw).is_err());
    }
}
