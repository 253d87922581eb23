//! Runtime state model of a module graph

use serde::Serialize;

use crate::core::calendar::{Quantity, TimeUnit};
use crate::core::rng::EntityRng;
use crate::core::types::Code;
use crate::entity::attributes::Value;
use crate::rules::condition::Condition;
use crate::rules::transition::Transition;

/// How long a Delay (or a Procedure) lasts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DurationSpec {
    Exact(Quantity),
    /// Uniform between `low` and `high` units
    Range { low: f64, high: f64, unit: TimeUnit },
}

impl DurationSpec {
    /// Duration in milliseconds; a range costs one draw, an exact value none
    pub fn sample(&self, rng: &mut EntityRng) -> i64 {
        match self {
            DurationSpec::Exact(quantity) => quantity.millis(),
            DurationSpec::Range { low, high, unit } => unit.to_millis(rng.range(*low, *high)),
        }
    }
}

/// A numeric value written by a state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NumberSpec {
    Exact(f64),
    Range { low: f64, high: f64 },
    Gaussian { mean: f64, standard_deviation: f64 },
}

impl NumberSpec {
    pub fn sample(&self, rng: &mut EntityRng) -> f64 {
        match self {
            NumberSpec::Exact(value) => *value,
            NumberSpec::Range { low, high } => rng.range(*low, *high),
            NumberSpec::Gaussian {
                mean,
                standard_deviation,
            } => rng.gaussian(*mean, *standard_deviation),
        }
    }
}

/// Where an Observation takes its value from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ObservationValue {
    Number(NumberSpec),
    Attribute(String),
    VitalSign(String),
}

/// Which active code an end state stops
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClinicalRef {
    /// The code started by the named onset/order state
    State(String),
    /// The code stored in an attribute (see `assign_to_attribute`)
    Attribute(String),
    Codes(Vec<Code>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StateKind {
    Initial,
    Terminal,
    /// No behavior; only transitions
    Simple,
    Delay(DurationSpec),
    Guard(Condition),
    SetAttribute {
        attribute: String,
        /// `None` clears the attribute
        value: Option<Value>,
    },
    Counter {
        attribute: String,
        delta: f64,
    },
    Encounter {
        class: String,
        codes: Vec<Code>,
    },
    EncounterEnd,
    ConditionOnset {
        codes: Vec<Code>,
        assign_to_attribute: Option<String>,
    },
    ConditionEnd(ClinicalRef),
    MedicationOrder {
        codes: Vec<Code>,
        assign_to_attribute: Option<String>,
    },
    MedicationEnd(ClinicalRef),
    Procedure {
        codes: Vec<Code>,
        duration: Option<DurationSpec>,
    },
    Observation {
        codes: Vec<Code>,
        unit: Option<String>,
        value: ObservationValue,
    },
    VitalSign {
        vital_sign: String,
        unit: Option<String>,
        value: NumberSpec,
    },
    Symptom {
        symptom: String,
        cause: Option<String>,
        value: NumberSpec,
    },
    CallSubmodule(String),
    Death {
        cause: Option<Code>,
    },
}

impl StateKind {
    /// Kind name as written in module descriptions
    pub fn name(&self) -> &'static str {
        match self {
            StateKind::Initial => "Initial",
            StateKind::Terminal => "Terminal",
            StateKind::Simple => "Simple",
            StateKind::Delay(_) => "Delay",
            StateKind::Guard(_) => "Guard",
            StateKind::SetAttribute { .. } => "SetAttribute",
            StateKind::Counter { .. } => "Counter",
            StateKind::Encounter { .. } => "Encounter",
            StateKind::EncounterEnd => "EncounterEnd",
            StateKind::ConditionOnset { .. } => "ConditionOnset",
            StateKind::ConditionEnd(_) => "ConditionEnd",
            StateKind::MedicationOrder { .. } => "MedicationOrder",
            StateKind::MedicationEnd(_) => "MedicationEnd",
            StateKind::Procedure { .. } => "Procedure",
            StateKind::Observation { .. } => "Observation",
            StateKind::VitalSign { .. } => "VitalSign",
            StateKind::Symptom { .. } => "Symptom",
            StateKind::CallSubmodule(_) => "CallSubmodule",
            StateKind::Death { .. } => "Death",
        }
    }

    /// Delay and Guard are the only states that can hold an instance across ticks
    pub fn can_suspend(&self) -> bool {
        matches!(self, StateKind::Delay(_) | StateKind::Guard(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct State {
    pub name: String,
    pub kind: StateKind,
    /// `None` only for Terminal (and optionally Death) states
    pub transition: Option<Transition>,
}

impl State {
    pub fn new(name: &str, kind: StateKind, transition: Option<Transition>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            transition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calendar::MS_PER_DAY;

    #[test]
    fn test_exact_duration_uses_no_randomness() {
        let mut rng = EntityRng::new(1, 1);
        let spec = DurationSpec::Exact(Quantity {
            quantity: 3.0,
            unit: TimeUnit::Days,
        });
        assert_eq!(spec.sample(&mut rng), 3 * MS_PER_DAY);
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn test_range_duration_draws_once() {
        let mut rng = EntityRng::new(1, 1);
        let spec = DurationSpec::Range {
            low: 1.0,
            high: 2.0,
            unit: TimeUnit::Days,
        };
        let millis = spec.sample(&mut rng);
        assert!((MS_PER_DAY..=2 * MS_PER_DAY).contains(&millis));
        assert_eq!(rng.draws(), 1);
    }

    #[test]
    fn test_number_spec() {
        let mut rng = EntityRng::new(2, 2);
        assert_eq!(NumberSpec::Exact(120.0).sample(&mut rng), 120.0);
        let x = NumberSpec::Range { low: 5.0, high: 6.0 }.sample(&mut rng);
        assert!((5.0..6.0).contains(&x));
    }

    #[test]
    fn test_only_delay_and_guard_suspend() {
        assert!(StateKind::Guard(Condition::True).can_suspend());
        assert!(!StateKind::Simple.can_suspend());
        assert!(!StateKind::CallSubmodule("x".into()).can_suspend());
    }
}
