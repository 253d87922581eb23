//! Condition trees and their evaluation
//!
//! Conditions are pure predicates over a person at a point in simulated time.
//! They never mutate the person and never fail: anything that cannot be
//! compared (an unset attribute, mismatched types) is simply false.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::core::calendar::{Quantity, TimeUnit};
use crate::core::types::{Code, Timestamp};
use crate::entity::attributes::Value;
use crate::entity::person::{Person, GENDER, RACE};

/// Comparison operator as written in module descriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "is nil")]
    IsNil,
    #[serde(rename = "is not nil")]
    IsNotNil,
}

impl Comparator {
    pub fn is_existence_check(&self) -> bool {
        matches!(self, Comparator::IsNil | Comparator::IsNotNil)
    }

    /// Compare a possibly unset value against an expected one
    pub fn check(&self, actual: Option<&Value>, expected: Option<&Value>) -> bool {
        match self {
            Comparator::IsNil => actual.is_none(),
            Comparator::IsNotNil => actual.is_some(),
            _ => match (actual, expected) {
                (Some(actual), Some(expected)) => self.accepts(actual.compare(expected)),
                _ => false,
            },
        }
    }

    pub fn check_number(&self, actual: Option<f64>, expected: f64) -> bool {
        match self {
            Comparator::IsNil => actual.is_none(),
            Comparator::IsNotNil => actual.is_some(),
            _ => match actual {
                Some(actual) => self.accepts(actual.partial_cmp(&expected)),
                None => false,
            },
        }
    }

    /// Whether an ordering between actual and expected satisfies this operator.
    /// `None` means the values are incomparable, which only `!=` accepts.
    fn accepts(&self, ordering: Option<Ordering>) -> bool {
        let ordering = match ordering {
            Some(o) => o,
            None => return *self == Comparator::Ne,
        };
        match self {
            Comparator::Eq => ordering == Ordering::Equal,
            Comparator::Ne => ordering != Ordering::Equal,
            Comparator::Lt => ordering == Ordering::Less,
            Comparator::Le => ordering != Ordering::Greater,
            Comparator::Gt => ordering == Ordering::Greater,
            Comparator::Ge => ordering != Ordering::Less,
            Comparator::IsNil | Comparator::IsNotNil => false,
        }
    }
}

/// Recursive boolean predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "condition_type")]
pub enum Condition {
    /// True iff every child is true (an empty list is true)
    And { conditions: Vec<Condition> },
    /// True iff any child is true (an empty list is false)
    Or { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
    #[serde(rename = "At Least")]
    AtLeast {
        minimum: usize,
        conditions: Vec<Condition>,
    },
    #[serde(rename = "At Most")]
    AtMost {
        maximum: usize,
        conditions: Vec<Condition>,
    },
    Attribute {
        attribute: String,
        operator: Comparator,
        #[serde(default)]
        value: Option<Value>,
    },
    Age {
        operator: Comparator,
        quantity: f64,
        unit: TimeUnit,
    },
    Gender { gender: String },
    Race { race: String },
    #[serde(rename = "Vital Sign")]
    VitalSign {
        vital_sign: String,
        operator: Comparator,
        value: f64,
    },
    Symptom {
        symptom: String,
        operator: Comparator,
        value: f64,
    },
    #[serde(rename = "Active Condition")]
    ActiveCondition { codes: Vec<Code> },
    #[serde(rename = "Active Medication")]
    ActiveMedication { codes: Vec<Code> },
    /// The named state was entered before, optionally no longer ago than `within`
    PriorState {
        name: String,
        #[serde(default)]
        within: Option<Quantity>,
    },
    True,
    False,
}

impl Condition {
    /// The unconditioned clause: an empty `And`
    pub fn always() -> Self {
        Condition::And { conditions: Vec::new() }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Condition::And { conditions } if conditions.is_empty())
    }

    /// Whether this node combines other conditions
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            Condition::And { .. }
                | Condition::Or { .. }
                | Condition::Not { .. }
                | Condition::AtLeast { .. }
                | Condition::AtMost { .. }
        )
    }

    pub fn evaluate(&self, person: &Person, time: Timestamp) -> bool {
        match self {
            Condition::And { conditions } => conditions.iter().all(|c| c.evaluate(person, time)),
            Condition::Or { conditions } => conditions.iter().any(|c| c.evaluate(person, time)),
            Condition::Not { condition } => !condition.evaluate(person, time),
            Condition::AtLeast { minimum, conditions } => {
                count_true(conditions, person, time) >= *minimum
            }
            Condition::AtMost { maximum, conditions } => {
                count_true(conditions, person, time) <= *maximum
            }
            Condition::Attribute {
                attribute,
                operator,
                value,
            } => operator.check(person.attributes.get(attribute), value.as_ref()),
            Condition::Age {
                operator,
                quantity,
                unit,
            } => {
                let age = person.age(time, *unit) as f64;
                operator.check_number(Some(age), *quantity)
            }
            Condition::Gender { gender } => text_equals(person, GENDER, gender),
            Condition::Race { race } => text_equals(person, RACE, race),
            Condition::VitalSign {
                vital_sign,
                operator,
                value,
            } => operator.check_number(person.vital_sign(vital_sign), *value),
            Condition::Symptom {
                symptom,
                operator,
                value,
            } => operator.check_number(person.record.symptom(symptom), *value),
            Condition::ActiveCondition { codes } => codes
                .iter()
                .any(|c| person.record.conditions.is_active(&c.code)),
            Condition::ActiveMedication { codes } => codes
                .iter()
                .any(|c| person.record.medications.is_active(&c.code)),
            Condition::PriorState { name, within } => match person.last_entered(name) {
                Some(entered) => match within {
                    Some(window) => time - entered <= window.millis(),
                    None => true,
                },
                None => false,
            },
            Condition::True => true,
            Condition::False => false,
        }
    }

    /// Structural checks run once at load time
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Condition::And { conditions }
            | Condition::Or { conditions }
            | Condition::AtLeast { conditions, .. }
            | Condition::AtMost { conditions, .. } => {
                conditions.iter().try_for_each(Condition::validate)
            }
            Condition::Not { condition } => condition.validate(),
            Condition::Attribute {
                attribute,
                operator,
                value,
            } => {
                if !operator.is_existence_check() && value.is_none() {
                    return Err(format!(
                        "Attribute condition on '{}' needs a value to compare against",
                        attribute
                    ));
                }
                Ok(())
            }
            Condition::ActiveCondition { codes } | Condition::ActiveMedication { codes } => {
                if codes.is_empty() {
                    return Err("Active condition/medication check lists no codes".into());
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn count_true(conditions: &[Condition], person: &Person, time: Timestamp) -> usize {
    conditions
        .iter()
        .filter(|c| c.evaluate(person, time))
        .count()
}

fn text_equals(person: &Person, attribute: &str, expected: &str) -> bool {
    person
        .attributes
        .get(attribute)
        .and_then(Value::as_str)
        .map_or(false, |actual| actual == expected)
}
