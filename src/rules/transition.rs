//! Transitions and the resolver that picks a state's successor
//!
//! Resolution consumes exactly one random draw when the chosen rule is
//! probabilistic and none otherwise, so replaying a person with the same seed
//! walks the same path.

use serde::Serialize;

use crate::core::error::EngineError;
use crate::core::rng::EntityRng;
use crate::core::types::Timestamp;
use crate::entity::person::Person;
use crate::rules::condition::Condition;
use crate::rules::lookup::LookupTables;

/// Allowed distance of a weighted list's sum from 1.0
pub const WEIGHT_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Weighted {
    pub target: String,
    pub weight: f64,
}

impl Weighted {
    pub fn new(target: &str, weight: f64) -> Self {
        Self {
            target: target.to_string(),
            weight,
        }
    }
}

pub fn weight_sum(weights: &[Weighted]) -> f64 {
    weights.iter().map(|w| w.weight).sum()
}

pub fn weights_sum_to_one(weights: &[Weighted]) -> bool {
    (weight_sum(weights) - 1.0).abs() <= WEIGHT_TOLERANCE
}

/// Pick from a weighted list with one uniform draw
///
/// The first target whose cumulative weight exceeds the draw wins; rounding
/// slack at the top end goes to the last target.
pub fn pick_weighted<'a>(weights: &'a [Weighted], rng: &mut EntityRng) -> Option<&'a str> {
    let u = rng.uniform();
    let mut cumulative = 0.0;
    for w in weights {
        cumulative += w.weight;
        if u < cumulative {
            return Some(w.target.as_str());
        }
    }
    weights.last().map(|w| w.target.as_str())
}

/// Where a selected clause leads
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Outcome {
    Target(String),
    Weighted(Vec<Weighted>),
}

impl Outcome {
    fn pick<'a>(&'a self, rng: &mut EntityRng) -> Option<&'a str> {
        match self {
            Outcome::Target(target) => Some(target.as_str()),
            Outcome::Weighted(weights) => pick_weighted(weights, rng),
        }
    }

    fn targets(&self) -> Vec<&str> {
        match self {
            Outcome::Target(target) => vec![target.as_str()],
            Outcome::Weighted(weights) => weights.iter().map(|w| w.target.as_str()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clause {
    /// `Condition::always()` for the default clause
    pub condition: Condition,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupTransition {
    pub table: String,
    /// Attributes forming the lookup key, in column order
    pub attributes: Vec<String>,
    /// Used when no row matches
    pub default_probability: f64,
    /// Taken when the draw falls below the probability
    pub positive: String,
    pub alternate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Transition {
    Direct(String),
    Distributed(Vec<Weighted>),
    /// Clauses with leaf conditions only
    Conditional(Vec<Clause>),
    /// Clauses whose conditions may be compound trees
    Complex(Vec<Clause>),
    LookupTable(LookupTransition),
}

impl Transition {
    /// Every state name this transition can lead to
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Transition::Direct(target) => vec![target.as_str()],
            Transition::Distributed(weights) => weights.iter().map(|w| w.target.as_str()).collect(),
            Transition::Conditional(clauses) | Transition::Complex(clauses) => {
                clauses.iter().flat_map(|c| c.outcome.targets()).collect()
            }
            Transition::LookupTable(lookup) => {
                vec![lookup.positive.as_str(), lookup.alternate.as_str()]
            }
        }
    }

    /// Choose the next state
    ///
    /// `Ok(None)` means no clause of a conditional list held.
    pub fn resolve(
        &self,
        person: &mut Person,
        time: Timestamp,
        tables: &LookupTables,
    ) -> Result<Option<&str>, EngineError> {
        match self {
            Transition::Direct(target) => Ok(Some(target.as_str())),
            Transition::Distributed(weights) => Ok(pick_weighted(weights, &mut person.rng)),
            Transition::Conditional(clauses) | Transition::Complex(clauses) => {
                let selected = clauses
                    .iter()
                    .find(|clause| clause.condition.evaluate(person, time));
                Ok(selected.and_then(|clause| clause.outcome.pick(&mut person.rng)))
            }
            Transition::LookupTable(lookup) => {
                if !tables.contains(&lookup.table) {
                    return Err(EngineError::UnknownLookupTable(lookup.table.clone()));
                }
                let key: Vec<_> = lookup
                    .attributes
                    .iter()
                    .map(|name| person.lookup_key(name, time))
                    .collect();
                let probability = tables
                    .probability(&lookup.table, &key)
                    .unwrap_or(lookup.default_probability);

                if person.rng.uniform() < probability {
                    Ok(Some(lookup.positive.as_str()))
                } else {
                    Ok(Some(lookup.alternate.as_str()))
                }
            }
        }
    }
}
