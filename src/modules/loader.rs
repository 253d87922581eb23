//! Load module descriptions into validated runtime graphs
//!
//! Everything that can be checked within a single module is checked here.
//! Cross-module references (submodules, lookup tables) are left to the
//! registry, which sees the whole module set.

use ahash::AHashMap;
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;

use crate::core::calendar::Quantity;
use crate::core::error::LoadError;
use crate::core::types::Code;
use crate::modules::graph::Module;
use crate::modules::schema::{
    ClauseDef, CounterAction, ExactDef, GaussianDef, ModuleDef, RangeDef, StateDef, TransitionDef,
    WeightedDef,
};
use crate::modules::state::{
    ClinicalRef, DurationSpec, NumberSpec, ObservationValue, State, StateKind,
};
use crate::rules::condition::Condition;
use crate::rules::transition::{
    weight_sum, weights_sum_to_one, Clause, LookupTransition, Outcome, Transition, Weighted,
};

/// Parse and validate one module description
pub fn parse_module(json: &str) -> Result<Module, LoadError> {
    let def: ModuleDef = serde_json::from_str(json)?;
    build_module(def)
}

/// Read, parse and validate one module file
pub fn load_module_file(path: &Path) -> Result<Module, LoadError> {
    let content = fs::read_to_string(path)?;
    parse_module(&content)
}

/// Convert a parsed description into a validated graph
pub fn build_module(def: ModuleDef) -> Result<Module, LoadError> {
    let module_name = def.name;
    let ctx = Ctx {
        module: &module_name,
    };

    let mut states: AHashMap<String, State> = AHashMap::with_capacity(def.states.0.len());
    let mut order = Vec::with_capacity(def.states.0.len());

    for (name, raw) in def.states.0 {
        if states.contains_key(&name) {
            return Err(LoadError::DuplicateState {
                module: module_name.clone(),
                state: name,
            });
        }
        let state = ctx.convert_state(&name, raw)?;
        order.push(name.clone());
        states.insert(name, state);
    }

    let initials: Vec<String> = order
        .iter()
        .filter(|name| {
            states
                .get(name.as_str())
                .map_or(false, |s| matches!(s.kind, StateKind::Initial))
        })
        .cloned()
        .collect();
    let initial = match initials.len() {
        0 => {
            return Err(LoadError::MissingInitial {
                module: module_name,
            })
        }
        1 => initials[0].clone(),
        _ => {
            return Err(LoadError::MultipleInitial {
                module: module_name,
                states: initials,
            })
        }
    };

    let module = Module::from_parts(module_name, def.submodule, states, order, initial);
    validate_graph(&module)?;
    Ok(module)
}

/// Checks that need the complete state set of one module
fn validate_graph(module: &Module) -> Result<(), LoadError> {
    for state in module.states() {
        if let Some(transition) = &state.transition {
            for target in transition.targets() {
                if module.state(target).is_none() {
                    return Err(LoadError::MissingTarget {
                        module: module.name.clone(),
                        state: state.name.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }

        let reference = match &state.kind {
            StateKind::ConditionEnd(ClinicalRef::State(target)) => Some((target, "ConditionOnset")),
            StateKind::MedicationEnd(ClinicalRef::State(target)) => {
                Some((target, "MedicationOrder"))
            }
            _ => None,
        };
        if let Some((target, expected)) = reference {
            let found = module.state(target).map(|s| s.kind.name());
            if found != Some(expected) {
                return Err(LoadError::InvalidState {
                    module: module.name.clone(),
                    state: state.name.clone(),
                    reason: format!("'{}' is not a {} state", target, expected),
                });
            }
        }
    }

    let reachable = module.reachable();
    let terminal_reachable = module.states().any(|state| {
        matches!(state.kind, StateKind::Terminal) && reachable.contains(state.name.as_str())
    });
    if !terminal_reachable {
        return Err(LoadError::NoReachableTerminal {
            module: module.name.clone(),
        });
    }

    for state in module.states() {
        if !reachable.contains(state.name.as_str()) {
            tracing::warn!(
                "Module '{}': state '{}' is unreachable from the Initial state",
                module.name,
                state.name
            );
        }
    }

    Ok(())
}

struct Ctx<'a> {
    module: &'a str,
}

impl<'a> Ctx<'a> {
    fn invalid(&self, state: &str, reason: impl Into<String>) -> LoadError {
        LoadError::InvalidState {
            module: self.module.to_string(),
            state: state.to_string(),
            reason: reason.into(),
        }
    }

    fn convert_state(&self, name: &str, raw: JsonValue) -> Result<State, LoadError> {
        let transition_def: TransitionDef = serde_json::from_value(raw.clone())
            .map_err(|e| self.invalid(name, format!("bad transition: {}", e)))?;
        let kind_def: StateDef =
            serde_json::from_value(raw).map_err(|e| self.invalid(name, e.to_string()))?;

        match transition_def.declared() {
            0 if kind_def.is_terminal() || kind_def.is_death() => {}
            0 => {
                return Err(LoadError::MissingTransition {
                    module: self.module.to_string(),
                    state: name.to_string(),
                })
            }
            1 if kind_def.is_terminal() => {
                return Err(LoadError::UnexpectedTransition {
                    module: self.module.to_string(),
                    state: name.to_string(),
                })
            }
            1 => {}
            _ => {
                return Err(LoadError::MultipleTransitions {
                    module: self.module.to_string(),
                    state: name.to_string(),
                })
            }
        }

        let kind = self.convert_kind(name, kind_def)?;
        let transition = self.convert_transition(name, transition_def)?;
        Ok(State::new(name, kind, transition))
    }

    fn convert_kind(&self, name: &str, def: StateDef) -> Result<StateKind, LoadError> {
        let kind = match def {
            StateDef::Initial => StateKind::Initial,
            StateDef::Terminal => StateKind::Terminal,
            StateDef::Simple => StateKind::Simple,
            StateDef::Delay { exact, range } => {
                let duration = match (exact, range) {
                    (Some(exact), None) => self.exact_duration(name, &exact)?,
                    (None, Some(range)) => self.range_duration(name, &range)?,
                    _ => return Err(self.invalid(name, "Delay needs exactly one of exact/range")),
                };
                StateKind::Delay(duration)
            }
            StateDef::Guard { allow } => {
                allow.validate().map_err(|reason| self.invalid(name, reason))?;
                StateKind::Guard(allow)
            }
            StateDef::SetAttribute { attribute, value } => {
                StateKind::SetAttribute { attribute, value }
            }
            StateDef::Counter {
                attribute,
                action,
                amount,
            } => StateKind::Counter {
                attribute,
                delta: match action {
                    CounterAction::Increment => amount,
                    CounterAction::Decrement => -amount,
                },
            },
            StateDef::Encounter {
                encounter_class,
                codes,
            } => StateKind::Encounter {
                class: encounter_class.unwrap_or_else(|| "ambulatory".to_string()),
                codes,
            },
            StateDef::EncounterEnd => StateKind::EncounterEnd,
            StateDef::ConditionOnset {
                codes,
                assign_to_attribute,
            } => {
                self.require_codes(name, &codes)?;
                StateKind::ConditionOnset {
                    codes,
                    assign_to_attribute,
                }
            }
            StateDef::ConditionEnd {
                condition_onset,
                referenced_by_attribute,
                codes,
            } => StateKind::ConditionEnd(self.clinical_ref(
                name,
                condition_onset,
                referenced_by_attribute,
                codes,
            )?),
            StateDef::MedicationOrder {
                codes,
                assign_to_attribute,
            } => {
                self.require_codes(name, &codes)?;
                StateKind::MedicationOrder {
                    codes,
                    assign_to_attribute,
                }
            }
            StateDef::MedicationEnd {
                medication_order,
                referenced_by_attribute,
                codes,
            } => StateKind::MedicationEnd(self.clinical_ref(
                name,
                medication_order,
                referenced_by_attribute,
                codes,
            )?),
            StateDef::Procedure { codes, duration } => {
                self.require_codes(name, &codes)?;
                let duration = match duration {
                    Some(range) => Some(self.range_duration(name, &range)?),
                    None => None,
                };
                StateKind::Procedure { codes, duration }
            }
            StateDef::Observation {
                codes,
                unit,
                exact,
                range,
                gaussian,
                attribute,
                vital_sign,
            } => {
                self.require_codes(name, &codes)?;
                let no_number = exact.is_none() && range.is_none() && gaussian.is_none();
                let value = match (attribute, vital_sign) {
                    (None, None) => {
                        ObservationValue::Number(self.number(name, exact, range, gaussian)?)
                    }
                    (Some(attribute), None) if no_number => ObservationValue::Attribute(attribute),
                    (None, Some(vital_sign)) if no_number => ObservationValue::VitalSign(vital_sign),
                    _ => {
                        return Err(self.invalid(name, "Observation needs exactly one value source"))
                    }
                };
                StateKind::Observation { codes, unit, value }
            }
            StateDef::VitalSign {
                vital_sign,
                unit,
                exact,
                range,
                gaussian,
            } => StateKind::VitalSign {
                vital_sign,
                unit,
                value: self.number(name, exact, range, gaussian)?,
            },
            StateDef::Symptom {
                symptom,
                cause,
                exact,
                range,
                gaussian,
            } => StateKind::Symptom {
                symptom,
                cause,
                value: self.number(name, exact, range, gaussian)?,
            },
            StateDef::CallSubmodule { submodule } => StateKind::CallSubmodule(submodule),
            StateDef::Death { codes } => StateKind::Death {
                cause: codes.into_iter().next(),
            },
        };
        Ok(kind)
    }

    fn require_codes(&self, name: &str, codes: &[Code]) -> Result<(), LoadError> {
        if codes.is_empty() {
            return Err(self.invalid(name, "at least one code is required"));
        }
        Ok(())
    }

    fn exact_duration(&self, name: &str, exact: &ExactDef) -> Result<DurationSpec, LoadError> {
        let quantity: Quantity = exact
            .as_quantity()
            .ok_or_else(|| self.invalid(name, "duration needs a unit"))?;
        if quantity.quantity < 0.0 {
            return Err(self.invalid(name, "duration must not be negative"));
        }
        Ok(DurationSpec::Exact(quantity))
    }

    fn range_duration(&self, name: &str, range: &RangeDef) -> Result<DurationSpec, LoadError> {
        let unit = range
            .unit
            .ok_or_else(|| self.invalid(name, "duration needs a unit"))?;
        if range.low < 0.0 || range.low > range.high {
            return Err(self.invalid(
                name,
                format!("invalid duration range [{}, {}]", range.low, range.high),
            ));
        }
        Ok(DurationSpec::Range {
            low: range.low,
            high: range.high,
            unit,
        })
    }

    fn number(
        &self,
        name: &str,
        exact: Option<ExactDef>,
        range: Option<RangeDef>,
        gaussian: Option<GaussianDef>,
    ) -> Result<NumberSpec, LoadError> {
        match (exact, range, gaussian) {
            (Some(exact), None, None) => Ok(NumberSpec::Exact(exact.quantity)),
            (None, Some(range), None) => {
                if range.low > range.high {
                    return Err(self.invalid(
                        name,
                        format!("invalid range [{}, {}]", range.low, range.high),
                    ));
                }
                Ok(NumberSpec::Range {
                    low: range.low,
                    high: range.high,
                })
            }
            (None, None, Some(gaussian)) => {
                if gaussian.standard_deviation < 0.0 {
                    return Err(self.invalid(name, "standard deviation must not be negative"));
                }
                Ok(NumberSpec::Gaussian {
                    mean: gaussian.mean,
                    standard_deviation: gaussian.standard_deviation,
                })
            }
            _ => Err(self.invalid(name, "needs exactly one of exact/range/gaussian")),
        }
    }

    fn clinical_ref(
        &self,
        name: &str,
        state: Option<String>,
        attribute: Option<String>,
        codes: Option<Vec<Code>>,
    ) -> Result<ClinicalRef, LoadError> {
        match (state, attribute, codes) {
            (Some(state), None, None) => Ok(ClinicalRef::State(state)),
            (None, Some(attribute), None) => Ok(ClinicalRef::Attribute(attribute)),
            (None, None, Some(codes)) => {
                self.require_codes(name, &codes)?;
                Ok(ClinicalRef::Codes(codes))
            }
            _ => Err(self.invalid(
                name,
                "needs exactly one of a state reference, an attribute reference or codes",
            )),
        }
    }

    fn convert_transition(
        &self,
        name: &str,
        def: TransitionDef,
    ) -> Result<Option<Transition>, LoadError> {
        if let Some(target) = def.direct_transition {
            return Ok(Some(Transition::Direct(target)));
        }
        if let Some(weights) = def.distributed_transition {
            return Ok(Some(Transition::Distributed(self.weights(name, weights)?)));
        }
        if let Some(clauses) = def.conditional_transition {
            return Ok(Some(Transition::Conditional(
                self.clauses(name, clauses, false)?,
            )));
        }
        if let Some(clauses) = def.complex_transition {
            return Ok(Some(Transition::Complex(self.clauses(name, clauses, true)?)));
        }
        if let Some(lookup) = def.lookup_table_transition {
            if lookup.attributes.is_empty() {
                return Err(self.invalid(name, "lookup transition lists no attributes"));
            }
            if !(0.0..=1.0).contains(&lookup.default_probability) {
                return Err(self.invalid(
                    name,
                    format!(
                        "default probability {} is outside [0, 1]",
                        lookup.default_probability
                    ),
                ));
            }
            return Ok(Some(Transition::LookupTable(LookupTransition {
                table: lookup.table,
                attributes: lookup.attributes,
                default_probability: lookup.default_probability,
                positive: lookup.transition,
                alternate: lookup.alternate,
            })));
        }
        Ok(None)
    }

    fn weights(&self, name: &str, defs: Vec<WeightedDef>) -> Result<Vec<Weighted>, LoadError> {
        if defs.is_empty() {
            return Err(self.invalid(name, "empty distribution"));
        }
        let weights: Vec<Weighted> = defs
            .into_iter()
            .map(|d| Weighted {
                target: d.transition,
                weight: d.distribution,
            })
            .collect();
        if let Some(negative) = weights.iter().find(|w| w.weight < 0.0) {
            return Err(self.invalid(
                name,
                format!("negative weight {} for '{}'", negative.weight, negative.target),
            ));
        }
        if !weights_sum_to_one(&weights) {
            return Err(LoadError::WeightsDoNotSumToOne {
                module: self.module.to_string(),
                state: name.to_string(),
                sum: weight_sum(&weights),
            });
        }
        Ok(weights)
    }

    fn clauses(
        &self,
        name: &str,
        defs: Vec<ClauseDef>,
        allow_compound: bool,
    ) -> Result<Vec<Clause>, LoadError> {
        if defs.is_empty() {
            return Err(self.invalid(name, "empty clause list"));
        }

        let defaults = defs.iter().filter(|d| d.condition.is_none()).count();
        if defaults > 1 {
            return Err(LoadError::MultipleDefaultClauses {
                module: self.module.to_string(),
                state: name.to_string(),
            });
        }

        let last = defs.len() - 1;
        let mut clauses = Vec::with_capacity(defs.len());

        for (i, def) in defs.into_iter().enumerate() {
            let condition = match def.condition {
                Some(condition) => {
                    if !allow_compound && condition.is_compound() {
                        return Err(LoadError::CompoundConditionInConditional {
                            module: self.module.to_string(),
                            state: name.to_string(),
                        });
                    }
                    condition
                        .validate()
                        .map_err(|reason| self.invalid(name, reason))?;
                    condition
                }
                None => Condition::always(),
            };
            if condition.is_always() && i != last {
                return Err(LoadError::DefaultClauseNotLast {
                    module: self.module.to_string(),
                    state: name.to_string(),
                });
            }

            let outcome = match (def.transition, def.distributions) {
                (Some(target), None) => Outcome::Target(target),
                (None, Some(weights)) if allow_compound => {
                    Outcome::Weighted(self.weights(name, weights)?)
                }
                (None, Some(_)) => {
                    return Err(self.invalid(name, "conditional clauses take a single transition"))
                }
                _ => {
                    return Err(self.invalid(
                        name,
                        format!("clause {} needs exactly one of transition/distributions", i),
                    ))
                }
            };
            clauses.push(Clause { condition, outcome });
        }

        if defaults == 0 {
            tracing::warn!(
                "Module '{}': state '{}' has no default clause; an entity matching no clause will fail",
                self.module,
                name
            );
        }
        Ok(clauses)
    }
}
