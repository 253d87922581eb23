//! Execution engine - advances one module instance of one person
//!
//! A step processes states back to back until the instance has to wait
//! (a pending Delay or a blocked Guard), reaches its root Terminal, or the
//! person dies. Submodule calls use the instance's explicit call stack, so
//! nesting depth never touches the native stack.

use crate::core::config::SimulationConfig;
use crate::core::error::EngineError;
use crate::core::types::{EntityId, Timestamp};
use crate::entity::attributes::Value;
use crate::entity::person::Person;
use crate::entity::record::ActiveSet;
use crate::modules::graph::Module;
use crate::modules::registry::ModuleRegistry;
use crate::modules::state::{ClinicalRef, ObservationValue, State, StateKind};
use crate::simulation::events::{EventKind, HealthEvent, RecordSink};
use crate::simulation::instance::{CallFrame, InstanceStatus, ModuleInstance};

/// Result of one `Engine::step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Waiting in a Delay or Guard
    Suspended,
    /// Root Terminal reached during this step
    Completed,
    /// A Death state was reached; the person is deceased
    Died,
    /// Nothing to do: the instance had already finished or the person is dead
    Idle,
}

pub struct Engine<'r> {
    registry: &'r ModuleRegistry,
    max_call_depth: usize,
    max_transitions_per_tick: usize,
}

impl<'r> Engine<'r> {
    pub fn new(registry: &'r ModuleRegistry, config: &SimulationConfig) -> Self {
        Self {
            registry,
            max_call_depth: config.max_call_depth,
            max_transitions_per_tick: config.max_transitions_per_tick,
        }
    }

    /// Advance `instance` up to simulated time `time`
    pub fn step(
        &self,
        instance: &mut ModuleInstance,
        person: &mut Person,
        time: Timestamp,
        sink: &mut dyn RecordSink,
    ) -> Result<StepOutcome, EngineError> {
        if !instance.is_running() {
            return Ok(StepOutcome::Idle);
        }
        if !person.is_alive() {
            instance.halt();
            return Ok(StepOutcome::Idle);
        }

        let mut visits = 0;
        loop {
            visits += 1;
            if visits > self.max_transitions_per_tick {
                return Err(EngineError::TransitionLimit {
                    module: instance.module.clone(),
                    state: instance.state.clone(),
                    limit: self.max_transitions_per_tick,
                });
            }

            let module = self.module(&instance.module)?;
            let state = module
                .state(&instance.state)
                .ok_or_else(|| EngineError::UnknownState {
                    module: module.name.clone(),
                    state: instance.state.clone(),
                })?;
            // Time at which the next state is entered
            let mut exit = instance.entered;

            match &state.kind {
                StateKind::Delay(duration) => {
                    let release = match instance.release {
                        Some(release) => release,
                        None => {
                            let release = instance.entered + duration.sample(&mut person.rng);
                            instance.release = Some(release);
                            release
                        }
                    };
                    if time < release {
                        return Ok(StepOutcome::Suspended);
                    }
                    exit = release;
                }
                StateKind::Guard(condition) => {
                    if !condition.evaluate(person, time) {
                        return Ok(StepOutcome::Suspended);
                    }
                    exit = time;
                }
                StateKind::Terminal => match instance.stack.pop() {
                    Some(frame) => {
                        tracing::trace!(
                            "{}: returned from '{}' to '{}'",
                            person.id,
                            module.name,
                            frame.module
                        );
                        instance.module = frame.module;
                        self.enter(instance, person, &frame.return_to, exit);
                        continue;
                    }
                    None => {
                        instance.status = InstanceStatus::Completed;
                        return Ok(StepOutcome::Completed);
                    }
                },
                StateKind::CallSubmodule(submodule) => {
                    let return_to = self.next_state(module, state, person, time)?;
                    if instance.depth() >= self.max_call_depth {
                        return Err(EngineError::CallDepthExceeded {
                            module: submodule.clone(),
                            depth: self.max_call_depth,
                        });
                    }
                    let callee = self.module(submodule)?;
                    instance.stack.push(CallFrame {
                        module: module.name.clone(),
                        state: state.name.clone(),
                        return_to: return_to.to_string(),
                    });
                    instance.module = callee.name.clone();
                    self.enter(instance, person, callee.initial(), exit);
                    continue;
                }
                StateKind::Death { cause } => {
                    // Stamped at the tick so it never precedes an event already
                    // emitted this tick by another module
                    sink.record(self.event(
                        person.id,
                        instance,
                        time,
                        EventKind::Death {
                            cause: cause.clone(),
                        },
                    ));
                    person.die(time);
                    instance.status = InstanceStatus::Halted;
                    tracing::debug!("{} died in '{}'", person.id, module.name);
                    return Ok(StepOutcome::Died);
                }
                kind => self.perform(kind, state, instance, person, sink),
            }

            let next = self.next_state(module, state, person, time)?;
            self.enter(instance, person, next, exit);
        }
    }

    fn module(&self, name: &str) -> Result<&'r Module, EngineError> {
        self.registry
            .module(name)
            .ok_or_else(|| EngineError::UnknownModule(name.to_string()))
    }

    fn next_state<'m>(
        &self,
        module: &'m Module,
        state: &'m State,
        person: &mut Person,
        time: Timestamp,
    ) -> Result<&'m str, EngineError> {
        let transition = state
            .transition
            .as_ref()
            .ok_or_else(|| EngineError::MissingTransition {
                module: module.name.clone(),
                state: state.name.clone(),
            })?;
        transition
            .resolve(person, time, self.registry.tables())?
            .ok_or_else(|| EngineError::NoTransitionMatched {
                module: module.name.clone(),
                state: state.name.clone(),
            })
    }

    fn enter(
        &self,
        instance: &mut ModuleInstance,
        person: &mut Person,
        state: &str,
        time: Timestamp,
    ) {
        tracing::trace!("{}: {} -> {}::{}", person.id, instance.state, instance.module, state);
        instance.enter(state, time);
        person.note_state_entry(state, time);
    }

    fn event(
        &self,
        entity: EntityId,
        instance: &ModuleInstance,
        time: Timestamp,
        kind: EventKind,
    ) -> HealthEvent {
        HealthEvent {
            entity,
            time,
            module: instance.module.clone(),
            state: instance.state.clone(),
            kind,
        }
    }

    /// Side effects of action states
    fn perform(
        &self,
        kind: &StateKind,
        state: &State,
        instance: &ModuleInstance,
        person: &mut Person,
        sink: &mut dyn RecordSink,
    ) {
        let at = instance.entered;
        let entity = person.id;
        let mut emit = |kind: EventKind| sink.record(self.event(entity, instance, at, kind));

        match kind {
            StateKind::SetAttribute { attribute, value } => {
                match value {
                    Some(value) => {
                        person.attributes.set(attribute.as_str(), value.clone());
                    }
                    None => {
                        person.attributes.remove(attribute);
                    }
                }
                emit(EventKind::AttributeSet {
                    attribute: attribute.clone(),
                    value: value.clone(),
                });
            }
            StateKind::Counter { attribute, delta } => {
                let value = person.attributes.increment(attribute, *delta);
                emit(EventKind::AttributeSet {
                    attribute: attribute.clone(),
                    value: Some(Value::Number(value)),
                });
            }
            StateKind::Encounter { class, codes } => {
                person.record.encounter = Some(state.name.clone());
                emit(EventKind::EncounterStarted {
                    class: class.clone(),
                    codes: codes.clone(),
                });
            }
            StateKind::EncounterEnd => {
                if person.record.encounter.take().is_some() {
                    emit(EventKind::EncounterEnded);
                }
            }
            StateKind::ConditionOnset {
                codes,
                assign_to_attribute,
            } => {
                if let Some(code) = codes.first() {
                    if person.record.conditions.start(&code.code, &state.name, at) {
                        emit(EventKind::ConditionOnset { code: code.clone() });
                    }
                    if let Some(attribute) = assign_to_attribute {
                        person.attributes.set(attribute.as_str(), code.code.as_str());
                    }
                }
            }
            StateKind::ConditionEnd(reference) => {
                for code in referenced_codes(reference, person, |p| &p.record.conditions) {
                    if person.record.conditions.end(&code) {
                        emit(EventKind::ConditionEnded { code });
                    }
                }
            }
            StateKind::MedicationOrder {
                codes,
                assign_to_attribute,
            } => {
                if let Some(code) = codes.first() {
                    if person.record.medications.start(&code.code, &state.name, at) {
                        emit(EventKind::MedicationOrdered { code: code.clone() });
                    }
                    if let Some(attribute) = assign_to_attribute {
                        person.attributes.set(attribute.as_str(), code.code.as_str());
                    }
                }
            }
            StateKind::MedicationEnd(reference) => {
                for code in referenced_codes(reference, person, |p| &p.record.medications) {
                    if person.record.medications.end(&code) {
                        emit(EventKind::MedicationEnded { code });
                    }
                }
            }
            StateKind::Procedure { codes, duration } => {
                let duration = duration.as_ref().map(|d| d.sample(&mut person.rng));
                if let Some(code) = codes.first() {
                    emit(EventKind::ProcedurePerformed {
                        code: code.clone(),
                        duration,
                    });
                }
            }
            StateKind::Observation { codes, unit, value } => {
                let value = match value {
                    ObservationValue::Number(spec) => Some(Value::Number(spec.sample(&mut person.rng))),
                    ObservationValue::Attribute(name) => person.attributes.get(name).cloned(),
                    ObservationValue::VitalSign(name) => person.vital_sign(name).map(Value::Number),
                };
                if let Some(code) = codes.first() {
                    emit(EventKind::ObservationRecorded {
                        code: code.clone(),
                        value,
                        unit: unit.clone(),
                    });
                }
            }
            StateKind::VitalSign {
                vital_sign,
                unit,
                value,
            } => {
                let value = value.sample(&mut person.rng);
                person.set_vital_sign(vital_sign, value);
                emit(EventKind::VitalSignSet {
                    vital_sign: vital_sign.clone(),
                    value,
                    unit: unit.clone(),
                });
            }
            StateKind::Symptom {
                symptom,
                cause,
                value,
            } => {
                let severity = value.sample(&mut person.rng);
                person.record.set_symptom(symptom, severity);
                emit(EventKind::SymptomSet {
                    symptom: symptom.clone(),
                    severity,
                    cause: cause.clone(),
                });
            }
            // Initial and Simple only pass through; the control states are handled by `step`
            _ => {}
        }
    }
}

/// Codes an end state refers to, resolved against the person's current record
fn referenced_codes(
    reference: &ClinicalRef,
    person: &Person,
    active: impl Fn(&Person) -> &ActiveSet,
) -> Vec<String> {
    match reference {
        ClinicalRef::State(state) => active(person)
            .code_for_state(state)
            .map(|code| vec![code.to_string()])
            .unwrap_or_default(),
        ClinicalRef::Attribute(attribute) => person
            .attributes
            .get(attribute)
            .and_then(Value::as_str)
            .map(|code| vec![code.to_string()])
            .unwrap_or_default(),
        ClinicalRef::Codes(codes) => codes.iter().map(|c| c.code.clone()).collect(),
    }
}
