//! Lifetime loop of one simulated person

use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::config::SimulationConfig;
use crate::core::types::{EntityId, Timestamp};
use crate::entity::attributes::Value;
use crate::entity::collaborator::Collaborator;
use crate::entity::person::Person;
use crate::modules::registry::ModuleRegistry;
use crate::simulation::engine::{Engine, StepOutcome};
use crate::simulation::events::HealthEvent;
use crate::simulation::instance::ModuleInstance;

/// Everything one person produced over their lifetime
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityReport {
    pub id: EntityId,
    pub birth: Timestamp,
    pub deceased: Option<Timestamp>,
    /// Last simulated tick
    pub last_tick: Timestamp,
    pub events: Vec<HealthEvent>,
    /// Final attribute values
    pub attributes: BTreeMap<String, Value>,
    /// Final state of every top-level module instance, in module name order
    pub instances: Vec<ModuleInstance>,
    /// Runtime error that ended this person's simulation early
    pub failure: Option<String>,
}

impl EntityReport {
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn is_deceased(&self) -> bool {
        self.deceased.is_some()
    }
}

/// Simulate one person from birth until death, lifespan end, or until
/// every attached module has finished
///
/// Every top-level module of the registry is attached at birth and stepped
/// once per tick in name order. A runtime failure halts this person only.
pub fn simulate_entity<C: Collaborator + ?Sized>(
    registry: &ModuleRegistry,
    config: &SimulationConfig,
    collaborator: &C,
    id: EntityId,
) -> EntityReport {
    let mut person = Person::new(id, config.seed, config.start_time);
    collaborator.on_birth(&mut person);

    let engine = Engine::new(registry, config);
    let mut instances: Vec<ModuleInstance> = registry
        .top_level()
        .map(|module| ModuleInstance::new(module, person.birth))
        .collect();
    for instance in &instances {
        person.note_state_entry(&instance.state, person.birth);
    }

    let mut events: Vec<HealthEvent> = Vec::new();
    let mut failure = None;
    let end = person.birth.saturating_add(config.max_lifespan());
    let mut time = person.birth;
    let mut last_tick = time;

    'lifetime: while time <= end {
        last_tick = time;
        collaborator.before_tick(&mut person, time);

        for instance in instances.iter_mut() {
            match engine.step(instance, &mut person, time, &mut events) {
                Ok(StepOutcome::Died) => break 'lifetime,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("{} failed at {}: {}", id, time, e);
                    failure = Some(e.to_string());
                    break 'lifetime;
                }
            }
        }

        if !instances.iter().any(ModuleInstance::is_running) {
            break;
        }
        time = match time.checked_add(config.time_step) {
            Some(next) => next,
            None => break,
        };
    }

    // Death or failure stops every instance at the current tick
    for instance in instances.iter_mut() {
        instance.halt();
    }

    tracing::debug!(
        "{} finished: {} events, deceased: {:?}",
        id,
        events.len(),
        person.deceased_at()
    );

    EntityReport {
        id,
        birth: person.birth,
        deceased: person.deceased_at(),
        last_tick,
        events,
        attributes: person.attributes.snapshot(),
        instances,
        failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::collaborator::NoCollaborators;
    use crate::modules::registry::RegistryBuilder;
    use crate::simulation::instance::InstanceStatus;

    fn registry(modules: &[&str]) -> ModuleRegistry {
        let mut builder = RegistryBuilder::new();
        for json in modules {
            builder.add_module_json(json).unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_stops_when_all_modules_complete() {
        let registry = registry(&[r#"{"name": "m", "states": {
            "Initial": {"type": "Initial", "direct_transition": "Terminal"},
            "Terminal": {"type": "Terminal"}}}"#]);
        let config = SimulationConfig::default();
        let report = simulate_entity(&registry, &config, &NoCollaborators, EntityId(3));

        assert_eq!(report.last_tick, config.start_time);
        assert_eq!(report.instances[0].status, InstanceStatus::Completed);
        assert!(report.failure.is_none());
        assert!(report.deceased.is_none());
    }

    #[test]
    fn test_failure_recorded_not_panicking() {
        let registry = registry(&[r#"{"name": "m", "states": {
            "Initial": {"type": "Initial", "conditional_transition": [
                {"condition": {"condition_type": "False"}, "transition": "Terminal"}]},
            "Terminal": {"type": "Terminal"}}}"#]);
        let report = simulate_entity(
            &registry,
            &SimulationConfig::default(),
            &NoCollaborators,
            EntityId(4),
        );
        assert!(report.is_failed());
        assert_eq!(report.instances[0].status, InstanceStatus::Halted);
    }

    #[test]
    fn test_lifespan_bounds_a_waiting_module() {
        let registry = registry(&[r#"{"name": "m", "states": {
            "Initial": {"type": "Initial", "direct_transition": "Wait"},
            "Wait": {"type": "Guard", "allow": {"condition_type": "False"}, "direct_transition": "Terminal"},
            "Terminal": {"type": "Terminal"}}}"#]);
        let config = SimulationConfig {
            max_lifespan_years: 1,
            ..SimulationConfig::default()
        };
        let report = simulate_entity(&registry, &config, &NoCollaborators, EntityId(5));
        assert_eq!(report.instances[0].state, "Wait");
        assert_eq!(report.instances[0].status, InstanceStatus::Halted);
        assert!(report.last_tick <= config.start_time + config.max_lifespan());
        assert!(report.failure.is_none());
    }
}
