//! Integration tests for the execution engine and lifetime loop
//!
//! These tests drive whole module sets through the public API:
//! - Nested submodule calls unwind in reverse order
//! - A Guard that never opens only blocks its own module
//! - Death halts every other module at the current tick
//! - No event follows a death that falls between ticks
//! - The bundled module directory loads cleanly

use std::path::Path;

use life_course::core::calendar::{MS_PER_DAY, MS_PER_WEEK, MS_PER_YEAR};
use life_course::core::types::EntityId;
use life_course::entity::attributes::Value;
use life_course::simulation::{
    simulate_entity, Engine, EventKind, InstanceStatus, ModuleInstance, StepOutcome,
};
use life_course::{ModuleRegistry, NoCollaborators, Person, RegistryBuilder, SimulationConfig};

fn registry(modules: &[&str]) -> ModuleRegistry {
    let mut builder = RegistryBuilder::new();
    for json in modules {
        builder.add_module_json(json).unwrap();
    }
    let registry = builder.build();
    assert!(registry.rejected().is_empty(), "{:?}", registry.rejected());
    registry
}

fn marker_module(name: &str, submodule: bool, call: Option<&str>, delay_weeks: u32) -> String {
    let first = match (call, delay_weeks) {
        (Some(_), _) => "Call",
        (None, 0) => "Mark",
        (None, _) => "Wait",
    };
    let call_state = call
        .map(|callee| {
            format!(
                r#""Call": {{"type": "CallSubmodule", "submodule": "{}", "direct_transition": "Mark"}},"#,
                callee
            )
        })
        .unwrap_or_default();
    format!(
        r#"{{
            "name": "{name}",
            "submodule": {submodule},
            "states": {{
                "Initial": {{"type": "Initial", "direct_transition": "{first}"}},
                {call_state}
                "Wait": {{"type": "Delay", "exact": {{"quantity": {delay_weeks}, "unit": "weeks"}}, "direct_transition": "Mark"}},
                "Mark": {{"type": "SetAttribute", "attribute": "{name}_done", "value": true, "direct_transition": "Terminal"}},
                "Terminal": {{"type": "Terminal"}}
            }}
        }}"#
    )
}

/// Counts one tick per simulated day in the `ticks` attribute
fn daily_ticker() -> String {
    r#"{"name": "a_ticker", "states": {
        "Initial": {"type": "Initial", "direct_transition": "Tick"},
        "Tick": {"type": "Counter", "attribute": "ticks", "action": "increment", "conditional_transition": [
            {"condition": {"condition_type": "Attribute", "attribute": "ticks", "operator": ">=", "value": 1000},
             "transition": "Terminal"},
            {"transition": "Wait"}]},
        "Wait": {"type": "Delay", "exact": {"quantity": 1, "unit": "days"}, "direct_transition": "Tick"},
        "Terminal": {"type": "Terminal"}}}"#
        .to_string()
}

#[test]
fn test_nested_calls_unwind_in_reverse_order() {
    let registry = registry(&[
        &marker_module("a", false, Some("b"), 0),
        &marker_module("b", true, Some("c"), 0),
        &marker_module("c", true, None, 2),
    ]);
    let config = SimulationConfig::default();
    let engine = Engine::new(&registry, &config);
    let mut person = Person::new(EntityId(1), config.seed, 0);
    let mut instance = ModuleInstance::new(registry.module("a").unwrap(), 0);
    let mut events = Vec::new();

    // Suspended inside the innermost submodule with both callers on the stack
    let outcome = engine.step(&mut instance, &mut person, 0, &mut events).unwrap();
    assert_eq!(outcome, StepOutcome::Suspended);
    assert_eq!(instance.module, "c");
    assert_eq!(instance.state, "Wait");
    let callers: Vec<_> = instance.stack.iter().map(|f| f.module.as_str()).collect();
    assert_eq!(callers, vec!["a", "b"]);
    assert!(instance.stack.iter().all(|f| f.state == "Call" && f.return_to == "Mark"));
    assert!(events.is_empty());

    let outcome = engine
        .step(&mut instance, &mut person, 3 * MS_PER_WEEK, &mut events)
        .unwrap();
    assert_eq!(outcome, StepOutcome::Completed);
    assert!(instance.stack.is_empty());
    assert_eq!(instance.module, "a");

    let order: Vec<_> = events.iter().map(|e| e.module.as_str()).collect();
    assert_eq!(order, vec!["c", "b", "a"]);
    // Every marker fires when the delay releases, not at the later tick
    assert!(events.iter().all(|e| e.time == 2 * MS_PER_WEEK));
}

#[test]
fn test_blocked_guard_does_not_block_other_modules() {
    let registry = registry(&[
        r#"{"name": "blocked", "states": {
            "Initial": {"type": "Initial", "direct_transition": "Wait"},
            "Wait": {"type": "Guard", "allow": {"condition_type": "False"}, "direct_transition": "Terminal"},
            "Terminal": {"type": "Terminal"}}}"#,
        &marker_module("progress", false, None, 52),
    ]);
    let config = SimulationConfig {
        max_lifespan_years: 2,
        ..SimulationConfig::default()
    };
    let report = simulate_entity(&registry, &config, &NoCollaborators, EntityId(7));

    assert!(report.failure.is_none());
    assert_eq!(report.attributes.get("progress_done"), Some(&Value::Bool(true)));

    let blocked = &report.instances[0];
    assert_eq!(blocked.root, "blocked");
    assert_eq!(blocked.state, "Wait");
    assert_eq!(blocked.status, InstanceStatus::Halted);

    let progress = &report.instances[1];
    assert_eq!(progress.status, InstanceStatus::Completed);

    // The blocked guard kept the lifetime running to its end
    assert!(report.last_tick > config.start_time + MS_PER_YEAR);
}

#[test]
fn test_death_halts_every_module_at_current_tick() {
    let registry = registry(&[
        &daily_ticker(),
        r#"{"name": "z_death", "states": {
            "Initial": {"type": "Initial", "direct_transition": "Wait"},
            "Wait": {"type": "Delay", "exact": {"quantity": 1, "unit": "weeks"}, "conditional_transition": [
                {"condition": {"condition_type": "Attribute", "attribute": "immortal", "operator": "is not nil"},
                 "transition": "Terminal"},
                {"transition": "Die"}]},
            "Die": {"type": "Death", "codes": [{"system": "SNOMED-CT", "code": "419620001", "display": "Death"}]},
            "Terminal": {"type": "Terminal"}}}"#,
    ]);
    let config = SimulationConfig::default();
    let report = simulate_entity(&registry, &config, &NoCollaborators, EntityId(9));

    assert_eq!(report.deceased, Some(MS_PER_WEEK));
    assert_eq!(report.last_tick, MS_PER_WEEK);

    let last = report.events.last().unwrap();
    assert!(last.is_death());
    assert_eq!(last.module, "z_death");
    assert!(report.events.iter().all(|e| e.time <= MS_PER_WEEK));

    // Daily ticks from day 0 through day 7, then nothing
    let ticks: Vec<_> = report
        .events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::AttributeSet { .. }))
        .map(|e| e.time)
        .collect();
    assert_eq!(ticks, (0..=7).map(|d| d * MS_PER_DAY).collect::<Vec<_>>());
    assert_eq!(report.attributes.get("ticks"), Some(&Value::Number(8.0)));

    assert!(report
        .instances
        .iter()
        .all(|i| i.status == InstanceStatus::Halted));
}

#[test]
fn test_death_between_ticks_is_not_followed_by_events() {
    // Death delay of 10 days falls inside the second 7-day tick
    let registry = registry(&[
        &daily_ticker(),
        r#"{"name": "z_death", "states": {
            "Initial": {"type": "Initial", "direct_transition": "Wait"},
            "Wait": {"type": "Delay", "exact": {"quantity": 10, "unit": "days"}, "conditional_transition": [
                {"condition": {"condition_type": "Attribute", "attribute": "immortal", "operator": "is not nil"},
                 "transition": "Terminal"},
                {"transition": "Die"}]},
            "Die": {"type": "Death"},
            "Terminal": {"type": "Terminal"}}}"#,
    ]);
    let config = SimulationConfig::default();
    let report = simulate_entity(&registry, &config, &NoCollaborators, EntityId(11));

    let death = report.deceased.unwrap();
    assert_eq!(death, 2 * MS_PER_WEEK);
    assert!(report.events.last().unwrap().is_death());
    let late: Vec<_> = report
        .events
        .iter()
        .filter(|e| e.time > death)
        .map(|e| e.time / MS_PER_DAY)
        .collect();
    assert!(late.is_empty(), "events after death at days {:?}", late);

    // The ticker's days 8 through 14 ran before the death and are kept
    assert_eq!(report.attributes.get("ticks"), Some(&Value::Number(15.0)));
}

#[test]
fn test_bundled_modules_load() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/modules");
    let mut builder = RegistryBuilder::new();
    let loaded = builder.load_directory(&dir).unwrap();
    let registry = builder.build();

    assert_eq!(loaded, 5);
    assert!(registry.rejected().is_empty(), "{:?}", registry.rejected());
    assert_eq!(registry.tables().len(), 2);

    let top: Vec<_> = registry.top_level().map(|m| m.name.as_str()).collect();
    assert_eq!(top, vec!["asthma", "cardiovascular"]);
    assert!(registry.module("asthma_treatment").unwrap().submodule);
}

#[test]
fn test_rejected_file_does_not_stop_directory_load() {
    let dir = std::env::temp_dir().join(format!("life_course_reject_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("broken.json"), r#"{"name": "broken", "states": {}}"#).unwrap();
    std::fs::write(dir.join("ok.json"), marker_module("ok", false, None, 1)).unwrap();

    let mut builder = RegistryBuilder::new();
    let loaded = builder.load_directory(&dir).unwrap();
    let registry = builder.build();
    std::fs::remove_dir_all(&dir).unwrap();

    assert_eq!(loaded, 1);
    assert!(registry.module("ok").is_some());
    assert_eq!(registry.rejected().len(), 1);
    assert_eq!(registry.rejected()[0].module(), Some("broken"));
}
