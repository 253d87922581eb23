//! Reproducibility of population runs
//!
//! A fixed seed and module set must give identical per-entity output no
//! matter how many workers share the population.

use std::path::Path;

use life_course::core::types::Timestamp;
use life_course::entity::person::GENDER;
use life_course::{Collaborator, ModuleRegistry, Person, Population, RegistryBuilder, SimulationConfig};

/// Randomized demographics drawn from the person's own stream
struct CoinFlipDemographics;

impl Collaborator for CoinFlipDemographics {
    fn on_birth(&self, person: &mut Person) {
        let gender = if person.rng.below(2) == 0 { "M" } else { "F" };
        person.attributes.set(GENDER, gender);
        let environment = if person.rng.uniform() < 0.7 { "urban" } else { "rural" };
        person.attributes.set("urban_rural_status", environment);
    }

    fn before_tick(&self, person: &mut Person, time: Timestamp) {
        person.set_vital_sign("age_weeks", (time - person.birth) as f64 / 6.048e8);
    }
}

fn bundled_registry() -> ModuleRegistry {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/modules");
    let mut builder = RegistryBuilder::new();
    builder.load_directory(&dir).unwrap();
    let registry = builder.build();
    assert!(registry.rejected().is_empty(), "{:?}", registry.rejected());
    registry
}

fn config(workers: usize, seed: u64) -> SimulationConfig {
    SimulationConfig {
        seed,
        population: 48,
        workers,
        ..SimulationConfig::default()
    }
}

#[test]
fn test_worker_count_does_not_change_output() {
    let registry = bundled_registry();

    let single = Population::new(&registry, config(1, 2024), CoinFlipDemographics)
        .unwrap()
        .run()
        .unwrap();
    let parallel = Population::new(&registry, config(4, 2024), CoinFlipDemographics)
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(single.entities.len(), 48);
    assert_eq!(single, parallel);
    assert!(single.summary().events > 0);
}

#[test]
fn test_single_entity_matches_population_run() {
    let registry = bundled_registry();
    let population = Population::new(&registry, config(3, 77), CoinFlipDemographics).unwrap();
    let report = population.run().unwrap();

    for index in [0_u64, 17, 47] {
        assert_eq!(population.simulate(index), report.entities[index as usize]);
    }
}

#[test]
fn test_seed_changes_output() {
    let registry = bundled_registry();
    let a = Population::new(&registry, config(2, 1), CoinFlipDemographics)
        .unwrap()
        .run()
        .unwrap();
    let b = Population::new(&registry, config(2, 2), CoinFlipDemographics)
        .unwrap()
        .run()
        .unwrap();
    assert_ne!(a, b);
}
