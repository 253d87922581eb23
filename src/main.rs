//! Life Course - demo entry point
//!
//! Loads the bundled modules, simulates a small population with a simple
//! demographics collaborator and prints what happened.

use std::collections::BTreeMap;

use life_course::core::error::Result;
use life_course::core::types::Timestamp;
use life_course::entity::person::{GENDER, RACE};
use life_course::simulation::EventKind;
use life_course::{Collaborator, ModuleRegistry, Person, Population, RegistryBuilder, SimulationConfig};
use tracing_subscriber::EnvFilter;

const MODULES: &[&str] = &[
    include_str!("../data/modules/asthma.json"),
    include_str!("../data/modules/cardiovascular.json"),
    include_str!("../data/modules/submodules/asthma_treatment.json"),
];

const LOOKUP_TABLES: &[&str] = &[
    include_str!("../data/modules/lookup_tables/asthma_onset.json"),
    include_str!("../data/modules/lookup_tables/cardiac_mortality.json"),
];

/// Assigns gender, race and living environment at birth
struct Demographics;

impl Collaborator for Demographics {
    fn on_birth(&self, person: &mut Person) {
        let gender = if person.rng.below(2) == 0 { "M" } else { "F" };
        person.attributes.set(GENDER, gender);

        let race = match person.rng.below(10) {
            0..=5 => "white",
            6 | 7 => "black",
            8 => "asian",
            _ => "other",
        };
        person.attributes.set(RACE, race);

        let environment = if person.rng.uniform() < 0.8 { "urban" } else { "rural" };
        person.attributes.set("urban_rural_status", environment);
    }

    fn before_tick(&self, person: &mut Person, time: Timestamp) {
        // Weight follows a rough growth curve until adulthood
        let age = person.age_in_years(time) as f64;
        let weight = 3.5 + age.min(18.0) * 3.6;
        person.set_vital_sign("body_weight", weight);
    }
}

fn demo_registry() -> Result<ModuleRegistry> {
    let mut builder = RegistryBuilder::new();
    for json in LOOKUP_TABLES {
        builder.add_table_json(json)?;
    }
    for json in MODULES {
        builder.add_module_json(json)?;
    }
    Ok(builder.build())
}

fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("life_course=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Life Course starting...");

    let registry = demo_registry()?;
    for rejected in registry.rejected() {
        tracing::error!("Module rejected: {}", rejected);
    }

    let config = SimulationConfig {
        population: 1_000,
        ..SimulationConfig::default()
    };
    let population = Population::new(&registry, config, Demographics)?;
    let report = population.run()?;
    let summary = report.summary();

    let mut onsets: BTreeMap<String, usize> = BTreeMap::new();
    for entity in &report.entities {
        for event in &entity.events {
            if let EventKind::ConditionOnset { code } = &event.kind {
                *onsets.entry(code.to_string()).or_insert(0) += 1;
            }
        }
    }

    println!("\n=== LIFE COURSE ===");
    println!("Modules:     {}", registry.names().collect::<Vec<_>>().join(", "));
    println!("Population:  {}", summary.population);
    println!("Deceased:    {}", summary.deceased);
    println!("Failed:      {}", summary.failed);
    println!("Events:      {}", summary.events);
    println!("\nCondition onsets:");
    for (code, count) in &onsets {
        println!("  {:<40} {}", code, count);
    }

    Ok(())
}
