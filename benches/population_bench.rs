//! Benchmarks for module stepping and population runs

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::Path;

use life_course::core::types::EntityId;
use life_course::simulation::simulate_entity;
use life_course::{ModuleRegistry, NoCollaborators, Population, RegistryBuilder, SimulationConfig};

fn bundled_registry() -> ModuleRegistry {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/modules");
    let mut builder = RegistryBuilder::new();
    builder
        .load_directory(&dir)
        .expect("bundled modules load");
    builder.build()
}

fn bench_single_lifetime(c: &mut Criterion) {
    let registry = bundled_registry();
    let config = SimulationConfig::default();
    let mut index = 0_u64;

    c.bench_function("single_lifetime", |b| {
        b.iter(|| {
            index += 1;
            black_box(simulate_entity(
                &registry,
                &config,
                &NoCollaborators,
                EntityId(index),
            ))
        })
    });
}

fn bench_population(c: &mut Criterion) {
    let registry = bundled_registry();
    let mut group = c.benchmark_group("population");
    group.sample_size(10);

    for workers in [1_usize, 4] {
        let config = SimulationConfig {
            population: 200,
            workers,
            ..SimulationConfig::default()
        };
        let population =
            Population::new(&registry, config, NoCollaborators).expect("valid config");
        group.bench_function(format!("200_entities_{}_workers", workers), |b| {
            b.iter(|| black_box(population.run().expect("run succeeds").summary()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_lifetime, bench_population);
criterion_main!(benches);
