//! Population scheduler
//!
//! Runs many independent lifetimes on a bounded rayon pool. Each entity's
//! whole lifetime is one task; the registry and collaborator are shared
//! read-only. Entity ids are the entity's index, so the output does not depend
//! on the number of workers.

use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;

use crate::core::config::SimulationConfig;
use crate::core::error::{Result, SimulationError};
use crate::core::types::EntityId;
use crate::entity::collaborator::Collaborator;
use crate::modules::registry::ModuleRegistry;
use crate::simulation::lifecycle::{simulate_entity, EntityReport};

/// Totals over a population run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PopulationSummary {
    pub population: usize,
    pub deceased: usize,
    pub failed: usize,
    pub events: usize,
}

impl PopulationSummary {
    fn of(report: &EntityReport) -> Self {
        Self {
            population: 1,
            deceased: usize::from(report.is_deceased()),
            failed: usize::from(report.is_failed()),
            events: report.events.len(),
        }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            population: self.population + other.population,
            deceased: self.deceased + other.deceased,
            failed: self.failed + other.failed,
            events: self.events + other.events,
        }
    }
}

/// Per-entity reports of a run, in entity order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationReport {
    pub entities: Vec<EntityReport>,
}

impl PopulationReport {
    pub fn summary(&self) -> PopulationSummary {
        self.entities
            .iter()
            .map(PopulationSummary::of)
            .fold(PopulationSummary::default(), PopulationSummary::merge)
    }
}

pub struct Population<'a, C: Collaborator> {
    registry: &'a ModuleRegistry,
    config: SimulationConfig,
    collaborator: C,
}

impl<'a, C: Collaborator> Population<'a, C> {
    pub fn new(registry: &'a ModuleRegistry, config: SimulationConfig, collaborator: C) -> Result<Self> {
        config.validate().map_err(SimulationError::InvalidConfig)?;
        Ok(Self {
            registry,
            config,
            collaborator,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Simulate a single entity by index, on the calling thread
    pub fn simulate(&self, index: u64) -> EntityReport {
        simulate_entity(self.registry, &self.config, &self.collaborator, EntityId(index))
    }

    /// Simulate the whole population and keep every report
    pub fn run(&self) -> Result<PopulationReport> {
        let pool = self.pool()?;
        let started = Instant::now();
        tracing::info!(
            "Simulating {} entities on {} workers ({} modules)",
            self.config.population,
            self.config.workers,
            self.registry.len()
        );

        let entities: Vec<EntityReport> = pool.install(|| {
            (0..self.config.population)
                .into_par_iter()
                .map(|index| self.simulate(index as u64))
                .collect()
        });

        let report = PopulationReport { entities };
        let summary = report.summary();
        tracing::info!(
            "Simulated {} entities in {:.2?}: {} deceased, {} failed, {} events",
            summary.population,
            started.elapsed(),
            summary.deceased,
            summary.failed,
            summary.events
        );
        Ok(report)
    }

    /// Simulate the whole population, handing each report to `consumer` as
    /// soon as it is done instead of keeping it
    ///
    /// `consumer` is called from worker threads in completion order.
    pub fn run_with<F>(&self, consumer: F) -> Result<PopulationSummary>
    where
        F: Fn(EntityReport) + Sync,
    {
        let pool = self.pool()?;
        let started = Instant::now();
        tracing::info!(
            "Streaming {} entities on {} workers",
            self.config.population,
            self.config.workers
        );

        let summary = pool.install(|| {
            (0..self.config.population)
                .into_par_iter()
                .map(|index| {
                    let report = self.simulate(index as u64);
                    let summary = PopulationSummary::of(&report);
                    consumer(report);
                    summary
                })
                .reduce(PopulationSummary::default, PopulationSummary::merge)
        });

        tracing::info!(
            "Streamed {} entities in {:.2?}: {} deceased, {} failed",
            summary.population,
            started.elapsed(),
            summary.deceased,
            summary.failed
        );
        Ok(summary)
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()?)
    }
}
