//! Simulation configuration with documented constants
//!
//! All tunables for a population run are collected here with explanations of
//! their purpose and how they interact with each other.

use crate::core::calendar::{MS_PER_DAY, MS_PER_YEAR};
use crate::core::types::Timestamp;

/// Configuration for a population run
///
/// Every field has a sensible default; tests and the demo binary override only
/// what they need.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    // === REPRODUCIBILITY ===
    /// Global run seed
    ///
    /// Combined with each entity's identifying seed to select that entity's
    /// random stream. Same seed + same modules = same output, for any number
    /// of workers.
    pub seed: u64,

    // === POPULATION ===
    /// Number of entities to simulate
    pub population: usize,

    /// Number of worker threads in the pool
    ///
    /// Each worker runs one entity's whole lifetime before taking the next.
    /// Output does not depend on this value.
    pub workers: usize,

    // === TIME ===
    /// Birth time of every entity (ms since epoch)
    ///
    /// Collaborators may move an entity's birth in `on_birth`.
    pub start_time: Timestamp,

    /// Length of one tick in milliseconds
    ///
    /// Delays shorter than a tick are released on the next tick, so this is
    /// the resolution of simulated time. One week keeps a 100 year lifetime
    /// at roughly 5200 ticks.
    pub time_step: i64,

    /// Upper bound on a simulated lifetime in years
    ///
    /// Entities that never reach a Death state stop here.
    pub max_lifespan_years: u32,

    // === ENGINE GUARDS ===
    /// Maximum depth of nested submodule calls
    ///
    /// Module graphs with cyclic calls are rejected at load, so this only
    /// trips on pathological (but acyclic) nesting.
    pub max_call_depth: usize,

    /// Maximum number of states one module instance may visit in one tick
    ///
    /// A cycle of action states with no Delay or Guard would otherwise spin
    /// forever. Exceeding it fails the entity, not the run.
    pub max_transitions_per_tick: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            population: 100,
            workers: 4,

            start_time: 0,
            time_step: 7 * MS_PER_DAY,
            max_lifespan_years: 100,

            max_call_depth: 64,
            max_transitions_per_tick: 10_000,
        }
    }
}

impl SimulationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum simulated lifetime in milliseconds, saturating at `i64::MAX`
    pub fn max_lifespan(&self) -> i64 {
        self.checked_max_lifespan().unwrap_or(i64::MAX)
    }

    fn checked_max_lifespan(&self) -> Option<i64> {
        i64::from(self.max_lifespan_years).checked_mul(MS_PER_YEAR)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be at least 1".into());
        }

        if self.time_step <= 0 {
            return Err(format!("time_step ({}) must be positive", self.time_step));
        }

        let lifespan = self.checked_max_lifespan().ok_or_else(|| {
            format!(
                "max_lifespan_years ({}) overflows simulated time",
                self.max_lifespan_years
            )
        })?;
        if self.start_time.checked_add(lifespan).is_none() {
            return Err(format!(
                "start_time ({}) plus max_lifespan_years ({}) overflows simulated time",
                self.start_time, self.max_lifespan_years
            ));
        }

        // A lifetime shorter than one tick would never step any module
        if lifespan < self.time_step {
            return Err(format!(
                "max_lifespan_years ({}) is shorter than one time_step ({} ms)",
                self.max_lifespan_years, self.time_step
            ));
        }

        if self.max_call_depth == 0 || self.max_transitions_per_tick == 0 {
            return Err("Engine limits must be positive".into());
        }

        Ok(())
    }
}
