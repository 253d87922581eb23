//! Simulation: stepping module instances, per-person lifetimes and the
//! population scheduler

pub mod engine;
pub mod events;
pub mod instance;
pub mod lifecycle;
pub mod population;

pub use engine::{Engine, StepOutcome};
pub use events::{EventKind, HealthEvent, RecordSink};
pub use instance::{CallFrame, InstanceStatus, ModuleInstance};
pub use lifecycle::{simulate_entity, EntityReport};
pub use population::{Population, PopulationReport, PopulationSummary};
