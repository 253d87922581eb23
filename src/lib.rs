//! Life Course - declarative state-machine interpreter for synthetic patient lifetimes
//!
//! Module graphs (JSON) describe how a person moves between health states.
//! The interpreter steps every attached module of every person through
//! simulated time, branching on conditions and seeded random draws, and
//! emits the resulting clinical events.

pub mod core;
pub mod entity;
pub mod modules;
pub mod rules;
pub mod simulation;

pub use crate::core::config::SimulationConfig;
pub use crate::core::error::{EngineError, LoadError, Result, SimulationError};
pub use crate::entity::{Collaborator, NoCollaborators, Person};
pub use crate::modules::{ModuleRegistry, RegistryBuilder};
pub use crate::simulation::{EntityReport, HealthEvent, Population, PopulationReport};
