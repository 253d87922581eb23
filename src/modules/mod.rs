//! Module graphs: description schema, loader/validator and registry

pub mod graph;
pub mod loader;
pub mod registry;
pub mod schema;
pub mod state;

pub use graph::Module;
pub use loader::{build_module, load_module_file, parse_module};
pub use registry::{ModuleRegistry, RegistryBuilder, LOOKUP_TABLE_DIR};
pub use state::{ClinicalRef, DurationSpec, NumberSpec, ObservationValue, State, StateKind};
