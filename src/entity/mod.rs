//! Entity context - the simulated person and the state it carries

pub mod attributes;
pub mod collaborator;
pub mod person;
pub mod record;

pub use attributes::{AttributeStore, Value};
pub use collaborator::{Collaborator, NoCollaborators};
pub use person::Person;
pub use record::{ActiveSet, HealthRecord};
