//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a simulated person
///
/// Doubles as the identifying seed of the person's random stream, so it must be
/// assigned deterministically (the population scheduler uses the entity index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Seed used to select this entity's random stream
    pub fn seed(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity-{}", self.0)
    }
}

/// Simulated time in milliseconds since the Unix epoch
pub type Timestamp = i64;

/// Opaque clinical code
///
/// Codes come from external catalogs; the interpreter only compares them by
/// their `code` string and passes them through to emitted events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Code {
    #[serde(default)]
    pub system: String,
    pub code: String,
    #[serde(default)]
    pub display: String,
}

impl Code {
    pub fn new(system: &str, code: &str, display: &str) -> Self {
        Self {
            system: system.to_string(),
            code: code.to_string(),
            display: display.to_string(),
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} ({})", self.code, self.display)
        }
    }
}
