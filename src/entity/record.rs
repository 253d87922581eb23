//! Health record - what a person currently has active
//!
//! Only the live view the interpreter needs for its own conditions is kept
//! here. The full history is the event stream handed to the record sink.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::Timestamp;

/// Active codes of one clinical kind (conditions or medications)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveSet {
    /// code -> start time
    active: AHashMap<String, Timestamp>,
    /// originating state name -> code
    by_state: AHashMap<String, String>,
}

impl ActiveSet {
    /// Activate `code`; returns false if it was already active
    pub fn start(&mut self, code: &str, state: &str, time: Timestamp) -> bool {
        self.by_state.insert(state.to_string(), code.to_string());
        if self.active.contains_key(code) {
            return false;
        }
        self.active.insert(code.to_string(), time);
        true
    }

    /// Deactivate `code`; returns false if it was not active
    pub fn end(&mut self, code: &str) -> bool {
        self.active.remove(code).is_some()
    }

    pub fn is_active(&self, code: &str) -> bool {
        self.active.contains_key(code)
    }

    pub fn started_at(&self, code: &str) -> Option<Timestamp> {
        self.active.get(code).copied()
    }

    /// Code most recently started by the named state
    pub fn code_for_state(&self, state: &str) -> Option<&str> {
        self.by_state.get(state).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthRecord {
    pub conditions: ActiveSet,
    pub medications: ActiveSet,
    /// Name of the Encounter state that opened the current encounter
    pub encounter: Option<String>,
    /// symptom -> severity
    symptoms: AHashMap<String, f64>,
}

impl HealthRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_symptom(&mut self, symptom: &str, severity: f64) {
        self.symptoms.insert(symptom.to_string(), severity);
    }

    pub fn symptom(&self, symptom: &str) -> Option<f64> {
        self.symptoms.get(symptom).copied()
    }
}
