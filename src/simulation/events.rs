//! Events emitted while stepping module instances
//!
//! The engine never keeps a record history of its own; everything a person
//! "did" is a `HealthEvent` handed to a `RecordSink`.

use serde::Serialize;

use crate::core::types::{Code, EntityId, Timestamp};
use crate::entity::attributes::Value;

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    /// SetAttribute and Counter states; `None` means the attribute was cleared
    AttributeSet {
        attribute: String,
        value: Option<Value>,
    },
    EncounterStarted {
        class: String,
        codes: Vec<Code>,
    },
    EncounterEnded,
    ConditionOnset {
        code: Code,
    },
    ConditionEnded {
        code: String,
    },
    MedicationOrdered {
        code: Code,
    },
    MedicationEnded {
        code: String,
    },
    ProcedurePerformed {
        code: Code,
        /// Milliseconds
        duration: Option<i64>,
    },
    ObservationRecorded {
        code: Code,
        value: Option<Value>,
        unit: Option<String>,
    },
    VitalSignSet {
        vital_sign: String,
        value: f64,
        unit: Option<String>,
    },
    SymptomSet {
        symptom: String,
        severity: f64,
        cause: Option<String>,
    },
    Death {
        cause: Option<Code>,
    },
}

/// One event, stamped with who, when and where in which module
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthEvent {
    pub entity: EntityId,
    pub time: Timestamp,
    pub module: String,
    pub state: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl HealthEvent {
    pub fn is_death(&self) -> bool {
        matches!(self.kind, EventKind::Death { .. })
    }
}

/// Destination for emitted events
pub trait RecordSink {
    fn record(&mut self, event: HealthEvent);
}

impl RecordSink for Vec<HealthEvent> {
    fn record(&mut self, event: HealthEvent) {
        self.push(event);
    }
}
