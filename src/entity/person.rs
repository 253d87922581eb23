//! Person - the entity context every module instance runs against

use ahash::AHashMap;

use crate::core::calendar::{whole_units_between, TimeUnit};
use crate::core::rng::EntityRng;
use crate::core::types::{EntityId, Timestamp};
use crate::entity::attributes::{AttributeStore, Value};
use crate::entity::record::HealthRecord;

/// Attribute written by collaborators for the Gender condition
pub const GENDER: &str = "gender";
/// Attribute written by collaborators for the Race condition
pub const RACE: &str = "race";
/// Lookup key resolved from birth time when no attribute of that name is set
pub const AGE: &str = "age";

/// One simulated person
///
/// Owned by exactly one worker for its whole lifetime; nothing in here is
/// synchronized.
#[derive(Debug, Clone)]
pub struct Person {
    pub id: EntityId,
    pub birth: Timestamp,
    pub attributes: AttributeStore,
    pub record: HealthRecord,
    pub rng: EntityRng,
    vital_signs: AHashMap<String, f64>,
    /// state name -> last entry time
    state_entries: AHashMap<String, Timestamp>,
    deceased: Option<Timestamp>,
}

impl Person {
    pub fn new(id: EntityId, run_seed: u64, birth: Timestamp) -> Self {
        Self {
            id,
            birth,
            attributes: AttributeStore::new(),
            record: HealthRecord::new(),
            rng: EntityRng::new(run_seed, id.seed()),
            vital_signs: AHashMap::new(),
            state_entries: AHashMap::new(),
            deceased: None,
        }
    }

    /// Whole units of age at `time`
    pub fn age(&self, time: Timestamp, unit: TimeUnit) -> i64 {
        whole_units_between(self.birth, time, unit)
    }

    pub fn age_in_years(&self, time: Timestamp) -> i64 {
        self.age(time, TimeUnit::Years)
    }

    pub fn set_vital_sign(&mut self, name: &str, value: f64) {
        self.vital_signs.insert(name.to_string(), value);
    }

    pub fn vital_sign(&self, name: &str) -> Option<f64> {
        self.vital_signs.get(name).copied()
    }

    /// Value used as a lookup-table key
    ///
    /// Stored attributes win; `age` falls back to whole years since birth.
    pub fn lookup_key(&self, name: &str, time: Timestamp) -> Option<Value> {
        match self.attributes.get(name) {
            Some(value) => Some(value.clone()),
            None if name == AGE => Some(Value::Number(self.age_in_years(time) as f64)),
            None => None,
        }
    }

    pub fn note_state_entry(&mut self, state: &str, time: Timestamp) {
        self.state_entries.insert(state.to_string(), time);
    }

    /// Last time any module of this person entered the named state
    pub fn last_entered(&self, state: &str) -> Option<Timestamp> {
        self.state_entries.get(state).copied()
    }

    pub fn die(&mut self, time: Timestamp) {
        if self.deceased.is_none() {
            self.deceased = Some(time);
        }
    }

    pub fn is_alive(&self) -> bool {
        self.deceased.is_none()
    }

    pub fn deceased_at(&self) -> Option<Timestamp> {
        self.deceased
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calendar::MS_PER_YEAR;

    #[test]
    fn test_age_from_birth() {
        let person = Person::new(EntityId(1), 0, 5 * MS_PER_YEAR);
        assert_eq!(person.age_in_years(5 * MS_PER_YEAR), 0);
        assert_eq!(person.age_in_years(47 * MS_PER_YEAR + 1), 42);
        assert_eq!(person.age(6 * MS_PER_YEAR, TimeUnit::Months), 12);
    }

    #[test]
    fn test_lookup_key_prefers_attribute() {
        let mut person = Person::new(EntityId(1), 0, 0);
        let now = 30 * MS_PER_YEAR;
        assert_eq!(person.lookup_key(AGE, now), Some(Value::Number(30.0)));

        person.attributes.set(AGE, 12.0);
        assert_eq!(person.lookup_key(AGE, now), Some(Value::Number(12.0)));
        assert_eq!(person.lookup_key("income", now), None);
    }

    #[test]
    fn test_death_is_recorded_once() {
        let mut person = Person::new(EntityId(1), 0, 0);
        assert!(person.is_alive());
        person.die(10);
        person.die(20);
        assert!(!person.is_alive());
        assert_eq!(person.deceased_at(), Some(10));
    }

    #[test]
    fn test_state_entries() {
        let mut person = Person::new(EntityId(1), 0, 0);
        person.note_state_entry("Diagnosis", 5);
        person.note_state_entry("Diagnosis", 9);
        assert_eq!(person.last_entered("Diagnosis"), Some(9));
        assert_eq!(person.last_entered("Never"), None);
    }
}
