//! Attribute store - per-person table of dynamically typed facts

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A dynamically typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    Record(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Order two values of the same type
    ///
    /// Numbers order numerically and text lexicographically. Booleans and
    /// records only know equality. Values of different types are incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) if a == b => Some(Ordering::Equal),
            (Value::Record(a), Value::Record(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Record(_) => "record",
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// Named facts about one person; last write wins
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeStore {
    values: AHashMap<String, Value>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an attribute; unset attributes are `None`, never an error
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Write an attribute, returning the previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Add `delta` to a numeric attribute and return the new value
    ///
    /// Unset or non-numeric attributes count as 0.
    pub fn increment(&mut self, name: &str, delta: f64) -> f64 {
        let current = self.get(name).and_then(Value::as_f64).unwrap_or(0.0);
        let updated = current + delta;
        self.values.insert(name.to_string(), Value::Number(updated));
        updated
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Name-ordered copy of every attribute
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_attribute_is_none() {
        let store = AttributeStore::new();
        assert!(store.get("smoker").is_none());
        assert!(!store.contains("smoker"));
    }

    #[test]
    fn test_last_write_wins() {
        let mut store = AttributeStore::new();
        store.set("urban_rural_status", "rural");
        let previous = store.set("urban_rural_status", "urban");

        assert_eq!(previous, Some(Value::from("rural")));
        assert_eq!(store.get("urban_rural_status"), Some(&Value::from("urban")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_increment_starts_from_zero() {
        let mut store = AttributeStore::new();
        assert_eq!(store.increment("visits", 1.0), 1.0);
        assert_eq!(store.increment("visits", 2.0), 3.0);

        store.set("label", "text");
        assert_eq!(store.increment("label", 1.0), 1.0);
    }

    #[test]
    fn test_compare_same_types() {
        assert_eq!(Value::from(1.0).compare(&Value::from(2.0)), Some(Ordering::Less));
        assert_eq!(Value::from("b").compare(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::from(true).compare(&Value::from(true)), Some(Ordering::Equal));
        assert_eq!(Value::from(true).compare(&Value::from(false)), None);
    }

    #[test]
    fn test_compare_mixed_types_is_none() {
        assert_eq!(Value::from(1.0).compare(&Value::from("1")), None);
        assert_eq!(Value::from(false).compare(&Value::from(0.0)), None);
    }

    #[test]
    fn test_untagged_deserialization() {
        let values: Vec<Value> = serde_json::from_str(r#"[true, 3, "urban", {"a": 1}]"#).unwrap();
        assert_eq!(values[0], Value::Bool(true));
        assert_eq!(values[1], Value::Number(3.0));
        assert_eq!(values[2], Value::from("urban"));
        assert!(matches!(values[3], Value::Record(_)));
    }

    #[test]
    fn test_snapshot_is_ordered() {
        let mut store = AttributeStore::new();
        store.set("zeta", 1.0);
        store.set("alpha", 2.0);
        let keys: Vec<_> = store.snapshot().into_keys().collect();
        assert_eq!(keys, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
