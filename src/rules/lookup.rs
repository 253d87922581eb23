//! Lookup tables for table-driven transitions
//!
//! A table maps a tuple of person attributes to a probability. Each row holds
//! one cell per column; a cell matches either an exact value or an inclusive
//! numeric range. The first matching row wins.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::error::LoadError;
use crate::entity::attributes::Value;

/// One cell of a lookup row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Inclusive numeric range, written as `{"range": [low, high]}`
    Range { range: [f64; 2] },
    Exact(Value),
}

impl Cell {
    pub fn matches(&self, key: Option<&Value>) -> bool {
        let key = match key {
            Some(k) => k,
            None => return false,
        };
        match self {
            Cell::Range { range: [low, high] } => key
                .as_f64()
                .map_or(false, |x| *low <= x && x <= *high),
            Cell::Exact(expected) => key == expected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRow {
    pub cells: Vec<Cell>,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<LookupRow>,
}

impl LookupTable {
    /// Parse and validate a table from JSON
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let table: LookupTable = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        let invalid = |reason: String| LoadError::InvalidLookupTable {
            table: self.name.clone(),
            reason,
        };

        if self.columns.is_empty() {
            return Err(invalid("no columns".into()));
        }

        for (i, row) in self.rows.iter().enumerate() {
            if row.cells.len() != self.columns.len() {
                return Err(invalid(format!(
                    "row {} has {} cells for {} columns",
                    i,
                    row.cells.len(),
                    self.columns.len()
                )));
            }
            if !(0.0..=1.0).contains(&row.probability) {
                return Err(invalid(format!(
                    "row {} probability {} is outside [0, 1]",
                    i, row.probability
                )));
            }
            for cell in &row.cells {
                if let Cell::Range { range: [low, high] } = cell {
                    if low > high {
                        return Err(invalid(format!("row {} has range [{}, {}]", i, low, high)));
                    }
                }
            }
        }
        Ok(())
    }

    /// Probability of the first row matching `key`, or `None` on a miss
    pub fn resolve(&self, key: &[Option<Value>]) -> Option<f64> {
        if key.len() != self.columns.len() {
            return None;
        }
        self.rows
            .iter()
            .find(|row| {
                row.cells
                    .iter()
                    .zip(key)
                    .all(|(cell, value)| cell.matches(value.as_ref()))
            })
            .map(|row| row.probability)
    }
}

/// Every lookup table known to a registry, by name
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    tables: AHashMap<String, LookupTable>,
}

impl LookupTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: LookupTable) -> Result<(), LoadError> {
        if self.tables.contains_key(&table.name) {
            return Err(LoadError::DuplicateTable { table: table.name });
        }
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&LookupTable> {
        self.tables.get(name)
    }

    /// Probability for `key` in the named table; `None` for an unknown table or a miss
    pub fn probability(&self, name: &str, key: &[Option<Value>]) -> Option<f64> {
        self.tables.get(name).and_then(|table| table.resolve(key))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
