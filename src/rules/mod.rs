//! Conditions, transitions and lookup tables - the rule language of module graphs

pub mod condition;
pub mod lookup;
pub mod transition;

pub use condition::{Comparator, Condition};
pub use lookup::{Cell, LookupRow, LookupTable, LookupTables};
pub use transition::{Clause, LookupTransition, Outcome, Transition, Weighted, WEIGHT_TOLERANCE};
