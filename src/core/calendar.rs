//! Simulated time units
//!
//! Module descriptions express durations and ages in calendar units. Everything
//! is converted to milliseconds using fixed average lengths; months and years
//! are not calendar-aware.

use serde::{Deserialize, Serialize};

use crate::core::types::Timestamp;

pub const MS_PER_SECOND: i64 = 1_000;
pub const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
pub const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;
pub const MS_PER_WEEK: i64 = 7 * MS_PER_DAY;
/// 365.25 days
pub const MS_PER_YEAR: i64 = 31_557_600_000;
pub const MS_PER_MONTH: i64 = MS_PER_YEAR / 12;

/// Unit of simulated time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Years,
    Months,
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl TimeUnit {
    pub fn millis(&self) -> i64 {
        match self {
            TimeUnit::Years => MS_PER_YEAR,
            TimeUnit::Months => MS_PER_MONTH,
            TimeUnit::Weeks => MS_PER_WEEK,
            TimeUnit::Days => MS_PER_DAY,
            TimeUnit::Hours => MS_PER_HOUR,
            TimeUnit::Minutes => MS_PER_MINUTE,
            TimeUnit::Seconds => MS_PER_SECOND,
        }
    }

    /// Convert a (possibly fractional) quantity of this unit to milliseconds
    pub fn to_millis(&self, quantity: f64) -> i64 {
        (quantity * self.millis() as f64).round() as i64
    }
}

/// A fixed amount of time, as written in module descriptions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub quantity: f64,
    pub unit: TimeUnit,
}

impl Quantity {
    pub fn millis(&self) -> i64 {
        self.unit.to_millis(self.quantity)
    }
}

/// Whole units elapsed between `from` and `to` (0 when `to` precedes `from`)
pub fn whole_units_between(from: Timestamp, to: Timestamp, unit: TimeUnit) -> i64 {
    if to <= from {
        return 0;
    }
    (to - from) / unit.millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_lengths_are_ordered() {
        assert!(TimeUnit::Years.millis() > TimeUnit::Months.millis());
        assert!(TimeUnit::Months.millis() > TimeUnit::Weeks.millis());
        assert!(TimeUnit::Weeks.millis() > TimeUnit::Days.millis());
        assert!(TimeUnit::Days.millis() > TimeUnit::Hours.millis());
        assert_eq!(TimeUnit::Seconds.millis(), 1_000);
    }

    #[test]
    fn test_fractional_quantity() {
        assert_eq!(TimeUnit::Days.to_millis(0.5), 12 * MS_PER_HOUR);
        let q = Quantity { quantity: 2.0, unit: TimeUnit::Weeks };
        assert_eq!(q.millis(), 14 * MS_PER_DAY);
    }

    #[test]
    fn test_whole_units_between() {
        let birth = 0;
        let now = 10 * MS_PER_YEAR + 3 * MS_PER_MONTH;
        assert_eq!(whole_units_between(birth, now, TimeUnit::Years), 10);
        assert_eq!(whole_units_between(birth, now, TimeUnit::Months), 123);
        assert_eq!(whole_units_between(now, birth, TimeUnit::Years), 0);
    }

    #[test]
    fn test_unit_deserializes_lowercase() {
        let unit: TimeUnit = serde_json::from_str("\"months\"").unwrap();
        assert_eq!(unit, TimeUnit::Months);
    }
}
