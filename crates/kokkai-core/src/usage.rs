//! Incremental usage aggregation
//!
//! Streams report usage as per-source maps split by direction and unit. The
//! aggregator folds those maps into running totals per `(direction, unit)`
//! cell; the fold is plain summation, so it is associative and commutative
//! and any prefix of an event sequence yields a valid partial total.

use crate::api::{UnitCounts, UsageMap};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Direction of a usage count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Consumed by the request (prompt side)
    Input,
    /// Produced by the response (completion side)
    Output,
}

/// Running usage totals per `(direction, unit)` cell
///
/// Absent cells read as zero; unknown units are kept under their wire names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageTotals {
    cells: HashMap<Direction, UnitCounts>,
}

impl UsageTotals {
    /// Create empty totals
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one per-source usage map into the running totals
    pub fn fold(&mut self, usage: &UsageMap) {
        for entry in usage.values() {
            self.fold_counts(Direction::Input, &entry.input);
            self.fold_counts(Direction::Output, &entry.output);
        }
    }

    fn fold_counts(&mut self, direction: Direction, counts: &UnitCounts) {
        if counts.is_empty() {
            return;
        }
        let cell = self.cells.entry(direction).or_default();
        for (unit, count) in counts {
            *cell.entry(unit.clone()).or_insert(0.0) += count;
        }
    }

    /// Total for one `(direction, unit)` cell; absent cells are zero
    pub fn get(&self, direction: Direction, unit: &str) -> f64 {
        self.cells
            .get(&direction)
            .and_then(|cell| cell.get(unit))
            .copied()
            .unwrap_or(0.0)
    }

    /// All unit names seen so far, sorted for stable display
    pub fn units(&self) -> BTreeSet<&str> {
        self.cells
            .values()
            .flat_map(|cell| cell.keys().map(String::as_str))
            .collect()
    }

    /// Whether nothing has been folded yet
    pub fn is_empty(&self) -> bool {
        self.cells.values().all(|cell| cell.is_empty())
    }
}
