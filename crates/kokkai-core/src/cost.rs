//! Monetary cost estimation
//!
//! Maps aggregated usage plus an optional price schedule to a USD estimate.
//! The estimate uses only the schedule's billing unit: usage recorded in any
//! other unit never leaks into the arithmetic, even when the billing unit's
//! own cell is zero.

use crate::api::ModelPrice;
use crate::usage::{Direction, UsageTotals};
use serde::Serialize;

/// Estimated cost of one request, in USD
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostEstimate {
    /// Cost attributed to the input side
    pub input_usd: f64,
    /// Cost attributed to the output side
    pub output_usd: f64,
    /// Sum across directions
    pub total_usd: f64,
}

/// Estimate the cost of the given usage under the given schedule.
///
/// Returns `None` when no price schedule is known for the active model;
/// usage-only display must still be possible in that case.
pub fn estimate(totals: &UsageTotals, price: Option<&ModelPrice>) -> Option<CostEstimate> {
    let price = price?;
    let unit = price.unit.as_str();
    let input_usd = totals.get(Direction::Input, unit) * price.unit_usd.input;
    let output_usd = totals.get(Direction::Output, unit) * price.unit_usd.output;
    Some(CostEstimate {
        input_usd,
        output_usd,
        total_usd: input_usd + output_usd,
    })
}
