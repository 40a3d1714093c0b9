//! Serving-cycle arithmetic.
//!
//! Cycles are always re-anchored to the subscription's original start date,
//! so boundaries never drift however many renewals have elapsed.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::{add_days, days_between};
use crate::types::Plan;

/// Start and (skip-extended) end of the cycle containing some "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CycleWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Start of the cycle that contains `today`.
///
/// Dates before `base_start` resolve to `base_start` itself.
pub fn current_cycle_start(base_start: NaiveDate, plan: Plan, today: NaiveDate) -> NaiveDate {
    let period = plan.period_days();
    let diff = days_between(base_start, today);
    let cycles = if diff > 0 { diff / period } else { 0 };
    add_days(base_start, cycles * period)
}

/// Unextended last day of the cycle beginning at `cycle_start`.
pub fn base_cycle_end(cycle_start: NaiveDate, plan: Plan) -> NaiveDate {
    add_days(cycle_start, plan.period_days() - 1)
}

/// Push `base_end` out by one day for every skipped date inside the cycle.
///
/// Extending the end can pull further skip dates into range, so the count is
/// re-evaluated until it stops changing. The absorbed count is monotone and
/// bounded by the number of distinct skip dates, so this settles after at most
/// `skipped.len() + 1` passes.
pub fn extended_cycle_end(
    base_end: NaiveDate,
    cycle_start: NaiveDate,
    skipped: &[NaiveDate],
) -> NaiveDate {
    let skipped: BTreeSet<NaiveDate> = skipped
        .iter()
        .copied()
        .filter(|d| *d >= cycle_start)
        .collect();

    let mut end = base_end;
    loop {
        let absorbed = skipped.range(cycle_start..=end).count() as i64;
        let next = add_days(base_end, absorbed);
        if next == end {
            return end;
        }
        end = next;
    }
}

/// The cycle containing `today`, with its end extended by `skipped` dates.
pub fn cycle_window(
    base_start: NaiveDate,
    plan: Plan,
    today: NaiveDate,
    skipped: &[NaiveDate],
) -> CycleWindow {
    let start = current_cycle_start(base_start, plan, today);
    let end = extended_cycle_end(base_cycle_end(start, plan), start, skipped);
    CycleWindow { start, end }
}
