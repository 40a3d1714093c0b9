//! Servings progress for the cycle a subscription is currently in.
//!
//! This is the same math the storefront renders from delivery history; the
//! listing endpoints reuse it so both sides always agree.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cycle::{base_cycle_end, current_cycle_start, extended_cycle_end};
use crate::types::Plan;

/// What happened (or will happen) to one scheduled serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServingOutcome {
    Delivered,
    Skipped,
    /// Still somewhere in the kitchen pipeline.
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServingRecord {
    pub date: NaiveDate,
    pub outcome: ServingOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleProgress {
    pub cycle_start_date: NaiveDate,
    pub cycle_end_date: NaiveDate,
    pub delivered: u32,
    pub skipped: u32,
    pub total: u32,
    pub remaining: u32,
    /// Whole percent, 0–100.
    pub progress: u8,
}

/// Project cycle progress from a subscription's delivery history.
pub fn project_progress(
    plan: Plan,
    base_start: NaiveDate,
    today: NaiveDate,
    history: &[ServingRecord],
) -> CycleProgress {
    let start = current_cycle_start(base_start, plan, today);
    let skipped_dates: Vec<NaiveDate> = history
        .iter()
        .filter(|r| r.outcome == ServingOutcome::Skipped)
        .map(|r| r.date)
        .collect();
    let end = extended_cycle_end(base_cycle_end(start, plan), start, &skipped_dates);

    let in_cycle = |r: &&ServingRecord| r.date >= start && r.date <= end;
    let delivered = history
        .iter()
        .filter(in_cycle)
        .filter(|r| r.outcome == ServingOutcome::Delivered)
        .count() as u32;
    let skipped = history
        .iter()
        .filter(in_cycle)
        .filter(|r| r.outcome == ServingOutcome::Skipped)
        .count() as u32;

    let total = plan.default_total_servings();
    let remaining = total.saturating_sub(delivered);
    let progress = if total == 0 {
        0
    } else {
        (delivered.saturating_mul(100) / total).min(100) as u8
    };

    CycleProgress {
        cycle_start_date: start,
        cycle_end_date: end,
        delivered,
        skipped,
        total,
        remaining,
        progress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::parse_iso_date;

    fn rec(date: &str, outcome: ServingOutcome) -> ServingRecord {
        ServingRecord {
            date: parse_iso_date(date).unwrap(),
            outcome,
        }
    }

    #[test]
    fn weekly_progress_counts_delivered_in_cycle() {
        let history = [
            rec("2024-01-01", ServingOutcome::Delivered),
            rec("2024-01-02", ServingOutcome::Delivered),
            rec("2024-01-03", ServingOutcome::Skipped),
            rec("2024-01-04", ServingOutcome::Scheduled),
            rec("2024-01-05", ServingOutcome::Scheduled),
            rec("2024-01-08", ServingOutcome::Scheduled),
        ];
        let p = project_progress(
            Plan::Weekly,
            parse_iso_date("2024-01-01").unwrap(),
            parse_iso_date("2024-01-03").unwrap(),
            &history,
        );
        assert_eq!(p.cycle_start_date, parse_iso_date("2024-01-01").unwrap());
        // one skip inside the cycle stretches it by a day
        assert_eq!(p.cycle_end_date, parse_iso_date("2024-01-08").unwrap());
        assert_eq!(p.delivered, 2);
        assert_eq!(p.skipped, 1);
        assert_eq!(p.total, 5);
        assert_eq!(p.remaining, 3);
        assert_eq!(p.progress, 40);
    }

    #[test]
    fn progress_caps_at_one_hundred() {
        let history: Vec<ServingRecord> = (1..=7)
            .map(|day| rec(&format!("2024-01-0{day}"), ServingOutcome::Delivered))
            .collect();
        let p = project_progress(
            Plan::Weekly,
            parse_iso_date("2024-01-01").unwrap(),
            parse_iso_date("2024-01-07").unwrap(),
            &history,
        );
        assert_eq!(p.remaining, 0);
        assert_eq!(p.progress, 100);
    }
}
