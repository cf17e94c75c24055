use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::aggregate::{totals_by_date, DateSeries};
use crate::loader::SourceTable;
use crate::schema::{CounterGroup, SourceSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: String,
    pub enrolment_count: u64,
    pub demographic_count: u64,
    pub biometric_count: u64,
    pub child_enrolment: u64,
    pub adult_enrolment: u64,
    pub enrolment_z_score: Option<f64>,
    pub demographic_z_score: Option<f64>,
    pub biometric_z_score: Option<f64>,
}

pub fn daily_series(tables: &SourceSet<SourceTable>) -> SourceSet<DateSeries<u64>> {
    tables
        .as_ref()
        .map(|_, table| totals_by_date(table, CounterGroup::Total))
}

/// Outer join of the per-source daily totals, ascending by date, with each day's
/// z-score where one is defined.
pub fn daily_summary(
    tables: &SourceSet<SourceTable>,
    z_scores: &SourceSet<DateSeries<f64>>,
) -> Vec<DailySummary> {
    let totals = daily_series(tables);
    let child = totals_by_date(&tables.enrolment, CounterGroup::Child);
    let adult = totals_by_date(&tables.enrolment, CounterGroup::Adult);

    let dates = totals
        .iter()
        .flat_map(|(_, series)| series.keys().cloned())
        .collect::<BTreeSet<_>>();

    dates
        .into_iter()
        .map(|date| DailySummary {
            enrolment_count: totals.enrolment.get(&date).copied().unwrap_or(0),
            demographic_count: totals.demographic.get(&date).copied().unwrap_or(0),
            biometric_count: totals.biometric.get(&date).copied().unwrap_or(0),
            child_enrolment: child.get(&date).copied().unwrap_or(0),
            adult_enrolment: adult.get(&date).copied().unwrap_or(0),
            enrolment_z_score: z_scores.enrolment.get(&date).copied(),
            demographic_z_score: z_scores.demographic.get(&date).copied(),
            biometric_z_score: z_scores.biometric.get(&date).copied(),
            date,
        })
        .collect()
}
