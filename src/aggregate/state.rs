use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::loader::SourceTable;
use crate::schema::{CounterGroup, SourceKind, SourceSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSummary {
    pub state: String,
    pub biometric_total: u64,
    pub demographic_total: u64,
    pub enrolment_total: u64,
    pub child_enrolment: u64,
    pub adult_enrolment: u64,
    pub total_activity: u64,
    pub bio_coverage_pct: Option<f64>,
    pub child_share_pct: Option<f64>,
}

fn share_pct(part: u64, whole: u64) -> Option<f64> {
    if whole == 0 {
        return None;
    }
    let pct = part as f64 / whole as f64 * 100.0;
    Some((pct * 100.0).round() / 100.0)
}

/// Per-state activity across all three sources, busiest state first.
pub fn state_summary(tables: &SourceSet<SourceTable>) -> Vec<StateSummary> {
    let mut states: BTreeMap<String, StateSummary> = BTreeMap::new();
    for (kind, table) in tables.iter() {
        let schema = table.schema();
        for record in &table.records {
            let name = record.state.clone().unwrap_or_default();
            let entry = states.entry(name.clone()).or_insert_with(|| StateSummary {
                state: name,
                ..StateSummary::default()
            });
            let total = schema.sum(&record.counters, CounterGroup::Total);
            match kind {
                SourceKind::Enrolment => {
                    let child = schema.sum(&record.counters, CounterGroup::Child);
                    let adult = schema.sum(&record.counters, CounterGroup::Adult);
                    entry.enrolment_total = entry.enrolment_total.saturating_add(total);
                    entry.child_enrolment = entry.child_enrolment.saturating_add(child);
                    entry.adult_enrolment = entry.adult_enrolment.saturating_add(adult);
                }
                SourceKind::Demographic => {
                    entry.demographic_total = entry.demographic_total.saturating_add(total)
                }
                SourceKind::Biometric => {
                    entry.biometric_total = entry.biometric_total.saturating_add(total)
                }
            }
        }
    }

    let mut rows = states
        .into_values()
        .map(|mut row| {
            row.total_activity = row
                .biometric_total
                .saturating_add(row.demographic_total)
                .saturating_add(row.enrolment_total);
            row.bio_coverage_pct = share_pct(row.biometric_total, row.enrolment_total);
            row.child_share_pct = share_pct(row.child_enrolment, row.enrolment_total);
            row
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| b.total_activity.cmp(&a.total_activity));
    rows
}

#[cfg(test)]
mod tests {
    use super::state_summary;
    use crate::loader::{RawRecord, SourceTable};
    use crate::schema::{SourceKind, SourceSet};

    fn row(state: Option<&str>, counters: &[u64]) -> RawRecord {
        RawRecord {
            date: "2025-03-01".to_string(),
            pincode: "1".to_string(),
            state: state.map(str::to_string),
            district: None,
            counters: counters.to_vec(),
        }
    }

    #[test]
    fn ranks_states_by_total_activity() {
        let tables = SourceSet::new(
            SourceTable::new(
                SourceKind::Enrolment,
                vec![row(Some("Goa"), &[1, 1, 2]), row(Some("Assam"), &[0, 0, 0])],
            ),
            SourceTable::new(SourceKind::Demographic, vec![row(Some("Assam"), &[10, 10])]),
            SourceTable::new(SourceKind::Biometric, vec![row(Some("Goa"), &[1, 1])]),
        );
        let rows = state_summary(&tables);
        assert_eq!(rows[0].state, "Assam");
        assert_eq!(rows[0].total_activity, 20);
        assert_eq!(rows[0].bio_coverage_pct, None);
        assert_eq!(rows[1].state, "Goa");
        assert_eq!(rows[1].bio_coverage_pct, Some(50.0));
        assert_eq!(rows[1].child_share_pct, Some(50.0));
    }
}
