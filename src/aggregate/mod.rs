pub mod daily;
pub mod state;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::loader::SourceTable;
use crate::schema::CounterGroup;

/// Date-keyed values. Keys are canonical ISO dates, so iteration is chronological.
pub type DateSeries<T> = BTreeMap<String, T>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Labels {
    pub state: Option<String>,
    pub district: Option<String>,
}

impl Labels {
    fn fill_from(&mut self, state: Option<&String>, district: Option<&String>) {
        if self.state.is_none() {
            self.state = state.cloned();
        }
        if self.district.is_none() {
            self.district = district.cloned();
        }
    }

    fn or(self, other: &Labels) -> Labels {
        Labels {
            state: self.state.or_else(|| other.state.clone()),
            district: self.district.or_else(|| other.district.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PincodeTotal {
    pub labels: Labels,
    pub count: u64,
}

/// Sums a counter group per pincode. Labels are the first non-empty state and
/// district seen in input order.
pub fn totals_by_pincode(table: &SourceTable, group: CounterGroup) -> BTreeMap<String, PincodeTotal> {
    let schema = table.schema();
    let mut totals: BTreeMap<String, PincodeTotal> = BTreeMap::new();
    for record in &table.records {
        let entry = totals.entry(record.pincode.clone()).or_default();
        entry.count = entry.count.saturating_add(schema.sum(&record.counters, group));
        entry
            .labels
            .fill_from(record.state.as_ref(), record.district.as_ref());
    }
    totals
}

pub fn totals_by_date(table: &SourceTable, group: CounterGroup) -> DateSeries<u64> {
    let schema = table.schema();
    let mut totals = DateSeries::new();
    for record in &table.records {
        let total = totals.entry(record.date.clone()).or_insert(0u64);
        *total = total.saturating_add(schema.sum(&record.counters, group));
    }
    totals
}

struct JoinedRow {
    pincode: String,
    labels: Labels,
    left: u64,
    right: u64,
}

/// Outer join on pincode; a side without the key contributes zero.
fn outer_join(
    left: BTreeMap<String, PincodeTotal>,
    mut right: BTreeMap<String, PincodeTotal>,
) -> Vec<JoinedRow> {
    let mut rows = Vec::with_capacity(left.len().max(right.len()));
    for (pincode, l) in left {
        let r = right.remove(&pincode).unwrap_or_default();
        rows.push(JoinedRow {
            labels: l.labels.or(&r.labels),
            pincode,
            left: l.count,
            right: r.count,
        });
    }
    for (pincode, r) in right {
        rows.push(JoinedRow {
            pincode,
            labels: r.labels,
            left: 0,
            right: r.count,
        });
    }
    rows.sort_by(|a, b| a.pincode.cmp(&b.pincode));
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PincodeSummary {
    pub pincode: String,
    pub state: Option<String>,
    pub district: Option<String>,
    pub enrolment_count: u64,
    pub biometric_update_count: u64,
    pub biometric_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceSummary {
    pub pincode: String,
    pub state: Option<String>,
    pub district: Option<String>,
    pub adult_demographic_count: u64,
    pub child_enrolment: u64,
    pub adult_child_ratio: Option<f64>,
}

/// Biometric updates per 100 enrolments; zero when there were no enrolments.
pub fn biometric_rate(biometric: u64, enrolment: u64) -> f64 {
    if enrolment == 0 {
        0.0
    } else {
        biometric as f64 / enrolment as f64 * 100.0
    }
}

pub fn adult_child_ratio(adult: u64, child: u64) -> Option<f64> {
    if child == 0 {
        None
    } else {
        Some(adult as f64 / child as f64)
    }
}

pub fn pincode_summary(enrolment: &SourceTable, biometric: &SourceTable) -> Vec<PincodeSummary> {
    outer_join(
        totals_by_pincode(enrolment, CounterGroup::Total),
        totals_by_pincode(biometric, CounterGroup::Total),
    )
    .into_iter()
    .map(|row| PincodeSummary {
        biometric_rate: biometric_rate(row.right, row.left),
        pincode: row.pincode,
        state: row.labels.state,
        district: row.labels.district,
        enrolment_count: row.left,
        biometric_update_count: row.right,
    })
    .collect()
}

pub fn imbalance_summary(
    enrolment: &SourceTable,
    demographic: &SourceTable,
) -> Vec<ImbalanceSummary> {
    outer_join(
        totals_by_pincode(enrolment, CounterGroup::Child),
        totals_by_pincode(demographic, CounterGroup::Adult),
    )
    .into_iter()
    .map(|row| ImbalanceSummary {
        adult_child_ratio: adult_child_ratio(row.right, row.left),
        pincode: row.pincode,
        state: row.labels.state,
        district: row.labels.district,
        adult_demographic_count: row.right,
        child_enrolment: row.left,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        adult_child_ratio, biometric_rate, imbalance_summary, pincode_summary, totals_by_date,
        totals_by_pincode,
    };
    use crate::loader::{RawRecord, SourceTable};
    use crate::schema::{CounterGroup, SourceKind};

    fn row(date: &str, pincode: &str, state: Option<&str>, counters: &[u64]) -> RawRecord {
        RawRecord {
            date: date.to_string(),
            pincode: pincode.to_string(),
            state: state.map(str::to_string),
            district: None,
            counters: counters.to_vec(),
        }
    }

    #[test]
    fn pincode_labels_take_first_non_empty_value() {
        let table = SourceTable::new(
            SourceKind::Enrolment,
            vec![
                row("2025-03-01", "1", None, &[1, 1, 1]),
                row("2025-03-02", "1", Some("Assam"), &[1, 0, 0]),
                row("2025-03-03", "1", Some("Bihar"), &[0, 0, 2]),
            ],
        );
        let totals = totals_by_pincode(&table, CounterGroup::Total);
        let p1 = &totals["1"];
        assert_eq!(p1.count, 6);
        assert_eq!(p1.labels.state.as_deref(), Some("Assam"));
    }

    #[test]
    fn date_totals_use_source_formula() {
        let table = SourceTable::new(
            SourceKind::Biometric,
            vec![
                row("2025-03-01", "1", None, &[2, 3]),
                row("2025-03-01", "2", None, &[1, 1]),
                row("2025-03-02", "1", None, &[0, 4]),
            ],
        );
        let daily = totals_by_date(&table, CounterGroup::Total);
        assert_eq!(daily["2025-03-01"], 7);
        assert_eq!(daily["2025-03-02"], 4);
    }

    #[test]
    fn unmatched_pincodes_are_zero_filled() {
        let enrolment = SourceTable::new(
            SourceKind::Enrolment,
            vec![row("2025-03-01", "1", Some("Goa"), &[10, 10, 80])],
        );
        let biometric = SourceTable::new(
            SourceKind::Biometric,
            vec![row("2025-03-01", "2", Some("Kerala"), &[1, 4])],
        );
        let summary = pincode_summary(&enrolment, &biometric);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].pincode, "1");
        assert_eq!(summary[0].biometric_update_count, 0);
        assert_eq!(summary[0].biometric_rate, 0.0);
        assert_eq!(summary[1].enrolment_count, 0);
        assert_eq!(summary[1].biometric_rate, 0.0);
        assert_eq!(summary[1].state.as_deref(), Some("Kerala"));
    }

    #[test]
    fn imbalance_uses_child_enrolment_and_adult_demographic() {
        let enrolment = SourceTable::new(
            SourceKind::Enrolment,
            vec![
                row("2025-03-01", "1", None, &[2, 3, 50]),
                row("2025-03-01", "2", None, &[0, 0, 9]),
            ],
        );
        let demographic = SourceTable::new(
            SourceKind::Demographic,
            vec![
                row("2025-03-01", "1", None, &[7, 40]),
                row("2025-03-01", "2", None, &[1, 12]),
            ],
        );
        let summary = imbalance_summary(&enrolment, &demographic);
        assert_eq!(summary[0].child_enrolment, 5);
        assert_eq!(summary[0].adult_demographic_count, 40);
        assert_eq!(summary[0].adult_child_ratio, Some(8.0));
        assert_eq!(summary[1].child_enrolment, 0);
        assert_eq!(summary[1].adult_child_ratio, None);
    }

    #[test]
    fn ratios_are_guarded() {
        assert_eq!(biometric_rate(5, 0), 0.0);
        assert!((biometric_rate(5, 1000) - 0.5).abs() < 1e-12);
        assert_eq!(adult_child_ratio(5, 0), None);
    }
}
