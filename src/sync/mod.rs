pub mod normalize;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::PipelineWarning;
use crate::loader::{RawRecord, SourceTable};
use crate::schema::{SourceKind, SourceSet};
use crate::sync::normalize::{canonical_date, canonical_pincode};

/// Dates and pincodes present in every source after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommonDomain {
    pub dates: BTreeSet<String>,
    pub pincodes: BTreeSet<String>,
}

impl CommonDomain {
    pub fn contains(&self, record: &RawRecord) -> bool {
        self.dates.contains(&record.date) && self.pincodes.contains(&record.pincode)
    }

    pub fn is_degenerate(&self) -> bool {
        self.dates.is_empty() || self.pincodes.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeySets {
    pub dates: BTreeSet<String>,
    pub pincodes: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSyncStats {
    pub dataset: SourceKind,
    pub original_rows: usize,
    pub cleaned_rows: usize,
    pub rows_removed: usize,
    pub removal_percentage: f64,
    pub distinct_dates_before: usize,
    pub distinct_pincodes_before: usize,
    pub distinct_dates_after: usize,
    pub distinct_pincodes_after: usize,
    pub unparsed_dates: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub common_dates: usize,
    pub common_pincodes: usize,
    pub per_source: Vec<SourceSyncStats>,
    pub dates_match: bool,
    pub pincodes_match: bool,
    pub warnings: Vec<PipelineWarning>,
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub tables: SourceSet<SourceTable>,
    pub domain: CommonDomain,
    pub report: SyncReport,
}

/// Canonicalizes the date and pincode of every row. Returns the number of dates
/// that matched no known layout.
pub fn normalize_table(table: &mut SourceTable) -> usize {
    let mut unparsed = 0usize;
    for record in &mut table.records {
        let date = canonical_date(&record.date);
        if !date.parsed {
            unparsed += 1;
        }
        record.date = date.text;
        record.pincode = canonical_pincode(&record.pincode);
    }
    unparsed
}

pub fn key_sets(table: &SourceTable) -> KeySets {
    let mut keys = KeySets::default();
    for record in &table.records {
        keys.dates.insert(record.date.clone());
        keys.pincodes.insert(record.pincode.clone());
    }
    keys
}

pub fn common_domain(keys: &SourceSet<KeySets>) -> CommonDomain {
    let dates = intersect3(
        &keys.enrolment.dates,
        &keys.demographic.dates,
        &keys.biometric.dates,
    );
    let pincodes = intersect3(
        &keys.enrolment.pincodes,
        &keys.demographic.pincodes,
        &keys.biometric.pincodes,
    );
    CommonDomain { dates, pincodes }
}

fn intersect3(
    a: &BTreeSet<String>,
    b: &BTreeSet<String>,
    c: &BTreeSet<String>,
) -> BTreeSet<String> {
    a.iter()
        .filter(|key| b.contains(*key) && c.contains(*key))
        .cloned()
        .collect()
}

/// Normalizes keys, intersects them across the three sources and drops every
/// row outside the common domain.
pub fn synchronize(mut tables: SourceSet<SourceTable>) -> SyncOutcome {
    let unparsed = SourceSet::new(
        normalize_table(&mut tables.enrolment),
        normalize_table(&mut tables.demographic),
        normalize_table(&mut tables.biometric),
    );
    let before = tables.as_ref().map(|_, t| key_sets(t));
    let original_rows = tables.as_ref().map(|_, t| t.len());
    let domain = common_domain(&before);

    for (kind, keys) in before.iter() {
        info!(
            "{kind}: {} distinct dates, {} distinct pincodes",
            keys.dates.len(),
            keys.pincodes.len()
        );
    }
    info!(
        "common domain: {} dates, {} pincodes",
        domain.dates.len(),
        domain.pincodes.len()
    );

    let mut warnings = Vec::new();
    if domain.is_degenerate() {
        let warning = PipelineWarning::DegenerateIntersection {
            common_dates: domain.dates.len(),
            common_pincodes: domain.pincodes.len(),
        };
        warn!("{warning}");
        warnings.push(warning);
    }

    let tables = tables.map(|_, table| filter_table(table, &domain));
    let after = tables.as_ref().map(|_, t| key_sets(t));
    let dates_match = after.enrolment.dates == after.demographic.dates
        && after.demographic.dates == after.biometric.dates;
    let pincodes_match = after.enrolment.pincodes == after.demographic.pincodes
        && after.demographic.pincodes == after.biometric.pincodes;
    if !dates_match || !pincodes_match {
        warn!("synchronized key sets differ across sources");
    }

    let per_source = SourceKind::ALL
        .into_iter()
        .map(|kind| {
            let original = *original_rows.get(kind);
            let cleaned = tables.get(kind).len();
            SourceSyncStats {
                dataset: kind,
                original_rows: original,
                cleaned_rows: cleaned,
                rows_removed: original - cleaned,
                removal_percentage: removal_percentage(original, cleaned),
                distinct_dates_before: before.get(kind).dates.len(),
                distinct_pincodes_before: before.get(kind).pincodes.len(),
                distinct_dates_after: after.get(kind).dates.len(),
                distinct_pincodes_after: after.get(kind).pincodes.len(),
                unparsed_dates: *unparsed.get(kind),
            }
        })
        .collect::<Vec<_>>();
    for stats in &per_source {
        info!(
            "{}: {} -> {} rows ({} removed)",
            stats.dataset, stats.original_rows, stats.cleaned_rows, stats.rows_removed
        );
    }

    SyncOutcome {
        report: SyncReport {
            common_dates: domain.dates.len(),
            common_pincodes: domain.pincodes.len(),
            per_source,
            dates_match,
            pincodes_match,
            warnings,
        },
        tables,
        domain,
    }
}

fn filter_table(table: SourceTable, domain: &CommonDomain) -> SourceTable {
    let records = table
        .records
        .into_iter()
        .filter(|record| domain.contains(record))
        .collect();
    SourceTable::new(table.kind, records)
}

pub fn removal_percentage(original: usize, cleaned: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    let pct = (1.0 - cleaned as f64 / original as f64) * 100.0;
    (pct * 100.0).round() / 100.0
}
