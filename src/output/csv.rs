use anyhow::Result;

use crate::aggregate::daily::DailySummary;
use crate::aggregate::state::StateSummary;
use crate::aggregate::{ImbalanceSummary, PincodeSummary};
use crate::detect::spikes::MassRegistrationEvent;
use crate::detect::threshold::AnomalyRecord;
use crate::loader::SourceTable;
use crate::report::AnomalySummary;
use crate::schema::{DATE_COLUMN, DISTRICT_COLUMN, PINCODE_COLUMN, STATE_COLUMN};
use crate::sync::SourceSyncStats;

type Writer = csv::Writer<Vec<u8>>;

fn finish(writer: Writer) -> Result<String> {
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

fn opt_f64(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn label(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// Cleaned rows in the input column layout.
pub fn cleaned_table_to_csv(table: &SourceTable) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    let mut header = vec![DATE_COLUMN, STATE_COLUMN, DISTRICT_COLUMN, PINCODE_COLUMN];
    header.extend(table.schema().counters.iter().copied());
    writer.write_record(&header)?;
    for record in &table.records {
        let mut row = vec![
            record.date.clone(),
            label(&record.state),
            label(&record.district),
            record.pincode.clone(),
        ];
        row.extend(record.counters.iter().map(u64::to_string));
        writer.write_record(&row)?;
    }
    finish(writer)
}

pub fn cleaning_summary_to_csv(stats: &[SourceSyncStats]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "dataset",
        "original_rows",
        "cleaned_rows",
        "rows_removed",
        "removal_percentage",
    ])?;
    for s in stats {
        writer.write_record([
            s.dataset.to_string(),
            s.original_rows.to_string(),
            s.cleaned_rows.to_string(),
            s.rows_removed.to_string(),
            format!("{:.2}", s.removal_percentage),
        ])?;
    }
    finish(writer)
}

const PINCODE_HEADER: [&str; 6] = [
    "pincode",
    "state",
    "district",
    "enrolment_count",
    "biometric_update_count",
    "biometric_rate",
];

fn pincode_row(row: &PincodeSummary) -> [String; 6] {
    [
        row.pincode.clone(),
        label(&row.state),
        label(&row.district),
        row.enrolment_count.to_string(),
        row.biometric_update_count.to_string(),
        row.biometric_rate.to_string(),
    ]
}

pub fn pincode_summary_to_csv(rows: &[PincodeSummary]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(PINCODE_HEADER)?;
    for row in rows {
        writer.write_record(pincode_row(row))?;
    }
    finish(writer)
}

pub fn misuse_to_csv(flagged: &[AnomalyRecord<PincodeSummary>]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(PINCODE_HEADER)?;
    for record in flagged {
        writer.write_record(pincode_row(&record.subject))?;
    }
    finish(writer)
}

const IMBALANCE_HEADER: [&str; 6] = [
    "pincode",
    "state",
    "district",
    "adult_demographic_count",
    "child_enrolment",
    "adult_child_ratio",
];

fn imbalance_row(row: &ImbalanceSummary) -> [String; 6] {
    [
        row.pincode.clone(),
        label(&row.state),
        label(&row.district),
        row.adult_demographic_count.to_string(),
        row.child_enrolment.to_string(),
        opt_f64(row.adult_child_ratio),
    ]
}

pub fn imbalance_summary_to_csv(rows: &[ImbalanceSummary]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(IMBALANCE_HEADER)?;
    for row in rows {
        writer.write_record(imbalance_row(row))?;
    }
    finish(writer)
}

pub fn imbalance_to_csv(flagged: &[AnomalyRecord<ImbalanceSummary>]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(IMBALANCE_HEADER)?;
    for record in flagged {
        writer.write_record(imbalance_row(&record.subject))?;
    }
    finish(writer)
}

pub fn events_to_csv(events: &[MassRegistrationEvent]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "date",
        "enrolment_count",
        "demographic_count",
        "biometric_count",
        "total_activity",
    ])?;
    for e in events {
        writer.write_record([
            e.date.clone(),
            e.enrolment_count.to_string(),
            e.demographic_count.to_string(),
            e.biometric_count.to_string(),
            e.total_activity.to_string(),
        ])?;
    }
    finish(writer)
}

pub fn daily_summary_to_csv(rows: &[DailySummary]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "date",
        "biometric_count",
        "demographic_count",
        "enrolment_count",
        "child_enrolment",
        "adult_enrolment",
        "enrolment_z_score",
        "demographic_z_score",
        "biometric_z_score",
    ])?;
    for d in rows {
        writer.write_record([
            d.date.clone(),
            d.biometric_count.to_string(),
            d.demographic_count.to_string(),
            d.enrolment_count.to_string(),
            d.child_enrolment.to_string(),
            d.adult_enrolment.to_string(),
            opt_f64(d.enrolment_z_score),
            opt_f64(d.demographic_z_score),
            opt_f64(d.biometric_z_score),
        ])?;
    }
    finish(writer)
}

pub fn state_summary_to_csv(rows: &[StateSummary]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "state",
        "biometric_total",
        "demographic_total",
        "enrolment_total",
        "child_enrolment",
        "adult_enrolment",
        "total_activity",
        "bio_coverage_pct",
        "child_share_pct",
    ])?;
    for s in rows {
        writer.write_record([
            s.state.clone(),
            s.biometric_total.to_string(),
            s.demographic_total.to_string(),
            s.enrolment_total.to_string(),
            s.child_enrolment.to_string(),
            s.adult_enrolment.to_string(),
            s.total_activity.to_string(),
            opt_f64(s.bio_coverage_pct),
            opt_f64(s.child_share_pct),
        ])?;
    }
    finish(writer)
}

/// Flat `metric,value` view of the anomaly summary.
pub fn summary_to_csv(summary: &AnomalySummary) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["metric", "value"])?;
    let mut rows = vec![
        ("misuse_flagged".to_string(), summary.misuse.flagged.to_string()),
        ("misuse_high_threshold".to_string(), opt_f64(summary.misuse.high_threshold)),
        ("misuse_low_threshold".to_string(), opt_f64(summary.misuse.low_threshold)),
        ("misuse_total_enrolment".to_string(), summary.misuse.total_enrolment.to_string()),
        (
            "misuse_mean_biometric_rate".to_string(),
            opt_f64(summary.misuse.mean_biometric_rate),
        ),
        ("imbalance_flagged".to_string(), summary.imbalance.flagged.to_string()),
        ("imbalance_high_threshold".to_string(), opt_f64(summary.imbalance.high_threshold)),
        ("imbalance_low_threshold".to_string(), opt_f64(summary.imbalance.low_threshold)),
        (
            "imbalance_mean_adult_child_ratio".to_string(),
            opt_f64(summary.imbalance.mean_adult_child_ratio),
        ),
        ("spike_threshold".to_string(), summary.spikes.threshold.to_string()),
        ("mass_registration_events".to_string(), summary.spikes.events.to_string()),
        (
            "first_event".to_string(),
            summary.spikes.first_event.clone().unwrap_or_default(),
        ),
        (
            "last_event".to_string(),
            summary.spikes.last_event.clone().unwrap_or_default(),
        ),
        (
            "peak_total_activity".to_string(),
            summary
                .spikes
                .peak_total_activity
                .map(|v| v.to_string())
                .unwrap_or_default(),
        ),
    ];
    for (source, count) in &summary.spikes.spikes_per_source {
        rows.push((format!("{source}_spike_dates"), count.to_string()));
    }
    for (metric, value) in rows {
        writer.write_record([metric, value])?;
    }
    finish(writer)
}
