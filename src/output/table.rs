use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::aggregate::{ImbalanceSummary, PincodeSummary};
use crate::detect::spikes::SpikeOutcome;
use crate::detect::threshold::ThresholdOutcome;
use crate::errors::PipelineWarning;
use crate::sync::SyncReport;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

fn threshold_line(label: &str, value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{label} {v:.3}"),
        None => format!("{label} undefined"),
    }
}

pub fn render_cleaning_table(report: &SyncReport) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Dataset",
        "Original",
        "Cleaned",
        "Removed",
        "Removed %",
        "Dates",
        "Pincodes",
        "Unparsed Dates",
    ]);
    for s in &report.per_source {
        table.add_row(vec![
            s.dataset.to_string(),
            s.original_rows.to_string(),
            s.cleaned_rows.to_string(),
            s.rows_removed.to_string(),
            format!("{:.2}", s.removal_percentage),
            format!("{} -> {}", s.distinct_dates_before, s.distinct_dates_after),
            format!(
                "{} -> {}",
                s.distinct_pincodes_before, s.distinct_pincodes_after
            ),
            s.unparsed_dates.to_string(),
        ]);
    }
    let verdict = |ok: bool| {
        if ok {
            Cell::new("match").fg(Color::Green)
        } else {
            Cell::new("MISMATCH").fg(Color::Red)
        }
    };
    let mut keys = new_table();
    keys.set_header(vec!["Key", "Common", "Across Sources"]);
    keys.add_row(Row::from(vec![
        Cell::new("dates"),
        Cell::new(report.common_dates),
        verdict(report.dates_match),
    ]));
    keys.add_row(Row::from(vec![
        Cell::new("pincodes"),
        Cell::new(report.common_pincodes),
        verdict(report.pincodes_match),
    ]));
    format!("{table}\n{keys}")
}

pub fn render_misuse_table(outcome: &ThresholdOutcome<PincodeSummary>, top: usize) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Rank",
        "Pincode",
        "State",
        "District",
        "Enrolments",
        "Bio Updates",
        "Bio Rate %",
    ]);
    for (idx, record) in outcome.flagged.iter().take(top).enumerate() {
        let p = &record.subject;
        table.add_row(Row::from(vec![
            Cell::new(idx + 1),
            Cell::new(&p.pincode),
            Cell::new(or_dash(p.state.as_deref())),
            Cell::new(or_dash(p.district.as_deref())),
            Cell::new(p.enrolment_count),
            Cell::new(p.biometric_update_count),
            Cell::new(format!("{:.3}", p.biometric_rate)).fg(Color::Yellow),
        ]));
    }
    format!(
        "{table}\n{} of {} pincodes flagged ({}, {})",
        outcome.flagged.len(),
        outcome.evaluated,
        threshold_line("enrolment >=", outcome.thresholds.primary),
        threshold_line("bio rate <=", outcome.thresholds.secondary),
    )
}

pub fn render_imbalance_table(outcome: &ThresholdOutcome<ImbalanceSummary>, top: usize) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Rank",
        "Pincode",
        "State",
        "District",
        "Adult Demo Updates",
        "Child Enrolments",
        "Adult/Child",
    ]);
    for (idx, record) in outcome.flagged.iter().take(top).enumerate() {
        let p = &record.subject;
        table.add_row(Row::from(vec![
            Cell::new(idx + 1),
            Cell::new(&p.pincode),
            Cell::new(or_dash(p.state.as_deref())),
            Cell::new(or_dash(p.district.as_deref())),
            Cell::new(p.adult_demographic_count),
            Cell::new(p.child_enrolment),
            Cell::new(
                p.adult_child_ratio
                    .map(|r| format!("{r:.2}"))
                    .unwrap_or_else(|| "-".to_string()),
            )
            .fg(Color::Yellow),
        ]));
    }
    format!(
        "{table}\n{} of {} pincodes flagged ({}, {})",
        outcome.flagged.len(),
        outcome.evaluated,
        threshold_line("adult updates >=", outcome.thresholds.primary),
        threshold_line("child enrolment <=", outcome.thresholds.secondary),
    )
}

pub fn render_spikes_table(outcome: &SpikeOutcome) -> String {
    let mut sources = new_table();
    sources.set_header(vec!["Source", "Dates", "Z Defined", "Spike Dates"]);
    for s in &outcome.per_source {
        let defined = if s.z_defined {
            Cell::new("yes")
        } else {
            Cell::new("no").fg(Color::Red)
        };
        sources.add_row(Row::from(vec![
            Cell::new(s.source),
            Cell::new(s.dates_evaluated),
            defined,
            Cell::new(s.spike_dates.len()),
        ]));
    }

    let mut events = new_table();
    events.set_header(vec![
        "Date",
        "Enrolments",
        "Demographic",
        "Biometric",
        "Total Activity",
    ]);
    for e in &outcome.events {
        events.add_row(vec![
            e.date.clone(),
            e.enrolment_count.to_string(),
            e.demographic_count.to_string(),
            e.biometric_count.to_string(),
            e.total_activity.to_string(),
        ]);
    }
    format!(
        "{sources}\n{events}\n{} mass registration event(s) at |z| > {}",
        outcome.events.len(),
        outcome.threshold
    )
}

pub fn render_warnings_table(warnings: &[PipelineWarning]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Warning"]);
    for w in warnings {
        table.add_row(vec![Cell::new(w.to_string()).fg(Color::Yellow)]);
    }
    table.to_string()
}
