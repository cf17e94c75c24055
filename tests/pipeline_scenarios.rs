use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use pincode_anomaly::errors::{PipelineError, PipelineWarning};
use pincode_anomaly::output::files::write_run_outputs;
use pincode_anomaly::pipeline::{run, run_sync, PipelineConfig, SourceInput};
use pincode_anomaly::schema::{SourceKind, SourceSet};

const ENROL_HEADER: &str = "date,state,district,pincode,age_0_5,age_5_17,age_18_greater";
const DEMO_HEADER: &str = "date,state,district,pincode,demo_age_5_17,demo_age_17_";
const BIO_HEADER: &str = "date,state,district,pincode,bio_age_5_17,bio_age_17_";

struct Fixture {
    root: tempfile::TempDir,
    dirs: SourceSet<PathBuf>,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let dirs = SourceSet::new(
            root.path().join("enrolment"),
            root.path().join("demographic"),
            root.path().join("biometric"),
        );
        for (_, dir) in dirs.iter() {
            fs::create_dir_all(dir).expect("mkdir");
        }
        Self { root, dirs }
    }

    fn chunk(&self, kind: SourceKind, name: &str, header: &str, rows: &[String]) {
        let mut body = format!("{header}\n");
        for row in rows {
            writeln!(body, "{row}").expect("format row");
        }
        fs::write(self.dirs.get(kind).join(name), body).expect("write chunk");
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig::new(SourceSet::new(
            SourceInput::new(&self.dirs.enrolment),
            SourceInput::new(&self.dirs.demographic),
            SourceInput::new(&self.dirs.biometric),
        ))
    }

    fn out_dir(&self) -> PathBuf {
        self.root.path().join("cleaned_data")
    }
}

fn row(date: &str, pincode: &str, counters: &[u64]) -> String {
    let counters = counters
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("{date},Goa,North Goa,{pincode},{counters}")
}

#[test]
fn overlapping_dates_are_intersected() {
    let fx = Fixture::new();
    fx.chunk(
        SourceKind::Enrolment,
        "part_0.csv",
        ENROL_HEADER,
        &[
            row("01-03-2025", "403001", &[1, 1, 1]),
            row("02-03-2025", "403001", &[1, 1, 1]),
            row("03-03-2025", "403002", &[1, 1, 1]),
        ],
    );
    fx.chunk(
        SourceKind::Demographic,
        "part_0.csv",
        DEMO_HEADER,
        &[
            row("02-03-2025", "403002", &[1, 1]),
            row("03-03-2025", "403001", &[1, 1]),
            row("04-03-2025", "403001", &[1, 1]),
        ],
    );
    fx.chunk(
        SourceKind::Biometric,
        "part_0.csv",
        BIO_HEADER,
        &[
            row("02-03-2025", "403001", &[1, 1]),
            row("03-03-2025", "403002", &[1, 1]),
        ],
    );

    let cleaned = tokio_test::block_on(run_sync(&fx.config())).expect("sync");
    assert_eq!(cleaned.sync.common_dates, 2);
    assert_eq!(cleaned.sync.common_pincodes, 2);
    assert!(cleaned.sync.dates_match);
    assert!(cleaned.sync.pincodes_match);
    for (_, table) in cleaned.tables.iter() {
        for record in &table.records {
            assert!(["2025-03-02", "2025-03-03"].contains(&record.date.as_str()));
            assert!(["403001", "403002"].contains(&record.pincode.as_str()));
        }
    }
    assert_eq!(cleaned.sync.per_source[0].rows_removed, 1);
    assert_eq!(cleaned.sync.per_source[1].rows_removed, 1);
    assert_eq!(cleaned.sync.per_source[1].removal_percentage, 33.33);
}

#[test]
fn misuse_flags_low_positive_rate_and_skips_zero_rate() {
    let fx = Fixture::new();
    let date = "2025-03-01";
    let mut enrol = Vec::new();
    let mut demo = Vec::new();
    let mut bio = Vec::new();
    for i in 1..=9u64 {
        let pin = format!("50000{i}");
        enrol.push(row(date, &pin, &[0, 0, i * 10]));
        demo.push(row(date, &pin, &[1, 1]));
        bio.push(row(date, &pin, &[i * 5, 0]));
    }
    for (pin, enrolment, biometric) in [("600001", 1000, 0), ("600002", 1000, 5), ("600006", 950, 4)] {
        enrol.push(row(date, pin, &[0, 0, enrolment]));
        demo.push(row(date, pin, &[1, 1]));
        bio.push(row(date, pin, &[biometric, 0]));
    }
    fx.chunk(SourceKind::Enrolment, "a.csv", ENROL_HEADER, &enrol);
    fx.chunk(SourceKind::Demographic, "a.csv", DEMO_HEADER, &demo);
    fx.chunk(SourceKind::Biometric, "a.csv", BIO_HEADER, &bio);

    let result = tokio_test::block_on(run(&fx.config())).expect("run");
    let flagged = result
        .misuse
        .flagged
        .iter()
        .map(|r| r.subject.pincode.as_str())
        .collect::<Vec<_>>();
    assert_eq!(flagged, vec!["600002", "600006"]);
    assert_eq!(result.misuse.thresholds.primary, Some(305.0));
    assert_eq!(result.misuse.thresholds.secondary, Some(50.0));

    let zero = result
        .pincode_summary
        .iter()
        .find(|p| p.pincode == "600001")
        .expect("zero-rate pincode");
    assert_eq!(zero.biometric_rate, 0.0);

    // A single date leaves every daily series without variance.
    assert!(result.spikes.events.is_empty());
    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, PipelineWarning::UndefinedZScore { .. })));
}

#[test]
fn simultaneous_spike_becomes_event_and_files_are_written() {
    let fx = Fixture::new();
    let days = 1..=10u64;
    let value = |day: u64, base: u64| if day == 5 { base * 10 } else { base };
    let dates = |day: u64| format!("2025-03-{day:02}");
    fx.chunk(
        SourceKind::Enrolment,
        "a.csv",
        ENROL_HEADER,
        &days
            .clone()
            .map(|d| row(&dates(d), "110001", &[value(d, 100), 0, 0]))
            .collect::<Vec<_>>(),
    );
    fx.chunk(
        SourceKind::Demographic,
        "a.csv",
        DEMO_HEADER,
        &days
            .clone()
            .map(|d| row(&dates(d), "110001", &[0, value(d, 40)]))
            .collect::<Vec<_>>(),
    );
    fx.chunk(
        SourceKind::Biometric,
        "a.csv",
        BIO_HEADER,
        &days
            .map(|d| row(&dates(d), "110001", &[value(d, 10), 0]))
            .collect::<Vec<_>>(),
    );

    let result = tokio_test::block_on(run(&fx.config())).expect("run");
    assert_eq!(result.spikes.events.len(), 1);
    let event = &result.spikes.events[0];
    assert_eq!(event.date, "2025-03-05");
    assert_eq!(event.total_activity, 1500);
    assert_eq!(result.daily.len(), 10);
    let spike_day = &result.daily[4];
    assert!((spike_day.enrolment_z_score.expect("defined") - 3.0).abs() < 1e-9);

    let written = write_run_outputs(&result, &fx.out_dir()).expect("write outputs");
    assert_eq!(written.len(), 12);
    let events = fs::read_to_string(fx.out_dir().join("mass_registration_events.csv"))
        .expect("events file");
    assert_eq!(
        events.lines().collect::<Vec<_>>(),
        vec![
            "date,enrolment_count,demographic_count,biometric_count,total_activity",
            "2025-03-05,1000,400,100,1500",
        ]
    );
    let report = fs::read_to_string(fx.out_dir().join("run_report.json")).expect("report");
    let parsed: serde_json::Value = serde_json::from_str(&report).expect("json");
    assert_eq!(parsed["summary"]["spikes"]["events"], 1);
}

#[test]
fn disjoint_dates_warn_and_yield_empty_tables() {
    let fx = Fixture::new();
    fx.chunk(
        SourceKind::Enrolment,
        "a.csv",
        ENROL_HEADER,
        &[row("2025-01-01", "1", &[1, 1, 1])],
    );
    fx.chunk(
        SourceKind::Demographic,
        "a.csv",
        DEMO_HEADER,
        &[row("2025-01-02", "1", &[1, 1])],
    );
    fx.chunk(
        SourceKind::Biometric,
        "a.csv",
        BIO_HEADER,
        &[row("2025-01-01", "1", &[1, 1])],
    );

    let result = tokio_test::block_on(run(&fx.config())).expect("run");
    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, PipelineWarning::DegenerateIntersection { common_dates: 0, .. })));
    assert!(result.pincode_summary.is_empty());
    assert!(result.misuse.flagged.is_empty());
    assert!(result.spikes.events.is_empty());
    assert_eq!(result.summary.misuse.mean_biometric_rate, None);
}

#[test]
fn chunk_missing_a_column_is_skipped() {
    let fx = Fixture::new();
    let ok = [row("2025-01-01", "1", &[1, 2])];
    fx.chunk(SourceKind::Enrolment, "a.csv", ENROL_HEADER, &[row("2025-01-01", "1", &[1, 1, 1])]);
    fx.chunk(SourceKind::Demographic, "a.csv", DEMO_HEADER, &ok);
    fx.chunk(SourceKind::Biometric, "a.csv", BIO_HEADER, &ok);
    fx.chunk(
        SourceKind::Biometric,
        "b.csv",
        "date,state,district,pincode,bio_age_5_17",
        &["2025-01-01,Goa,North Goa,1,4".to_string()],
    );

    let cleaned = tokio_test::block_on(run_sync(&fx.config())).expect("sync");
    assert_eq!(cleaned.tables.biometric.len(), 1);
    assert!(cleaned
        .warnings()
        .iter()
        .any(|w| matches!(w, PipelineWarning::SkippedChunk { source: SourceKind::Biometric, .. })));
}

#[test]
fn missing_source_names_kind_and_directory() {
    let fx = Fixture::new();
    fx.chunk(SourceKind::Enrolment, "a.csv", ENROL_HEADER, &[row("2025-01-01", "1", &[1, 1, 1])]);
    fx.chunk(SourceKind::Demographic, "a.csv", DEMO_HEADER, &[row("2025-01-01", "1", &[1, 1])]);

    let err = tokio_test::block_on(run(&fx.config())).expect_err("biometric missing");
    let message = err.to_string();
    match err {
        PipelineError::MissingSource { kind, dir } => {
            assert_eq!(kind, SourceKind::Biometric);
            assert_eq!(dir, fx.dirs.biometric);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(message.contains("biometric"));
    assert!(message.contains(&path_text(&fx.dirs.biometric)));
}

fn path_text(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn oversized_counter_is_skipped_and_run_completes() {
    let fx = Fixture::new();
    fx.chunk(SourceKind::Enrolment, "a.csv", ENROL_HEADER, &[row("2025-01-01", "1", &[1, 1, 1])]);
    fx.chunk(SourceKind::Demographic, "a.csv", DEMO_HEADER, &[row("2025-01-01", "1", &[1, 1])]);
    fx.chunk(
        SourceKind::Biometric,
        "a.csv",
        BIO_HEADER,
        &[
            row("2025-01-01", "1", &[u64::MAX, 1]),
            row("2025-01-01", "1", &[2, 3]),
        ],
    );

    let result = tokio_test::block_on(run(&fx.config())).expect("run");
    assert_eq!(result.cleaned.tables.biometric.len(), 1);
    assert_eq!(result.pincode_summary[0].biometric_update_count, 5);
    assert!(result.warnings.iter().any(|w| matches!(
        w,
        PipelineWarning::SkippedLines { source: SourceKind::Biometric, count: 1, .. }
    )));
}
