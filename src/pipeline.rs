use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::daily::{daily_series, daily_summary, DailySummary};
use crate::aggregate::state::{state_summary, StateSummary};
use crate::aggregate::{imbalance_summary, pincode_summary, ImbalanceSummary, PincodeSummary};
use crate::detect::spikes::{SpikeDetector, SpikeOutcome, DEFAULT_SPIKE_Z_SCORE};
use crate::detect::threshold::{ThresholdOutcome, Thresholds};
use crate::detect::{
    detect_imbalance, detect_misuse, DEFAULT_HIGH_PERCENTILE, DEFAULT_LOW_PERCENTILE,
};
use crate::errors::{PipelineError, PipelineWarning};
use crate::loader::{load_source, LoadReport, SourceTable};
use crate::report::AnomalySummary;
use crate::schema::{SourceKind, SourceSet};
use crate::sync::{synchronize, SyncReport};

/// Where one source's chunk files live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInput {
    pub dir: PathBuf,
    pub pattern: String,
}

impl SourceInput {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pattern: "*.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionThresholds {
    pub high_percentile: f64,
    pub low_percentile: f64,
    pub spike_z_score: f64,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            high_percentile: DEFAULT_HIGH_PERCENTILE,
            low_percentile: DEFAULT_LOW_PERCENTILE,
            spike_z_score: DEFAULT_SPIKE_Z_SCORE,
        }
    }
}

/// Everything a run needs. Built from `Config` by the binary, or directly by tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub sources: SourceSet<SourceInput>,
    pub thresholds: DetectionThresholds,
    pub parallel: bool,
}

impl PipelineConfig {
    pub fn new(sources: SourceSet<SourceInput>) -> Self {
        Self {
            sources,
            thresholds: DetectionThresholds::default(),
            parallel: true,
        }
    }
}

/// Cleaned tables plus the reports produced on the way.
#[derive(Debug, Clone)]
pub struct SyncRun {
    pub tables: SourceSet<SourceTable>,
    pub loads: Vec<LoadReport>,
    pub sync: SyncReport,
}

impl SyncRun {
    pub fn warnings(&self) -> Vec<PipelineWarning> {
        self.loads
            .iter()
            .flat_map(|l| l.warnings.iter().cloned())
            .chain(self.sync.warnings.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub thresholds: DetectionThresholds,
    pub cleaned: SyncRun,
    pub pincode_summary: Vec<PincodeSummary>,
    pub imbalance_summary: Vec<ImbalanceSummary>,
    pub daily: Vec<DailySummary>,
    pub states: Vec<StateSummary>,
    pub misuse: ThresholdOutcome<PincodeSummary>,
    pub imbalance: ThresholdOutcome<ImbalanceSummary>,
    pub spikes: SpikeOutcome,
    pub summary: AnomalySummary,
    pub warnings: Vec<PipelineWarning>,
}

/// Serialized as `run_report.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub thresholds: DetectionThresholds,
    pub misuse_thresholds: Thresholds,
    pub imbalance_thresholds: Thresholds,
    pub loads: Vec<LoadReport>,
    pub sync: SyncReport,
    pub summary: AnomalySummary,
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineRun {
    pub fn report(&self) -> RunReport {
        RunReport {
            generated_at: Utc::now(),
            thresholds: self.thresholds,
            misuse_thresholds: self.misuse.thresholds,
            imbalance_thresholds: self.imbalance.thresholds,
            loads: self.cleaned.loads.clone(),
            sync: self.cleaned.sync.clone(),
            summary: self.summary.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

fn load_blocking(
    kind: SourceKind,
    input: SourceInput,
) -> Result<(SourceTable, LoadReport), PipelineError> {
    load_source(kind, &input.dir, &input.pattern)
}

async fn spawn_load(
    kind: SourceKind,
    input: SourceInput,
) -> Result<(SourceTable, LoadReport), PipelineError> {
    tokio::task::spawn_blocking(move || load_blocking(kind, input))
        .await
        .map_err(|e| PipelineError::Join(format!("{kind}: {e}")))?
}

/// Loads all three sources. With `parallel` set the loads run on the blocking
/// pool at once; the first failure aborts the run either way.
pub async fn load_all(
    config: &PipelineConfig,
) -> Result<(SourceSet<SourceTable>, Vec<LoadReport>), PipelineError> {
    let inputs = config.sources.clone();
    let (enrolment, demographic, biometric) = if config.parallel {
        tokio::try_join!(
            spawn_load(SourceKind::Enrolment, inputs.enrolment),
            spawn_load(SourceKind::Demographic, inputs.demographic),
            spawn_load(SourceKind::Biometric, inputs.biometric),
        )?
    } else {
        (
            load_blocking(SourceKind::Enrolment, inputs.enrolment)?,
            load_blocking(SourceKind::Demographic, inputs.demographic)?,
            load_blocking(SourceKind::Biometric, inputs.biometric)?,
        )
    };
    let tables = SourceSet::new(enrolment.0, demographic.0, biometric.0);
    Ok((tables, vec![enrolment.1, demographic.1, biometric.1]))
}

pub async fn run_sync(config: &PipelineConfig) -> Result<SyncRun, PipelineError> {
    let (tables, loads) = load_all(config).await?;
    let outcome = synchronize(tables);
    Ok(SyncRun {
        tables: outcome.tables,
        loads,
        sync: outcome.report,
    })
}

/// Full run: load, synchronize, aggregate, detect.
pub async fn run(config: &PipelineConfig) -> Result<PipelineRun, PipelineError> {
    let cleaned = run_sync(config).await?;
    Ok(analyze(cleaned, config.thresholds))
}

/// Aggregation and detection over already synchronized tables.
pub fn analyze(cleaned: SyncRun, thresholds: DetectionThresholds) -> PipelineRun {
    let tables = &cleaned.tables;
    let pincodes = pincode_summary(&tables.enrolment, &tables.biometric);
    let imbalance_rows = imbalance_summary(&tables.enrolment, &tables.demographic);
    info!(
        "{} pincode summary row(s), {} imbalance row(s)",
        pincodes.len(),
        imbalance_rows.len()
    );

    let misuse = detect_misuse(
        &pincodes,
        thresholds.high_percentile,
        thresholds.low_percentile,
    );
    info!(
        "misuse: {} flagged (enrolment >= {:?}, bio rate <= {:?})",
        misuse.flagged.len(),
        misuse.thresholds.primary,
        misuse.thresholds.secondary
    );
    let imbalance = detect_imbalance(
        &imbalance_rows,
        thresholds.high_percentile,
        thresholds.low_percentile,
    );
    info!(
        "imbalance: {} flagged (adult >= {:?}, child <= {:?})",
        imbalance.flagged.len(),
        imbalance.thresholds.primary,
        imbalance.thresholds.secondary
    );

    let spikes = SpikeDetector::new(thresholds.spike_z_score).detect(&daily_series(tables));
    let daily = daily_summary(tables, &spikes.z_scores);
    let states = state_summary(tables);
    let summary = AnomalySummary::build(&misuse, &imbalance, &spikes);

    let mut warnings = cleaned.warnings();
    warnings.extend(spikes.warnings.iter().cloned());

    PipelineRun {
        thresholds,
        pincode_summary: pincodes,
        imbalance_summary: imbalance_rows,
        daily,
        states,
        misuse,
        imbalance,
        spikes,
        summary,
        warnings,
        cleaned,
    }
}
