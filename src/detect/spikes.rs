use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::DateSeries;
use crate::detect::stats::z_scores;
use crate::errors::PipelineWarning;
use crate::schema::{SourceKind, SourceSet};

pub const DEFAULT_SPIKE_Z_SCORE: f64 = 2.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SpikeDetector {
    pub threshold: f64,
}

impl Default for SpikeDetector {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SPIKE_Z_SCORE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceSpikes {
    pub source: SourceKind,
    pub dates_evaluated: usize,
    pub z_defined: bool,
    pub spike_dates: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MassRegistrationEvent {
    pub date: String,
    pub enrolment_count: u64,
    pub demographic_count: u64,
    pub biometric_count: u64,
    pub total_activity: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpikeOutcome {
    pub threshold: f64,
    pub per_source: Vec<SourceSpikes>,
    pub z_scores: SourceSet<DateSeries<f64>>,
    pub events: Vec<MassRegistrationEvent>,
    pub warnings: Vec<PipelineWarning>,
}

impl SpikeDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Z-scores of one source's daily series over its own dates.
    pub fn score(&self, series: &DateSeries<u64>) -> Option<DateSeries<f64>> {
        let values = series.values().map(|v| *v as f64).collect::<Vec<_>>();
        let scores = z_scores(&values)?;
        Some(series.keys().cloned().zip(scores).collect())
    }

    /// Dates whose |z| exceeds the threshold in every source at once, busiest first.
    pub fn detect(&self, series: &SourceSet<DateSeries<u64>>) -> SpikeOutcome {
        let mut warnings = Vec::new();
        let mut z_by_source = SourceSet::<DateSeries<f64>>::default();
        let mut per_source = Vec::with_capacity(3);

        for (kind, daily) in series.iter() {
            let scores = self.score(daily);
            if scores.is_none() && !daily.is_empty() {
                let warning = PipelineWarning::UndefinedZScore {
                    source: kind,
                    dates: daily.len(),
                };
                warn!("{warning}");
                warnings.push(warning);
            }
            let scores = scores.unwrap_or_default();
            let spike_dates = scores
                .iter()
                .filter(|(_, z)| z.abs() > self.threshold)
                .map(|(date, _)| date.clone())
                .collect::<BTreeSet<_>>();
            info!(
                "{kind}: {} spike date(s) at |z| > {}",
                spike_dates.len(),
                self.threshold
            );
            per_source.push(SourceSpikes {
                source: kind,
                dates_evaluated: daily.len(),
                z_defined: !scores.is_empty(),
                spike_dates,
            });
            match kind {
                SourceKind::Enrolment => z_by_source.enrolment = scores,
                SourceKind::Demographic => z_by_source.demographic = scores,
                SourceKind::Biometric => z_by_source.biometric = scores,
            }
        }

        let mut common = per_source
            .first()
            .map(|s| s.spike_dates.clone())
            .unwrap_or_default();
        for source in per_source.iter().skip(1) {
            common.retain(|date| source.spike_dates.contains(date));
        }

        let count = |kind: SourceKind, date: &str| series.get(kind).get(date).copied().unwrap_or(0);
        let mut events = common
            .into_iter()
            .map(|date| {
                let enrolment_count = count(SourceKind::Enrolment, &date);
                let demographic_count = count(SourceKind::Demographic, &date);
                let biometric_count = count(SourceKind::Biometric, &date);
                MassRegistrationEvent {
                    total_activity: enrolment_count
                        .saturating_add(demographic_count)
                        .saturating_add(biometric_count),
                    date,
                    enrolment_count,
                    demographic_count,
                    biometric_count,
                }
            })
            .collect::<Vec<_>>();
        events.sort_by(|a, b| b.total_activity.cmp(&a.total_activity));
        info!("{} mass registration event(s)", events.len());

        SpikeOutcome {
            threshold: self.threshold,
            per_source,
            z_scores: z_by_source,
            events,
            warnings,
        }
    }
}
