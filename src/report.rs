use serde::{Deserialize, Serialize};

use crate::aggregate::{ImbalanceSummary, PincodeSummary};
use crate::detect::spikes::SpikeOutcome;
use crate::detect::stats::mean;
use crate::detect::threshold::ThresholdOutcome;
use crate::schema::SourceKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MisuseSummary {
    pub flagged: usize,
    pub evaluated: usize,
    pub high_threshold: Option<f64>,
    pub low_threshold: Option<f64>,
    pub total_enrolment: u64,
    pub mean_biometric_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceReport {
    pub flagged: usize,
    pub evaluated: usize,
    pub high_threshold: Option<f64>,
    pub low_threshold: Option<f64>,
    pub mean_adult_child_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeReport {
    pub threshold: f64,
    pub events: usize,
    pub first_event: Option<String>,
    pub last_event: Option<String>,
    pub peak_total_activity: Option<u64>,
    pub spikes_per_source: Vec<(SourceKind, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub misuse: MisuseSummary,
    pub imbalance: ImbalanceReport,
    pub spikes: SpikeReport,
}

impl AnomalySummary {
    pub fn build(
        misuse: &ThresholdOutcome<PincodeSummary>,
        imbalance: &ThresholdOutcome<ImbalanceSummary>,
        spikes: &SpikeOutcome,
    ) -> Self {
        let rates = misuse
            .flagged
            .iter()
            .map(|r| r.subject.biometric_rate)
            .collect::<Vec<_>>();
        let ratios = imbalance
            .flagged
            .iter()
            .filter_map(|r| r.subject.adult_child_ratio)
            .collect::<Vec<_>>();
        let event_dates = spikes.events.iter().map(|e| e.date.as_str());

        Self {
            misuse: MisuseSummary {
                flagged: misuse.flagged.len(),
                evaluated: misuse.evaluated,
                high_threshold: misuse.thresholds.primary,
                low_threshold: misuse.thresholds.secondary,
                total_enrolment: misuse
                    .flagged
                    .iter()
                    .fold(0u64, |acc, r| acc.saturating_add(r.subject.enrolment_count)),
                mean_biometric_rate: mean(&rates),
            },
            imbalance: ImbalanceReport {
                flagged: imbalance.flagged.len(),
                evaluated: imbalance.evaluated,
                high_threshold: imbalance.thresholds.primary,
                low_threshold: imbalance.thresholds.secondary,
                mean_adult_child_ratio: mean(&ratios),
            },
            spikes: SpikeReport {
                threshold: spikes.threshold,
                events: spikes.events.len(),
                first_event: event_dates.clone().min().map(str::to_string),
                last_event: event_dates.max().map(str::to_string),
                peak_total_activity: spikes.events.iter().map(|e| e.total_activity).max(),
                spikes_per_source: spikes
                    .per_source
                    .iter()
                    .map(|s| (s.source, s.spike_dates.len()))
                    .collect(),
            },
        }
    }
}

impl std::fmt::Display for AnomalySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let opt = |v: Option<f64>| v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into());
        writeln!(
            f,
            "Pattern 1 (misuse): {} of {} pincodes flagged, enrolment {}, mean bio rate {}%",
            self.misuse.flagged,
            self.misuse.evaluated,
            self.misuse.total_enrolment,
            opt(self.misuse.mean_biometric_rate)
        )?;
        writeln!(
            f,
            "Pattern 2 (imbalance): {} of {} pincodes flagged, mean adult/child ratio {}",
            self.imbalance.flagged,
            self.imbalance.evaluated,
            opt(self.imbalance.mean_adult_child_ratio)
        )?;
        write!(
            f,
            "Pattern 3 (mass registration): {} event(s) at |z| > {}",
            self.spikes.events, self.spikes.threshold
        )?;
        if let (Some(first), Some(last)) = (&self.spikes.first_event, &self.spikes.last_event) {
            write!(f, ", {first} .. {last}")?;
        }
        if let Some(peak) = self.spikes.peak_total_activity {
            write!(f, ", peak activity {peak}")?;
        }
        for (source, count) in &self.spikes.spikes_per_source {
            write!(f, "\n  {source}: {count} spike date(s)")?;
        }
        Ok(())
    }
}
