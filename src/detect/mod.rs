pub mod spikes;
pub mod stats;
pub mod threshold;

use crate::aggregate::{ImbalanceSummary, PincodeSummary};
use crate::detect::threshold::{ThresholdOutcome, ThresholdRule, ThresholdSubject};

pub use spikes::{MassRegistrationEvent, SpikeDetector, SpikeOutcome};
pub use threshold::{AnomalyRecord, Direction, Thresholds};

pub const DEFAULT_HIGH_PERCENTILE: f64 = 0.75;
pub const DEFAULT_LOW_PERCENTILE: f64 = 0.25;

impl ThresholdSubject for PincodeSummary {
    fn subject_id(&self) -> &str {
        &self.pincode
    }

    fn primary_metric(&self) -> f64 {
        self.enrolment_count as f64
    }

    fn secondary_metric(&self) -> f64 {
        self.biometric_rate
    }

    fn rank_metric(&self) -> Option<f64> {
        Some(self.enrolment_count as f64)
    }
}

impl ThresholdSubject for ImbalanceSummary {
    fn subject_id(&self) -> &str {
        &self.pincode
    }

    fn primary_metric(&self) -> f64 {
        self.adult_demographic_count as f64
    }

    fn secondary_metric(&self) -> f64 {
        self.child_enrolment as f64
    }

    fn rank_metric(&self) -> Option<f64> {
        self.adult_child_ratio
    }
}

/// Pattern 1: high enrolment with a low biometric update rate.
pub fn misuse_rule(high_percentile: f64, low_percentile: f64) -> ThresholdRule {
    ThresholdRule::high_low(
        "misuse",
        "enrolment_count",
        "biometric_rate",
        high_percentile,
        low_percentile,
    )
}

/// Pattern 2: high adult demographic updates with low child enrolment.
pub fn imbalance_rule(high_percentile: f64, low_percentile: f64) -> ThresholdRule {
    ThresholdRule::high_low(
        "imbalance",
        "adult_demographic_count",
        "child_enrolment",
        high_percentile,
        low_percentile,
    )
}

pub fn detect_misuse(
    summary: &[PincodeSummary],
    high_percentile: f64,
    low_percentile: f64,
) -> ThresholdOutcome<PincodeSummary> {
    misuse_rule(high_percentile, low_percentile).detect(summary)
}

pub fn detect_imbalance(
    summary: &[ImbalanceSummary],
    high_percentile: f64,
    low_percentile: f64,
) -> ThresholdOutcome<ImbalanceSummary> {
    imbalance_rule(high_percentile, low_percentile).detect(summary)
}
