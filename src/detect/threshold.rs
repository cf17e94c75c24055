use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detect::stats::percentile;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    High,
    Low,
}

impl Direction {
    pub fn crosses(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::High => value >= threshold,
            Self::Low => value <= threshold,
        }
    }
}

/// An entity scored by a two-metric threshold rule.
pub trait ThresholdSubject {
    fn subject_id(&self) -> &str;
    fn primary_metric(&self) -> f64;
    fn secondary_metric(&self) -> f64;
    /// Flagged subjects are ordered by this value, largest first; `None` sorts last.
    fn rank_metric(&self) -> Option<f64>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdRule {
    pub name: String,
    pub primary_metric: String,
    pub secondary_metric: String,
    pub primary_percentile: f64,
    pub secondary_percentile: f64,
    pub primary_direction: Direction,
    pub secondary_direction: Direction,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Thresholds {
    pub primary: Option<f64>,
    pub secondary: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnomalyRecord<T> {
    #[serde(flatten)]
    pub subject: T,
    pub primary_value: f64,
    pub secondary_value: f64,
    pub primary_threshold: f64,
    pub secondary_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdOutcome<T> {
    pub rule: ThresholdRule,
    pub thresholds: Thresholds,
    pub evaluated: usize,
    pub flagged: Vec<AnomalyRecord<T>>,
}

impl ThresholdRule {
    pub fn high_low(
        name: impl Into<String>,
        primary_metric: impl Into<String>,
        secondary_metric: impl Into<String>,
        primary_percentile: f64,
        secondary_percentile: f64,
    ) -> Self {
        Self {
            name: name.into(),
            primary_metric: primary_metric.into(),
            secondary_metric: secondary_metric.into(),
            primary_percentile,
            secondary_percentile,
            primary_direction: Direction::High,
            secondary_direction: Direction::Low,
        }
    }

    /// Primary threshold over every subject; secondary threshold over subjects whose
    /// secondary metric is positive. Zero secondaries are never flagged.
    pub fn thresholds<T: ThresholdSubject>(&self, subjects: &[T]) -> Thresholds {
        let primaries = subjects
            .iter()
            .map(ThresholdSubject::primary_metric)
            .collect::<Vec<_>>();
        let secondaries = subjects
            .iter()
            .map(ThresholdSubject::secondary_metric)
            .filter(|v| *v > 0.0)
            .collect::<Vec<_>>();
        Thresholds {
            primary: percentile(&primaries, self.primary_percentile),
            secondary: percentile(&secondaries, self.secondary_percentile),
        }
    }

    pub fn detect<T: ThresholdSubject + Clone>(&self, subjects: &[T]) -> ThresholdOutcome<T> {
        let thresholds = self.thresholds(subjects);
        let mut flagged = match (thresholds.primary, thresholds.secondary) {
            (Some(primary_threshold), Some(secondary_threshold)) => subjects
                .iter()
                .filter_map(|subject| {
                    let primary_value = subject.primary_metric();
                    let secondary_value = subject.secondary_metric();
                    let hit = self.primary_direction.crosses(primary_value, primary_threshold)
                        && self
                            .secondary_direction
                            .crosses(secondary_value, secondary_threshold)
                        && secondary_value > 0.0;
                    if hit {
                        debug!(
                            "{}: flagged {} ({primary_value} / {secondary_value})",
                            self.name,
                            subject.subject_id()
                        );
                    }
                    hit.then(|| AnomalyRecord {
                        subject: subject.clone(),
                        primary_value,
                        secondary_value,
                        primary_threshold,
                        secondary_threshold,
                    })
                })
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        };
        flagged.sort_by(|a, b| match (a.subject.rank_metric(), b.subject.rank_metric()) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        ThresholdOutcome {
            rule: self.clone(),
            thresholds,
            evaluated: subjects.len(),
            flagged,
        }
    }
}
