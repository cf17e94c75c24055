use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Enrolment,
    Demographic,
    Biometric,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Enrolment,
        SourceKind::Demographic,
        SourceKind::Biometric,
    ];

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Enrolment => "enrolment",
            Self::Demographic => "demographic",
            Self::Biometric => "biometric",
        }
    }

    pub fn schema(&self) -> &'static SourceSchema {
        match self {
            Self::Enrolment => &ENROLMENT_SCHEMA,
            Self::Demographic => &DEMOGRAPHIC_SCHEMA,
            Self::Biometric => &BIOMETRIC_SCHEMA,
        }
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Enrolment => "Enrolment",
            Self::Demographic => "Demographic",
            Self::Biometric => "Biometric",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown source: {0}")]
pub struct SourceParseError(pub String);

impl FromStr for SourceKind {
    type Err = SourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "enrolment" | "enrollment" | "enrol" => Ok(Self::Enrolment),
            "demographic" | "demo" => Ok(Self::Demographic),
            "biometric" | "bio" => Ok(Self::Biometric),
            _ => Err(SourceParseError(s.to_string())),
        }
    }
}

pub const DATE_COLUMN: &str = "date";
pub const PINCODE_COLUMN: &str = "pincode";
pub const STATE_COLUMN: &str = "state";
pub const DISTRICT_COLUMN: &str = "district";

/// Named sums over a source's counter columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterGroup {
    Total,
    Child,
    Adult,
}

/// Column layout of one source and the counter formulas derived from it.
///
/// Group members are indices into `counters`, so a record's counter vector
/// lines up with the schema it was decoded with.
#[derive(Debug)]
pub struct SourceSchema {
    pub counters: &'static [&'static str],
    pub total: &'static [usize],
    pub child: &'static [usize],
    pub adult: &'static [usize],
}

impl SourceSchema {
    pub fn group(&self, group: CounterGroup) -> &'static [usize] {
        match group {
            CounterGroup::Total => self.total,
            CounterGroup::Child => self.child,
            CounterGroup::Adult => self.adult,
        }
    }

    pub fn sum(&self, counters: &[u64], group: CounterGroup) -> u64 {
        self.group(group)
            .iter()
            .filter_map(|idx| counters.get(*idx))
            .fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    pub fn required_columns(&self) -> impl Iterator<Item = &'static str> {
        [DATE_COLUMN, PINCODE_COLUMN]
            .into_iter()
            .chain(self.counters.iter().copied())
    }
}

pub static ENROLMENT_SCHEMA: SourceSchema = SourceSchema {
    counters: &["age_0_5", "age_5_17", "age_18_greater"],
    total: &[0, 1, 2],
    child: &[0, 1],
    adult: &[2],
};

pub static DEMOGRAPHIC_SCHEMA: SourceSchema = SourceSchema {
    counters: &["demo_age_5_17", "demo_age_17_"],
    total: &[0, 1],
    child: &[0],
    adult: &[1],
};

pub static BIOMETRIC_SCHEMA: SourceSchema = SourceSchema {
    counters: &["bio_age_5_17", "bio_age_17_"],
    total: &[0, 1],
    child: &[0],
    adult: &[1],
};

/// One value per source, in enrolment, demographic, biometric order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceSet<T> {
    pub enrolment: T,
    pub demographic: T,
    pub biometric: T,
}

impl<T> SourceSet<T> {
    pub fn new(enrolment: T, demographic: T, biometric: T) -> Self {
        Self {
            enrolment,
            demographic,
            biometric,
        }
    }

    pub fn get(&self, kind: SourceKind) -> &T {
        match kind {
            SourceKind::Enrolment => &self.enrolment,
            SourceKind::Demographic => &self.demographic,
            SourceKind::Biometric => &self.biometric,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(SourceKind, T) -> U) -> SourceSet<U> {
        SourceSet {
            enrolment: f(SourceKind::Enrolment, self.enrolment),
            demographic: f(SourceKind::Demographic, self.demographic),
            biometric: f(SourceKind::Biometric, self.biometric),
        }
    }

    pub fn as_ref(&self) -> SourceSet<&T> {
        SourceSet {
            enrolment: &self.enrolment,
            demographic: &self.demographic,
            biometric: &self.biometric,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SourceKind, &T)> {
        SourceKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{CounterGroup, SourceKind, SourceSet};

    #[test]
    fn parses_source_aliases() {
        assert_eq!(
            SourceKind::from_str("Enrollment").expect("alias"),
            SourceKind::Enrolment
        );
        assert_eq!(SourceKind::from_str(" bio ").expect("alias"), SourceKind::Biometric);
        assert!(SourceKind::from_str("census").is_err());
    }

    #[test]
    fn enrolment_groups_split_child_and_adult() {
        let schema = SourceKind::Enrolment.schema();
        let counters = [3, 4, 10];
        assert_eq!(schema.sum(&counters, CounterGroup::Total), 17);
        assert_eq!(schema.sum(&counters, CounterGroup::Child), 7);
        assert_eq!(schema.sum(&counters, CounterGroup::Adult), 10);
    }

    #[test]
    fn demographic_adult_is_single_bracket() {
        let schema = SourceKind::Demographic.schema();
        assert_eq!(schema.sum(&[5, 40], CounterGroup::Adult), 40);
        assert_eq!(schema.sum(&[5, 40], CounterGroup::Total), 45);
    }

    #[test]
    fn group_sum_saturates_instead_of_overflowing() {
        let schema = SourceKind::Biometric.schema();
        assert_eq!(schema.sum(&[u64::MAX, 1], CounterGroup::Total), u64::MAX);
    }

    #[test]
    fn source_set_iterates_in_fixed_order() {
        let set = SourceSet::new(1, 2, 3).map(|_, v| v * 10);
        let kinds = set.iter().map(|(k, v)| (k, *v)).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                (SourceKind::Enrolment, 10),
                (SourceKind::Demographic, 20),
                (SourceKind::Biometric, 30)
            ]
        );
    }
}
