use chrono::NaiveDate;

const DATE_FORMATS: [&str; 4] = ["%d-%m-%Y", "%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalDate {
    pub text: String,
    pub parsed: bool,
}

/// ISO-8601 rendering of a date in any accepted layout. Unrecognised text is kept
/// trimmed so it still compares consistently across sources.
pub fn canonical_date(raw: &str) -> CanonicalDate {
    let trimmed = raw.trim();
    match parse_date(trimmed) {
        Some(date) => CanonicalDate {
            text: date.format("%Y-%m-%d").to_string(),
            parsed: true,
        },
        None => CanonicalDate {
            text: trimmed.to_string(),
            parsed: false,
        },
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Trims whitespace and strips float artifacts such as `110001.0`.
pub fn canonical_pincode(raw: &str) -> String {
    let mut current = raw.trim();
    while let Some(stripped) = strip_zero_fraction(current) {
        current = stripped.trim();
    }
    current.to_string()
}

fn strip_zero_fraction(value: &str) -> Option<&str> {
    let (head, fraction) = value.rsplit_once('.')?;
    if !fraction.is_empty() && fraction.bytes().all(|b| b == b'0') {
        Some(head)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{canonical_date, canonical_pincode};

    #[test]
    fn dates_render_as_iso() {
        assert_eq!(canonical_date(" 01-03-2025 ").text, "2025-03-01");
        assert_eq!(canonical_date("2025-03-01").text, "2025-03-01");
        assert_eq!(canonical_date("01/03/2025").text, "2025-03-01");
        assert!(canonical_date("2025-03-01").parsed);
    }

    #[test]
    fn unparseable_dates_keep_trimmed_text() {
        let date = canonical_date("  sometime  ");
        assert_eq!(date.text, "sometime");
        assert!(!date.parsed);
    }

    #[test]
    fn pincode_float_artifacts_are_stripped() {
        assert_eq!(canonical_pincode("110001.0"), "110001");
        assert_eq!(canonical_pincode(" 110001 "), "110001");
        assert_eq!(canonical_pincode("110001.00"), "110001");
        assert_eq!(canonical_pincode("110001.5"), "110001.5");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["110001.0.0", " 560034.0 ", "400001"] {
            let once = canonical_pincode(raw);
            assert_eq!(canonical_pincode(&once), once);
        }
        let once = canonical_date("31-12-2024").text;
        assert_eq!(canonical_date(&once).text, once);
    }
}
