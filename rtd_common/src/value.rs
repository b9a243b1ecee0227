//! Raw cell values and their normalization into canonical quote values.
//!
//! RTD providers often deliver composite strings such as `"1;OK;123,45"`: status
//! or quality codes come first and the actual value is the last `;`-separated
//! segment, with a locale-dependent decimal separator. [`normalize`] reduces any
//! raw value to a number, a residual string or absence, and never fails.
use serde::Serialize;

/// Separator between the segments of a composite feed value.
pub const SEGMENT_DELIMITER: char = ';';

/// Scalar returned by the host for a single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// The cell holds nothing.
    Empty,
    /// Numeric cell content.
    Number(f64),
    /// Boolean cell content.
    Bool(bool),
    /// Text, possibly a composite feed value.
    Text(String),
}

impl RawValue {
    /// Whether the cell carries something other than nothing or an empty string.
    pub fn is_present(&self) -> bool {
        match self {
            RawValue::Empty => false,
            RawValue::Text(text) => !text.is_empty(),
            RawValue::Number(_) | RawValue::Bool(_) => true,
        }
    }
}

impl From<&str> for RawValue {
    fn from(text: &str) -> Self {
        RawValue::Text(text.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(number: f64) -> Self {
        RawValue::Number(number)
    }
}

/// Normalized cell value as exposed in the snapshot result.
///
/// Serializes untagged: a JSON number, a JSON string, or `null` for absence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CanonicalValue {
    /// Not yet populated, or genuinely empty.
    Absent,
    /// Finite numeric value.
    Number(f64),
    /// Value that is not a number, kept verbatim.
    Text(String),
}

impl CanonicalValue {
    /// Numeric value, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CanonicalValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Residual text, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CanonicalValue::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Whether the value is absent.
    pub fn is_absent(&self) -> bool {
        matches!(self, CanonicalValue::Absent)
    }
}

/// Converts a raw cell value into its canonical form.
pub fn normalize(raw: &RawValue) -> CanonicalValue {
    match raw {
        RawValue::Empty => CanonicalValue::Absent,
        RawValue::Number(n) if n.is_finite() => CanonicalValue::Number(*n),
        RawValue::Number(n) => CanonicalValue::Text(n.to_string()),
        RawValue::Bool(b) => CanonicalValue::Text(if *b { "True" } else { "False" }.to_string()),
        RawValue::Text(text) => normalize_text(text),
    }
}

/// Text branch of [`normalize`]; also usable on plain strings.
pub fn normalize_text(text: &str) -> CanonicalValue {
    let last = text.rsplit(SEGMENT_DELIMITER).next().unwrap_or(text);
    if last.is_empty() {
        return CanonicalValue::Absent;
    }
    match last.trim().replace(',', ".").parse::<f64>() {
        Ok(number) if number.is_finite() => CanonicalValue::Number(number),
        _ => CanonicalValue::Text(last.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_keeps_last_segment() {
        assert_eq!(normalize(&"1,23;OK".into()), CanonicalValue::Text("OK".into()));
        assert_eq!(normalize(&"OK;1,23".into()), CanonicalValue::Number(1.23));
    }

    #[test]
    fn test_known_cases() {
        assert_eq!(normalize_text("1,23"), CanonicalValue::Number(1.23));
        assert_eq!(normalize(&"N/A".into()), CanonicalValue::Text("N/A".into()));
        assert_eq!(normalize(&"".into()), CanonicalValue::Absent);
        assert_eq!(normalize(&RawValue::Empty), CanonicalValue::Absent);
    }

    #[test]
    fn test_numbers_pass_through() {
        assert_eq!(normalize(&RawValue::Number(101.5)), CanonicalValue::Number(101.5));
        assert_eq!(normalize(&RawValue::Number(0.0)), CanonicalValue::Number(0.0));
    }

    #[test]
    fn test_non_finite_degrades_to_text() {
        assert_eq!(normalize(&"NaN".into()), CanonicalValue::Text("NaN".into()));
        assert_eq!(normalize(&"1;inf".into()), CanonicalValue::Text("inf".into()));
        assert!(normalize(&RawValue::Number(f64::NAN)).as_text().is_some());
    }

    #[test]
    fn test_whitespace_around_number() {
        assert_eq!(normalize(&"OK; 42,5 ".into()), CanonicalValue::Number(42.5));
    }

    #[test]
    fn test_trailing_delimiter_is_absent() {
        assert_eq!(normalize(&"OK;".into()), CanonicalValue::Absent);
    }

    #[test]
    fn test_bool_becomes_text() {
        assert_eq!(normalize(&RawValue::Bool(true)), CanonicalValue::Text("True".into()));
        assert_eq!(normalize(&RawValue::Bool(false)), CanonicalValue::Text("False".into()));
    }

    #[test]
    fn test_total_over_awkward_inputs() {
        let inputs = [
            ";", ";;", "a;b;c", "1.2.3", ",", "-", "+1", "1e3", "1,2,3", " ", "€;9,99", "\u{0};1",
        ];
        for input in inputs {
            match normalize(&input.into()) {
                CanonicalValue::Number(n) => assert!(n.is_finite(), "{input:?}"),
                CanonicalValue::Text(t) => assert!(!t.is_empty(), "{input:?}"),
                CanonicalValue::Absent => assert!(input.ends_with(';'), "{input:?}"),
            }
        }
    }

    #[test]
    fn test_serializes_untagged() {
        let values = vec![
            CanonicalValue::Number(1.5),
            CanonicalValue::Text("NSDQ".into()),
            CanonicalValue::Absent,
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[1.5,"NSDQ",null]"#);
    }

    #[test]
    fn test_presence() {
        assert!(!RawValue::Empty.is_present());
        assert!(!RawValue::from("").is_present());
        assert!(RawValue::from("0").is_present());
        assert!(RawValue::Number(0.0).is_present());
    }
}
