use std::fmt;

use serde::{Deserialize, Serialize};

/// A single cell handed to the core.
///
/// CSV loaders always produce `Text`. The numeric variants come from typed
/// inputs such as YAML scope lists, so identifiers may arrive as any of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CellValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// True for values that must never count as a resolved hit.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Float(f) => f.is_nan(),
            CellValue::Integer(_) | CellValue::Boolean(_) => false,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            CellValue::Boolean(b) => b.to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

/// Wraps one raw source cell.
///
/// Cells keep their source text untouched so resolved values export exactly
/// as read; identifier canonicalization happens in the normalizer. Empty
/// cells and the spreadsheet `NaN` marker are absent.
pub fn parse_cell(raw: &str) -> Option<CellValue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return None;
    }
    Some(CellValue::Text(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cell_keeps_source_text() {
        assert_eq!(parse_cell(""), None);
        assert_eq!(parse_cell("   "), None);
        assert_eq!(parse_cell("NaN"), None);
        for raw in ["24100", "24100.0", "1500.00", "1.10", "0012345", "12345678901234567890", "TRUE"] {
            assert_eq!(parse_cell(raw), Some(CellValue::Text(raw.to_string())));
            assert_eq!(parse_cell(raw).unwrap().as_display(), raw);
        }
        assert_eq!(
            parse_cell(" Vara Civel "),
            Some(CellValue::Text(" Vara Civel ".to_string()))
        );
    }

    #[test]
    fn blank_values() {
        assert!(CellValue::Text("  ".to_string()).is_blank());
        assert!(CellValue::Float(f64::NAN).is_blank());
        assert!(!CellValue::Integer(0).is_blank());
    }

    #[test]
    fn integral_floats_display_without_suffix() {
        assert_eq!(CellValue::Float(24100.0).as_display(), "24100");
        assert_eq!(CellValue::Float(1.25).as_display(), "1.25");
    }
}
