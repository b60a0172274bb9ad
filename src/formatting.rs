use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::CellValue;

/// Presentation applied to a destination column on export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    /// Trimmed, upper-cased text.
    Upper,
    /// CPF (11 digits) or CNPJ (14 digits) with punctuation.
    Document,
}

impl ValueFormat {
    pub fn apply(&self, value: &CellValue) -> CellValue {
        match self {
            ValueFormat::Upper => match value {
                CellValue::Text(text) => CellValue::Text(text.trim().to_uppercase()),
                other => other.clone(),
            },
            ValueFormat::Document => CellValue::Text(format_document(&value.as_display())),
        }
    }
}

/// Punctuates CPF and CNPJ numbers; other lengths come back stripped but unchanged.
pub fn format_document(raw: &str) -> String {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | '/'))
        .collect::<String>()
        .trim()
        .to_string();
    if !digits.is_ascii() {
        return digits;
    }
    match digits.len() {
        11 => format!(
            "{}.{}.{}-{}",
            &digits[..3],
            &digits[3..6],
            &digits[6..9],
            &digits[9..]
        ),
        14 => format!(
            "{}.{}.{}/{}-{}",
            &digits[..2],
            &digits[2..5],
            &digits[5..8],
            &digits[8..12],
            &digits[12..]
        ),
        _ => digits,
    }
}

/// Per-column formats, keyed by destination column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnFormats(BTreeMap<String, ValueFormat>);

impl ColumnFormats {
    pub fn new(formats: BTreeMap<String, ValueFormat>) -> Self {
        Self(formats)
    }

    pub fn get(&self, column: &str) -> Option<ValueFormat> {
        self.0.get(column).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Formats a cell of `column` for export; blanks stay absent.
    pub fn render(&self, column: &str, value: Option<&CellValue>) -> Option<CellValue> {
        let value = value?;
        match self.get(column) {
            Some(format) => Some(format.apply(value)),
            None => Some(value.clone()),
        }
    }
}
