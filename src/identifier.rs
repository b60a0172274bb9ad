//! Identifier canonicalization and alternate-key generation.
//!
//! Case codes (GCPJ) reach us as integers, floats with a trailing `.0`,
//! zero-padded strings, or strings whose two-character organizational prefix
//! differs between systems. [`normalize`] collapses the purely representational
//! differences; [`KeyPolicy`] describes the business-level re-encodings as an
//! ordered list of [`TransformationRule`]s supplied by the operator.

use std::{fmt, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::value::CellValue;

/// Comparable string form of an identifier: trimmed, no decimal suffix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn decimal_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)\.0+$").expect("valid decimal suffix pattern"))
}

/// Canonicalizes a raw identifier cell. Absent and unparsable values yield `None`.
pub fn normalize(raw: &CellValue) -> Option<CanonicalKey> {
    match raw {
        CellValue::Integer(i) => Some(CanonicalKey(i.unsigned_abs().to_string())),
        CellValue::Float(f) => {
            if !f.is_finite() {
                return None;
            }
            if f.fract() == 0.0 && f.abs() < 1e18 {
                Some(CanonicalKey((f.abs() as u64).to_string()))
            } else {
                normalize_text(&f.to_string())
            }
        }
        CellValue::Text(s) => normalize_text(s),
        CellValue::Boolean(_) => None,
    }
}

/// Canonicalizes identifier text. Alphanumeric identifiers pass through trimmed.
pub fn normalize_text(raw: &str) -> Option<CanonicalKey> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return None;
    }
    match decimal_suffix().captures(trimmed) {
        Some(captures) => Some(CanonicalKey(captures[1].to_string())),
        None => Some(CanonicalKey(trimmed.to_string())),
    }
}

/// Convenience for optional cells.
pub fn normalize_cell(raw: Option<&CellValue>) -> Option<CanonicalKey> {
    raw.and_then(normalize)
}

/// One reversible re-encoding an identifier may have undergone in another system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformationRule {
    /// Drop the first `count` characters.
    StripPrefix { count: usize },
    /// Swap a leading organizational prefix.
    ReplacePrefix { from: String, to: String },
    /// Remove leading zeros, keeping at least one digit.
    StripLeadingZeros,
    /// Left-pad with zeros up to `width` characters.
    PadZeros { width: usize },
}

impl TransformationRule {
    /// Rewrites `key` when the rule's predicate holds; `None` means the rule does not apply.
    pub fn apply(&self, key: &str) -> Option<String> {
        match self {
            TransformationRule::StripPrefix { count } => {
                if *count == 0 || key.chars().count() <= *count {
                    return None;
                }
                Some(key.chars().skip(*count).collect())
            }
            TransformationRule::ReplacePrefix { from, to } => {
                if from.is_empty() || key.len() <= from.len() {
                    return None;
                }
                key.strip_prefix(from.as_str())
                    .map(|rest| format!("{to}{rest}"))
            }
            TransformationRule::StripLeadingZeros => {
                if !key.starts_with('0') {
                    return None;
                }
                let stripped = key.trim_start_matches('0');
                if stripped.is_empty() {
                    Some("0".to_string())
                } else {
                    Some(stripped.to_string())
                }
            }
            TransformationRule::PadZeros { width } => {
                let len = key.chars().count();
                if len >= *width || !key.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                Some(format!("{key:0>width$}", width = *width))
            }
        }
    }

    pub fn label(&self) -> String {
        match self {
            TransformationRule::StripPrefix { count } => format!("strip first {count} char(s)"),
            TransformationRule::ReplacePrefix { from, to } => format!("prefix {from} -> {to}"),
            TransformationRule::StripLeadingZeros => "strip leading zeros".to_string(),
            TransformationRule::PadZeros { width } => format!("zero-pad to {width}"),
        }
    }
}

/// Ordered set of transformation rules applied on the query side of a lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPolicy {
    rules: Vec<TransformationRule>,
}

impl KeyPolicy {
    pub fn new(rules: Vec<TransformationRule>) -> Self {
        Self { rules }
    }

    /// Builds the symmetric prefix table used by operators, e.g. `[("24", "16")]`
    /// yields both `24 -> 16` and `16 -> 24`.
    pub fn with_prefix_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut rules = Vec::with_capacity(pairs.len() * 2);
        for (left, right) in pairs {
            rules.push(TransformationRule::ReplacePrefix {
                from: left.to_string(),
                to: right.to_string(),
            });
            rules.push(TransformationRule::ReplacePrefix {
                from: right.to_string(),
                to: left.to_string(),
            });
        }
        Self { rules }
    }

    pub fn rules(&self) -> &[TransformationRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Candidate keys for `canonical`: the canonical key first, then every
    /// applicable rule's rewrite in rule order, without duplicates.
    pub fn alternate_keys(&self, canonical: &CanonicalKey) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.rules.len() + 1);
        keys.push(canonical.as_str().to_string());
        for rule in &self.rules {
            if let Some(candidate) = rule.apply(canonical.as_str()) {
                if !keys.contains(&candidate) {
                    keys.push(candidate);
                }
            }
        }
        keys
    }
}
