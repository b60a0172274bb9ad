//! Per-cell resolution of one destination column for one identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    registry::SourceCatalog,
    rules::{MappingRule, SourceColumn},
    value::CellValue,
};

/// Why a cell stayed empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    /// The destination column has no mapping rule.
    NoRuleDefined,
    /// No candidate key of the identifier exists in the source.
    IdentifierNotFoundInSource,
    /// The identifier exists but every matching row has a blank value.
    ValueNullInSource,
    /// The source was registered but failed to load.
    SourceUnavailable,
    /// The source loaded but lacks the mapped column.
    ColumnNotInSource,
}

impl MissReason {
    pub const ALL: [MissReason; 5] = [
        MissReason::NoRuleDefined,
        MissReason::IdentifierNotFoundInSource,
        MissReason::ValueNullInSource,
        MissReason::SourceUnavailable,
        MissReason::ColumnNotInSource,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MissReason::NoRuleDefined => "no_rule_defined",
            MissReason::IdentifierNotFoundInSource => "identifier_not_found_in_source",
            MissReason::ValueNullInSource => "value_null_in_source",
            MissReason::SourceUnavailable => "source_unavailable",
            MissReason::ColumnNotInSource => "column_not_in_source",
        }
    }
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Constant,
    Source(String),
    Unresolved,
}

impl Origin {
    pub const CONSTANT_LABEL: &'static str = "Constant";

    /// Provenance label: the source name, `Constant`, or empty.
    pub fn label(&self) -> &str {
        match self {
            Origin::Constant => Self::CONSTANT_LABEL,
            Origin::Source(name) => name,
            Origin::Unresolved => "",
        }
    }
}

/// Provenance of one (identifier, destination column) cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionEntry {
    pub value: Option<CellValue>,
    pub origin: Origin,
    /// Candidate key that located the row, when a row was located.
    pub matched_key: Option<String>,
    pub miss: Option<MissReason>,
    /// Last source probed before giving up.
    pub missed_source: Option<String>,
}

impl ResolutionEntry {
    pub fn constant(value: CellValue) -> Self {
        Self {
            value: Some(value),
            origin: Origin::Constant,
            matched_key: None,
            miss: None,
            missed_source: None,
        }
    }

    pub fn hit(value: CellValue, source: &str, matched_key: &str) -> Self {
        Self {
            value: Some(value),
            origin: Origin::Source(source.to_string()),
            matched_key: Some(matched_key.to_string()),
            miss: None,
            missed_source: None,
        }
    }

    pub fn miss(reason: MissReason) -> Self {
        Self {
            value: None,
            origin: Origin::Unresolved,
            matched_key: None,
            miss: Some(reason),
            missed_source: None,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.miss.is_none()
    }
}

enum StepOutcome<'a> {
    Hit { value: &'a CellValue, key: &'a str },
    Miss { reason: MissReason, key: Option<&'a str> },
}

/// Resolves one cell. `candidate_keys` is the identifier's canonical key
/// followed by its alternates.
///
/// Source-backed steps are probed in order and probing stops at the first
/// non-blank value. When a key matches several rows, the first row in dataset
/// order holding a non-blank value wins. A chain that never hits reports the
/// reason recorded by its last step.
pub fn resolve(
    rule: Option<&MappingRule>,
    candidate_keys: &[String],
    catalog: &dyn SourceCatalog,
) -> ResolutionEntry {
    let Some(rule) = rule else {
        return ResolutionEntry::miss(MissReason::NoRuleDefined);
    };
    match rule {
        MappingRule::Constant { value } => ResolutionEntry::constant(value.clone()),
        MappingRule::Direct(_) | MappingRule::Fallback { .. } => {
            resolve_steps(rule.steps(), candidate_keys, catalog)
        }
    }
}

fn resolve_steps(
    steps: &[SourceColumn],
    candidate_keys: &[String],
    catalog: &dyn SourceCatalog,
) -> ResolutionEntry {
    let mut last = ResolutionEntry::miss(MissReason::NoRuleDefined);
    for step in steps {
        match probe(step, candidate_keys, catalog) {
            StepOutcome::Hit { value, key } => {
                return ResolutionEntry::hit(value.clone(), &step.source, key);
            }
            StepOutcome::Miss { reason, key } => {
                last = ResolutionEntry {
                    matched_key: key.map(str::to_string),
                    missed_source: Some(step.source.clone()),
                    ..ResolutionEntry::miss(reason)
                };
            }
        }
    }
    last
}

fn probe<'a>(
    step: &SourceColumn,
    candidate_keys: &[String],
    catalog: &'a dyn SourceCatalog,
) -> StepOutcome<'a> {
    let Some(view) = catalog.view(&step.source) else {
        return StepOutcome::Miss {
            reason: MissReason::SourceUnavailable,
            key: None,
        };
    };
    if !view.has_column(&step.column) {
        return StepOutcome::Miss {
            reason: MissReason::ColumnNotInSource,
            key: None,
        };
    }
    let Some(found) = view.find_rows(candidate_keys) else {
        return StepOutcome::Miss {
            reason: MissReason::IdentifierNotFoundInSource,
            key: None,
        };
    };
    found
        .rows
        .iter()
        .find_map(|&row| view.cell(row, &step.column).filter(|value| !value.is_blank()))
        .map(|value| StepOutcome::Hit {
            value,
            key: found.key,
        })
        .unwrap_or(StepOutcome::Miss {
            reason: MissReason::ValueNullInSource,
            key: Some(found.key),
        })
}
