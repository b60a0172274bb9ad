//! Configuration-time failures.
//!
//! Data-quality problems (absent identifiers, missing sources, duplicates,
//! empty cells) are never errors: they surface as miss reasons and counts in
//! the completeness summary. Only a misconfigured run is rejected, before any
//! resolution work begins.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// The destination schema lists the same column twice.
    #[error("destination column '{column}' is declared more than once")]
    DuplicateDestinationColumn { column: String },

    /// A destination column name is blank.
    #[error("destination column at position {position} has an empty name")]
    EmptyDestinationColumn { position: usize },

    /// A mapping rule targets a column that is not part of the destination schema.
    #[error("mapping rule targets unknown destination column '{column}'")]
    RuleForUnknownColumn { column: String },

    /// More than one rule was supplied for the same destination column.
    #[error("destination column '{column}' has more than one mapping rule")]
    DuplicateRule { column: String },

    /// A fallback chain with no steps.
    #[error("fallback rule for column '{column}' has no steps")]
    EmptyFallback { column: String },

    /// A rule references a source name that was never registered.
    #[error("rule for column '{column}' references unregistered source '{source_name}'")]
    UnknownSource { column: String, source_name: String },

    /// Two sources registered under the same name.
    #[error("source '{name}' is registered more than once")]
    DuplicateSource { name: String },

    /// The identifier column chosen for a source is not among its headers.
    #[error("identifier column '{column}' not found in source '{source_name}'")]
    MissingIdentifierColumn { source_name: String, column: String },

    /// A source declares the same header twice.
    #[error("source '{source_name}' declares column '{column}' more than once")]
    DuplicateSourceColumn { source_name: String, column: String },

    /// A row whose width disagrees with the header.
    #[error("row {row} of source '{source_name}' has {found} cell(s), expected {expected}")]
    RaggedRow {
        source_name: String,
        row: usize,
        found: usize,
        expected: usize,
    },
}
