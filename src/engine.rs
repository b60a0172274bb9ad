//! Orchestrates the column resolver across a destination schema and a scope
//! of identifiers.

use std::collections::{BTreeSet, HashSet};

use log::{debug, info, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    error::PlanError,
    identifier::{self, CanonicalKey, KeyPolicy},
    registry::SourceCatalog,
    resolver::{self, ResolutionEntry},
    rules::{MappingRule, RuleSet},
    value::CellValue,
};

/// Ordered destination column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationSchema {
    columns: Vec<String>,
}

impl DestinationSchema {
    pub fn new<I, S>(columns: I) -> Result<Self, PlanError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(columns.len());
        for (position, column) in columns.iter().enumerate() {
            if column.trim().is_empty() {
                return Err(PlanError::EmptyDestinationColumn { position });
            }
            if !seen.insert(column.as_str()) {
                return Err(PlanError::DuplicateDestinationColumn {
                    column: column.clone(),
                });
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// How a destination column is fed, as seen by the completeness analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnStatus {
    Mapped,
    Constant,
    Unmapped,
}

impl ColumnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnStatus::Mapped => "mapped",
            ColumnStatus::Constant => "constant",
            ColumnStatus::Unmapped => "unmapped",
        }
    }
}

/// A validated schema and rule set, checked against the registered sources.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    schema: DestinationSchema,
    rules: RuleSet,
}

impl MigrationPlan {
    pub fn new(
        schema: DestinationSchema,
        rules: RuleSet,
        catalog: &dyn SourceCatalog,
    ) -> Result<Self, PlanError> {
        for (column, rule) in rules.iter() {
            if !schema.contains(column) {
                return Err(PlanError::RuleForUnknownColumn {
                    column: column.to_string(),
                });
            }
            if let Some(source) = rule.sources().into_iter().find(|s| !catalog.is_registered(s)) {
                return Err(PlanError::UnknownSource {
                    column: column.to_string(),
                    source_name: source.to_string(),
                });
            }
        }
        Ok(Self { schema, rules })
    }

    pub fn schema(&self) -> &DestinationSchema {
        &self.schema
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn rule_for(&self, column: &str) -> Option<&MappingRule> {
        self.rules.get(column)
    }

    pub fn column_status(&self, column: &str) -> ColumnStatus {
        match self.rules.get(column) {
            None => ColumnStatus::Unmapped,
            Some(rule) if rule.is_constant() => ColumnStatus::Constant,
            Some(_) => ColumnStatus::Mapped,
        }
    }

    /// Source names used by any rule, sorted.
    pub fn referenced_sources(&self) -> BTreeSet<&str> {
        self.rules
            .iter()
            .flat_map(|(_, rule)| rule.sources())
            .collect()
    }
}

/// Which identifiers a run resolves.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// Caller-supplied raw identifiers.
    Explicit(Vec<CellValue>),
    /// Identifier universe of the primary source.
    PrimarySource,
}

/// Run-level counters surfaced next to the completeness summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunDiagnostics {
    pub scope_entries: usize,
    pub identifiers: usize,
    pub unparsable_scope_entries: usize,
    pub duplicate_scope_entries: usize,
    pub unavailable_sources: Vec<String>,
}

impl Scope {
    /// Canonical identifiers in scope order, first occurrence kept.
    pub fn identifiers(&self, catalog: &dyn SourceCatalog) -> (Vec<CanonicalKey>, RunDiagnostics) {
        let mut diagnostics = RunDiagnostics::default();
        let raw: Vec<Option<CanonicalKey>> = match self {
            Scope::Explicit(values) => values.iter().map(identifier::normalize).collect(),
            Scope::PrimarySource => catalog.default_scope().into_iter().map(Some).collect(),
        };
        diagnostics.scope_entries = raw.len();
        let mut seen = HashSet::with_capacity(raw.len());
        let mut identifiers = Vec::with_capacity(raw.len());
        for key in raw {
            match key {
                Some(key) => {
                    if seen.insert(key.clone()) {
                        identifiers.push(key);
                    } else {
                        diagnostics.duplicate_scope_entries += 1;
                    }
                }
                None => diagnostics.unparsable_scope_entries += 1,
            }
        }
        if diagnostics.unparsable_scope_entries > 0 {
            warn!(
                "Dropped {} scope entr(ies) without a usable identifier",
                diagnostics.unparsable_scope_entries
            );
        }
        if diagnostics.duplicate_scope_entries > 0 {
            debug!(
                "Ignored {} repeated scope identifier(s)",
                diagnostics.duplicate_scope_entries
            );
        }
        diagnostics.identifiers = identifiers.len();
        (identifiers, diagnostics)
    }
}

/// Resolved values, one row per identifier and one column per destination column.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTable {
    pub columns: Vec<String>,
    pub identifiers: Vec<CanonicalKey>,
    pub rows: Vec<Vec<Option<CellValue>>>,
}

impl ResolvedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn value(&self, identifier: &str, column: &str) -> Option<&CellValue> {
        let row = self.identifiers.iter().position(|id| id.as_str() == identifier)?;
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows[row][col].as_ref()
    }
}

/// Provenance entries shaped exactly like the [`ResolvedTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProvenanceMatrix {
    pub columns: Vec<String>,
    pub statuses: Vec<ColumnStatus>,
    pub identifiers: Vec<CanonicalKey>,
    pub entries: Vec<Vec<ResolutionEntry>>,
}

impl ProvenanceMatrix {
    pub fn entry(&self, identifier: &str, column: &str) -> Option<&ResolutionEntry> {
        let row = self.identifiers.iter().position(|id| id.as_str() == identifier)?;
        let col = self.columns.iter().position(|c| c == column)?;
        Some(&self.entries[row][col])
    }

    /// Entries of one column, in identifier order.
    pub fn column(&self, col: usize) -> impl Iterator<Item = &ResolutionEntry> + '_ {
        self.entries.iter().map(move |row| &row[col])
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub table: ResolvedTable,
    pub provenance: ProvenanceMatrix,
    pub diagnostics: RunDiagnostics,
}

impl RunOutput {
    /// SHA-256 over the table values and provenance, as lowercase hex.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for column in &self.table.columns {
            hasher.update(column.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0x1e]);
        for ((identifier, values), entries) in self
            .table
            .identifiers
            .iter()
            .zip(&self.table.rows)
            .zip(&self.provenance.entries)
        {
            hasher.update(identifier.as_str().as_bytes());
            for (value, entry) in values.iter().zip(entries) {
                hasher.update([0x1f]);
                if let Some(value) = value {
                    hasher.update(value.as_display().as_bytes());
                }
                hasher.update([0x1d]);
                hasher.update(entry.origin.label().as_bytes());
                hasher.update([0x1d]);
                hasher.update(entry.matched_key.as_deref().unwrap_or_default().as_bytes());
                hasher.update([0x1d]);
                hasher.update(entry.miss.map(|m| m.as_str()).unwrap_or_default().as_bytes());
            }
            hasher.update([0x1e]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Fills every destination column for every identifier in `scope`.
///
/// Sources that are registered but unavailable are reported once each; every
/// rule step reading them resolves as a miss and the run still completes.
pub fn resolve_all(
    plan: &MigrationPlan,
    scope: &Scope,
    catalog: &dyn SourceCatalog,
    policy: &KeyPolicy,
) -> RunOutput {
    let (identifiers, mut diagnostics) = scope.identifiers(catalog);
    for source in plan.referenced_sources() {
        if catalog.view(source).is_none() {
            let columns = plan
                .rules()
                .iter()
                .filter(|(_, rule)| rule.sources().contains(&source))
                .map(|(column, _)| column)
                .collect::<Vec<_>>();
            warn!(
                "Source '{source}' is unavailable; column(s) {} will resolve as misses where it is needed",
                columns.join(", ")
            );
            diagnostics.unavailable_sources.push(source.to_string());
        }
    }

    let columns = plan.schema().columns().to_vec();
    let statuses = columns.iter().map(|c| plan.column_status(c)).collect::<Vec<_>>();
    let rules = columns.iter().map(|c| plan.rule_for(c)).collect::<Vec<_>>();

    info!(
        "Resolving {} column(s) for {} identifier(s)",
        columns.len(),
        identifiers.len()
    );
    let mut rows = Vec::with_capacity(identifiers.len());
    let mut entries = Vec::with_capacity(identifiers.len());
    for identifier in &identifiers {
        let candidate_keys = policy.alternate_keys(identifier);
        let row_entries = rules
            .iter()
            .map(|rule| resolver::resolve(*rule, &candidate_keys, catalog))
            .collect::<Vec<_>>();
        rows.push(row_entries.iter().map(|e| e.value.clone()).collect());
        entries.push(row_entries);
    }
    debug!("Resolved {} cell(s)", identifiers.len() * columns.len());

    RunOutput {
        table: ResolvedTable {
            columns: columns.clone(),
            identifiers: identifiers.clone(),
            rows,
        },
        provenance: ProvenanceMatrix {
            columns,
            statuses,
            identifiers,
            entries,
        },
        diagnostics,
    }
}
