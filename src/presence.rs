//! Where each identifier in a run can be found.
//!
//! Every available source is probed with the same candidate keys the
//! resolver uses, so a source counts as present for an identifier exactly
//! when a rule reading it could have matched a row.

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::{
    engine::ProvenanceMatrix,
    identifier::KeyPolicy,
    registry::{SourceCatalog, SourceRegistry},
    resolver::Origin,
};

/// Rows found for one identifier, keyed by source name. Absent sources map to 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordPresence {
    pub identifier: String,
    pub rows_by_source: BTreeMap<String, usize>,
    /// True when at least one destination cell came from a source.
    pub has_source_data: bool,
}

impl RecordPresence {
    pub fn rows(&self, source: &str) -> usize {
        self.rows_by_source.get(source).copied().unwrap_or_default()
    }

    pub fn is_present(&self, source: &str) -> bool {
        self.rows(source) > 0
    }

    pub fn has_duplicates(&self, source: &str) -> bool {
        self.rows(source) > 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PresenceReport {
    /// Available sources that were probed, in name order.
    pub sources: Vec<String>,
    pub unavailable_sources: Vec<String>,
    pub records: Vec<RecordPresence>,
    /// Identifiers with no row in each source.
    pub not_found: BTreeMap<String, Vec<String>>,
    /// Identifiers with more than one row in each source.
    pub duplicated: BTreeMap<String, Vec<String>>,
    /// Identifiers for which no destination cell came from any source.
    pub no_data: Vec<String>,
}

impl PresenceReport {
    pub fn record(&self, identifier: &str) -> Option<&RecordPresence> {
        self.records.iter().find(|r| r.identifier == identifier)
    }
}

pub fn analyze(
    provenance: &ProvenanceMatrix,
    registry: &SourceRegistry,
    policy: &KeyPolicy,
) -> PresenceReport {
    let mut report = PresenceReport::default();
    for name in registry.names() {
        if registry.view(name).is_some() {
            report.sources.push(name.to_string());
            report.not_found.insert(name.to_string(), Vec::new());
            report.duplicated.insert(name.to_string(), Vec::new());
        } else {
            report.unavailable_sources.push(name.to_string());
        }
    }

    for (identifier, entries) in provenance.identifiers.iter().zip(&provenance.entries) {
        let candidate_keys = policy.alternate_keys(identifier);
        let mut rows_by_source = BTreeMap::new();
        for name in &report.sources {
            let rows = registry
                .view(name)
                .and_then(|view| view.find_rows(&candidate_keys))
                .map_or(0, |found| found.rows.len());
            rows_by_source.insert(name.clone(), rows);
            if rows == 0 {
                report
                    .not_found
                    .entry(name.clone())
                    .or_default()
                    .push(identifier.to_string());
            } else if rows > 1 {
                report
                    .duplicated
                    .entry(name.clone())
                    .or_default()
                    .push(identifier.to_string());
            }
        }
        let has_source_data = entries
            .iter()
            .any(|entry| matches!(entry.origin, Origin::Source(_)));
        if !has_source_data {
            report.no_data.push(identifier.to_string());
        }
        report.records.push(RecordPresence {
            identifier: identifier.to_string(),
            rows_by_source,
            has_source_data,
        });
    }

    debug!(
        "Probed {} identifier(s) in {} source(s); {} without source data",
        report.records.len(),
        report.sources.len(),
        report.no_data.len()
    );
    report
}
