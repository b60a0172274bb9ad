//! Completeness analysis over a provenance matrix.
//!
//! The summary is a pure function of the matrix and the options: nothing is
//! accumulated between calls.

use std::{cmp::Ordering, collections::BTreeMap};

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    engine::{ColumnStatus, ProvenanceMatrix},
    resolver::{MissReason, Origin},
};

/// Lower bound (inclusive) of a fill-rate band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillBand {
    pub label: String,
    pub min_rate: f64,
}

impl FillBand {
    pub fn new(label: impl Into<String>, min_rate: f64) -> Self {
        Self {
            label: label.into(),
            min_rate,
        }
    }
}

pub fn default_bands() -> Vec<FillBand> {
    vec![
        FillBand::new(">=90%", 0.9),
        FillBand::new("70-89%", 0.7),
        FillBand::new("50-69%", 0.5),
        FillBand::new("<50%", 0.0),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletenessOptions {
    /// Count columns without any rule in the per-record denominator.
    pub include_unmapped_columns: bool,
    /// Count constant columns in the per-record denominator.
    pub include_constant_columns: bool,
    /// Length of the worst-column and worst-record rankings.
    pub top_n: usize,
    pub bands: Vec<FillBand>,
}

impl Default for CompletenessOptions {
    fn default() -> Self {
        Self {
            include_unmapped_columns: false,
            include_constant_columns: true,
            top_n: 10,
            bands: default_bands(),
        }
    }
}

impl CompletenessOptions {
    fn counts(&self, status: ColumnStatus) -> bool {
        match status {
            ColumnStatus::Mapped => true,
            ColumnStatus::Constant => self.include_constant_columns,
            ColumnStatus::Unmapped => self.include_unmapped_columns,
        }
    }

    /// Bands sorted from the highest lower bound down.
    fn sorted_bands(&self) -> Vec<&FillBand> {
        self.bands
            .iter()
            .sorted_by(|a, b| b.min_rate.total_cmp(&a.min_rate))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub column: String,
    pub status: ColumnStatus,
    pub filled: usize,
    pub missed: usize,
    pub fill_rate: f64,
    pub misses_by_reason: BTreeMap<MissReason, usize>,
    /// Hits per source name, `Constant` for constant columns.
    pub hits_by_source: BTreeMap<String, usize>,
}

/// Remediation urgency of a record, from its fill rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Below 30%.
    High,
    /// Below 70%.
    Medium,
    Low,
}

impl Priority {
    pub fn for_rate(rate: f64) -> Self {
        if rate < 0.3 {
            Priority::High
        } else if rate < 0.7 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordStats {
    pub identifier: String,
    pub filled: usize,
    pub considered: usize,
    pub fill_rate: f64,
    pub priority: Priority,
    pub missing_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandCount {
    pub label: String,
    pub min_rate: f64,
    pub records: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked {
    pub name: String,
    pub fill_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletenessSummary {
    pub identifiers: usize,
    pub columns: Vec<ColumnStats>,
    pub records: Vec<RecordStats>,
    pub bands: Vec<BandCount>,
    pub worst_columns: Vec<Ranked>,
    pub worst_records: Vec<Ranked>,
    pub average_record_fill_rate: f64,
    pub complete_records: usize,
    pub partial_records: usize,
    pub empty_records: usize,
    pub misses_by_reason: BTreeMap<MissReason, usize>,
    pub misses_by_source: BTreeMap<String, BTreeMap<MissReason, usize>>,
}

impl CompletenessSummary {
    pub fn column(&self, name: &str) -> Option<&ColumnStats> {
        self.columns.iter().find(|c| c.column == name)
    }

    pub fn record(&self, identifier: &str) -> Option<&RecordStats> {
        self.records.iter().find(|r| r.identifier == identifier)
    }

    /// Records from the lowest fill rate up; equal rates ordered by identifier.
    pub fn records_by_fill_rate(&self) -> Vec<&RecordStats> {
        self.records
            .iter()
            .sorted_by(|a, b| {
                a.fill_rate
                    .total_cmp(&b.fill_rate)
                    .then_with(|| a.identifier.cmp(&b.identifier))
            })
            .collect()
    }
}

/// Zero denominators yield a rate of zero.
pub fn rate(filled: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        filled as f64 / total as f64
    }
}

pub fn summarize(provenance: &ProvenanceMatrix, options: &CompletenessOptions) -> CompletenessSummary {
    let identifiers = provenance.identifiers.len();
    let mut misses_by_reason: BTreeMap<MissReason, usize> = BTreeMap::new();
    let mut misses_by_source: BTreeMap<String, BTreeMap<MissReason, usize>> = BTreeMap::new();

    let columns = provenance
        .columns
        .iter()
        .enumerate()
        .map(|(col, name)| {
            let mut stats = ColumnStats {
                column: name.clone(),
                status: provenance.statuses[col],
                filled: 0,
                missed: 0,
                fill_rate: 0.0,
                misses_by_reason: BTreeMap::new(),
                hits_by_source: BTreeMap::new(),
            };
            for entry in provenance.column(col) {
                match entry.miss {
                    None => {
                        stats.filled += 1;
                        *stats
                            .hits_by_source
                            .entry(entry.origin.label().to_string())
                            .or_default() += 1;
                    }
                    Some(reason) => {
                        stats.missed += 1;
                        *stats.misses_by_reason.entry(reason).or_default() += 1;
                        *misses_by_reason.entry(reason).or_default() += 1;
                        if let Some(source) = &entry.missed_source {
                            *misses_by_source
                                .entry(source.clone())
                                .or_default()
                                .entry(reason)
                                .or_default() += 1;
                        }
                    }
                }
            }
            stats.fill_rate = rate(stats.filled, identifiers);
            stats
        })
        .collect::<Vec<_>>();

    let considered_columns = provenance
        .statuses
        .iter()
        .map(|status| options.counts(*status))
        .collect::<Vec<_>>();

    let records = provenance
        .identifiers
        .iter()
        .zip(&provenance.entries)
        .map(|(identifier, entries)| {
            let mut filled = 0usize;
            let mut considered = 0usize;
            let mut missing_columns = Vec::new();
            for ((entry, name), counted) in entries
                .iter()
                .zip(&provenance.columns)
                .zip(&considered_columns)
            {
                if !*counted {
                    continue;
                }
                considered += 1;
                if entry.is_hit() {
                    filled += 1;
                } else {
                    missing_columns.push(name.clone());
                }
            }
            let fill_rate = rate(filled, considered);
            RecordStats {
                identifier: identifier.to_string(),
                filled,
                considered,
                fill_rate,
                priority: Priority::for_rate(fill_rate),
                missing_columns,
            }
        })
        .collect::<Vec<_>>();

    let ranked_columns = columns
        .iter()
        .filter(|c| options.counts(c.status))
        .map(|c| (c.column.as_str(), c.fill_rate))
        .collect::<Vec<_>>();

    let mut bands = options
        .sorted_bands()
        .into_iter()
        .map(|band| BandCount {
            label: band.label.clone(),
            min_rate: band.min_rate,
            records: 0,
            columns: 0,
        })
        .collect::<Vec<_>>();
    let floor = bands.last().map(|band| band.min_rate);
    if floor.is_none_or(|min_rate| min_rate > 0.0) {
        let label = match floor {
            Some(min_rate) => format!("<{:.0}%", min_rate * 100.0),
            None => "all".to_string(),
        };
        debug!("Fill bands have no zero floor; adding catch-all band '{label}'");
        bands.push(BandCount {
            label,
            min_rate: 0.0,
            records: 0,
            columns: 0,
        });
    }
    let bands = count_bands(bands, &records, &ranked_columns);

    let (complete_records, partial_records, empty_records) =
        records
            .iter()
            .fold((0, 0, 0), |(complete, partial, empty), record| {
                if record.filled == 0 {
                    (complete, partial, empty + 1)
                } else if record.filled == record.considered {
                    (complete + 1, partial, empty)
                } else {
                    (complete, partial + 1, empty)
                }
            });

    let average_record_fill_rate = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|r| r.fill_rate).sum::<f64>() / records.len() as f64
    };

    CompletenessSummary {
        identifiers,
        worst_columns: worst(ranked_columns.iter().copied(), options.top_n),
        worst_records: worst(
            records.iter().map(|r| (r.identifier.as_str(), r.fill_rate)),
            options.top_n,
        ),
        columns,
        bands,
        records,
        average_record_fill_rate,
        complete_records,
        partial_records,
        empty_records,
        misses_by_reason,
        misses_by_source,
    }
}

fn count_bands(
    mut bands: Vec<BandCount>,
    records: &[RecordStats],
    columns: &[(&str, f64)],
) -> Vec<BandCount> {
    let slot = |rate: f64, bands: &[BandCount]| bands.iter().position(|b| rate >= b.min_rate);
    for record in records {
        if let Some(idx) = slot(record.fill_rate, &bands) {
            bands[idx].records += 1;
        }
    }
    for (_, rate) in columns {
        if let Some(idx) = slot(*rate, &bands) {
            bands[idx].columns += 1;
        }
    }
    bands
}

/// Lowest fill rates first; equal rates ordered by name.
fn worst<'a>(items: impl Iterator<Item = (&'a str, f64)>, top_n: usize) -> Vec<Ranked> {
    items
        .sorted_by(|a, b| match a.1.total_cmp(&b.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        })
        .take(top_n)
        .map(|(name, fill_rate)| Ranked {
            name: name.to_string(),
            fill_rate,
        })
        .collect()
}

/// Hit count per origin label across the whole matrix.
pub fn hits_by_origin(provenance: &ProvenanceMatrix) -> BTreeMap<String, usize> {
    provenance
        .entries
        .iter()
        .flatten()
        .filter(|entry| !matches!(entry.origin, Origin::Unresolved))
        .map(|entry| entry.origin.label().to_string())
        .counts()
        .into_iter()
        .collect()
}
