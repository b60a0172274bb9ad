//! Source registry: the named sources a run may read from.
//!
//! Resolution only ever reads through [`SourceCatalog`] and [`SourceView`], so
//! the registry is free to build indexes lazily and tests can substitute stubs.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    sync::OnceLock,
};

use log::warn;
use serde::Serialize;

use crate::{
    error::PlanError,
    identifier::{self, CanonicalKey},
    index::{KeyMatch, SourceIndex},
    source::SourceDataset,
    value::CellValue,
};

/// Read access to one indexed source.
pub trait SourceView {
    fn name(&self) -> &str;
    fn has_column(&self, column: &str) -> bool;
    /// Rows for the first candidate key with a match, in dataset order.
    fn find_rows(&self, candidate_keys: &[String]) -> Option<KeyMatch<'_>>;
    fn cell(&self, row: usize, column: &str) -> Option<&CellValue>;
}

/// Named lookup of sources for the resolver.
pub trait SourceCatalog {
    /// True when the name was registered, whether or not it loaded.
    fn is_registered(&self, name: &str) -> bool;
    /// `None` when the source is unknown or failed to load.
    fn view(&self, name: &str) -> Option<&dyn SourceView>;
    /// Identifiers resolved when the caller supplies no explicit scope.
    fn default_scope(&self) -> Vec<CanonicalKey> {
        Vec::new()
    }
}

#[derive(Debug)]
struct IndexedSource {
    dataset: SourceDataset,
    index: OnceLock<SourceIndex>,
}

impl IndexedSource {
    fn index(&self) -> &SourceIndex {
        self.index.get_or_init(|| SourceIndex::build(&self.dataset))
    }
}

impl SourceView for IndexedSource {
    fn name(&self) -> &str {
        self.dataset.name()
    }

    fn has_column(&self, column: &str) -> bool {
        self.dataset.column_index(column).is_some()
    }

    fn find_rows(&self, candidate_keys: &[String]) -> Option<KeyMatch<'_>> {
        self.index().lookup(candidate_keys)
    }

    fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        self.dataset.cell(row, column)
    }
}

#[derive(Debug)]
enum SourceSlot {
    Available(Box<IndexedSource>),
    Unavailable { reason: String },
}

/// Data-quality counters for one registered source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDiagnostics {
    pub name: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable_reason: Option<String>,
    pub rows: usize,
    pub distinct_identifiers: usize,
    pub unindexable_rows: usize,
    pub duplicate_identifiers: usize,
    pub duplicate_rows: usize,
}

#[derive(Debug, Default)]
pub struct SourceRegistry {
    slots: BTreeMap<String, SourceSlot>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, dataset: SourceDataset) -> Result<(), PlanError> {
        let name = dataset.name().to_string();
        self.insert(
            name,
            SourceSlot::Available(Box::new(IndexedSource {
                dataset,
                index: OnceLock::new(),
            })),
        )
    }

    /// Records a source that failed to load so rules naming it degrade to misses.
    pub fn register_unavailable(
        &mut self,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<(), PlanError> {
        let name = name.into();
        let reason = reason.into();
        warn!("Source '{name}' is unavailable: {reason}");
        self.insert(name, SourceSlot::Unavailable { reason })
    }

    fn insert(&mut self, name: String, slot: SourceSlot) -> Result<(), PlanError> {
        match self.slots.entry(name) {
            Entry::Occupied(entry) => Err(PlanError::DuplicateSource {
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(slot);
                Ok(())
            }
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(|k| k.as_str())
    }

    pub fn dataset(&self, name: &str) -> Option<&SourceDataset> {
        match self.slots.get(name) {
            Some(SourceSlot::Available(source)) => Some(&source.dataset),
            _ => None,
        }
    }

    /// Index for `name`, built on first use and cached for the registry's lifetime.
    pub fn index(&self, name: &str) -> Option<&SourceIndex> {
        match self.slots.get(name) {
            Some(SourceSlot::Available(source)) => Some(source.index()),
            _ => None,
        }
    }

    pub fn unavailable_reason(&self, name: &str) -> Option<&str> {
        match self.slots.get(name) {
            Some(SourceSlot::Unavailable { reason }) => Some(reason.as_str()),
            _ => None,
        }
    }

    /// Available source with the lowest priority rank; ties go to the name that sorts first.
    pub fn primary_source(&self) -> Option<&SourceDataset> {
        self.slots
            .values()
            .filter_map(|slot| match slot {
                SourceSlot::Available(source) => Some(&source.dataset),
                SourceSlot::Unavailable { .. } => None,
            })
            .min_by(|a, b| a.priority().cmp(&b.priority()).then_with(|| a.name().cmp(b.name())))
    }

    pub fn diagnostics(&self) -> Vec<SourceDiagnostics> {
        self.slots
            .iter()
            .map(|(name, slot)| match slot {
                SourceSlot::Available(source) => {
                    let index = source.index();
                    let duplicates = index.duplicate_keys();
                    SourceDiagnostics {
                        name: name.clone(),
                        available: true,
                        unavailable_reason: None,
                        rows: index.row_count(),
                        distinct_identifiers: index.key_count(),
                        unindexable_rows: index.unindexable_rows(),
                        duplicate_identifiers: duplicates.len(),
                        duplicate_rows: duplicates.values().sum(),
                    }
                }
                SourceSlot::Unavailable { reason } => SourceDiagnostics {
                    name: name.clone(),
                    available: false,
                    unavailable_reason: Some(reason.clone()),
                    rows: 0,
                    distinct_identifiers: 0,
                    unindexable_rows: 0,
                    duplicate_identifiers: 0,
                    duplicate_rows: 0,
                },
            })
            .collect()
    }
}

impl SourceCatalog for SourceRegistry {
    fn is_registered(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    fn view(&self, name: &str) -> Option<&dyn SourceView> {
        match self.slots.get(name) {
            Some(SourceSlot::Available(source)) => Some(&**source as &dyn SourceView),
            _ => None,
        }
    }

    /// Identifier universe of the primary source, in first-seen order.
    fn default_scope(&self) -> Vec<CanonicalKey> {
        let Some(primary) = self.primary_source() else {
            return Vec::new();
        };
        self.index(primary.name())
            .map(|index| {
                index
                    .keys()
                    .iter()
                    .filter_map(|key| identifier::normalize_text(key))
                    .collect()
            })
            .unwrap_or_default()
    }
}
