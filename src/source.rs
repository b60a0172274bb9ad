use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::PlanError,
    io_utils,
    value::{CellValue, parse_cell},
};

/// Registration details of a source, independent of where its rows come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub identifier_column: String,
    /// Lower ranks are tried first when choosing the primary source.
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    10
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, identifier_column: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            identifier_column: identifier_column.into(),
            priority,
        }
    }
}

/// An immutable, already-parsed tabular source.
#[derive(Debug, Clone)]
pub struct SourceDataset {
    spec: SourceSpec,
    headers: Vec<String>,
    identifier_index: usize,
    rows: Vec<Vec<Option<CellValue>>>,
}

impl SourceDataset {
    pub fn new(
        spec: SourceSpec,
        headers: Vec<String>,
        rows: Vec<Vec<Option<CellValue>>>,
    ) -> Result<Self, PlanError> {
        let mut seen = HashSet::with_capacity(headers.len());
        for header in &headers {
            if !seen.insert(header.as_str()) {
                return Err(PlanError::DuplicateSourceColumn {
                    source_name: spec.name.clone(),
                    column: header.clone(),
                });
            }
        }
        let identifier_index = headers
            .iter()
            .position(|h| *h == spec.identifier_column)
            .ok_or_else(|| PlanError::MissingIdentifierColumn {
                source_name: spec.name.clone(),
                column: spec.identifier_column.clone(),
            })?;
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(PlanError::RaggedRow {
                    source_name: spec.name.clone(),
                    row: idx,
                    found: row.len(),
                    expected: headers.len(),
                });
            }
        }
        Ok(Self {
            spec,
            headers,
            identifier_index,
            rows,
        })
    }

    /// Builds a dataset from text cells, wrapped with [`parse_cell`].
    pub fn from_text_rows<S: AsRef<str>>(
        spec: SourceSpec,
        headers: &[&str],
        rows: &[Vec<S>],
    ) -> Result<Self, PlanError> {
        let headers = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|cell| parse_cell(cell.as_ref())).collect())
            .collect();
        Self::new(spec, headers, rows)
    }

    pub fn from_csv(
        path: &Path,
        spec: SourceSpec,
        delimiter: u8,
        encoding: &'static Encoding,
    ) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        let headers = io_utils::reader_headers(&mut reader, encoding)
            .with_context(|| format!("Reading headers from {path:?}"))?;
        let headers = disambiguate_headers(&spec.name, headers);
        let mut rows: Vec<Vec<Option<CellValue>>> = Vec::new();
        for (row_idx, record) in reader.byte_records().enumerate() {
            let record = record.with_context(|| format!("Reading row {} in {path:?}", row_idx + 2))?;
            let decoded = io_utils::decode_record(&record, encoding)
                .with_context(|| format!("Decoding row {} in {path:?}", row_idx + 2))?;
            rows.push(decoded.iter().map(|cell| parse_cell(cell)).collect());
        }
        debug!(
            "Loaded {} row(s) x {} column(s) for source '{}' from {path:?}",
            rows.len(),
            headers.len(),
            spec.name
        );
        Ok(Self::new(spec, headers, rows)?)
    }

    pub fn spec(&self) -> &SourceSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn priority(&self) -> u32 {
        self.spec.priority
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn identifier_cell(&self, row: usize) -> Option<&CellValue> {
        self.cell_at(row, self.identifier_index)
    }

    pub fn cell_at(&self, row: usize, column: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(column)).and_then(|c| c.as_ref())
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        self.column_index(column).and_then(|idx| self.cell_at(row, idx))
    }
}

/// Renames blank and repeated headers the way spreadsheet readers do:
/// blanks become `Unnamed: <position>`, repeats gain `.1`, `.2`, ...
fn disambiguate_headers(source: &str, headers: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = headers
        .iter()
        .filter(|h| !h.trim().is_empty())
        .cloned()
        .collect();
    let mut seen: HashSet<String> = HashSet::with_capacity(headers.len());
    let mut repeats: HashMap<String, usize> = HashMap::new();
    let mut renamed = Vec::with_capacity(headers.len());
    for (idx, header) in headers.into_iter().enumerate() {
        if header.trim().is_empty() {
            let name = unique_name(format!("Unnamed: {idx}"), &mut taken);
            warn!("Source '{source}': blank header at position {idx} renamed to '{name}'");
            seen.insert(name.clone());
            renamed.push(name);
            continue;
        }
        if seen.insert(header.clone()) {
            renamed.push(header);
            continue;
        }
        let counter = repeats.entry(header.clone()).or_insert(0);
        let name = loop {
            *counter += 1;
            let candidate = format!("{header}.{counter}");
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        taken.insert(name.clone());
        seen.insert(name.clone());
        warn!("Source '{source}': repeated header '{header}' renamed to '{name}'");
        renamed.push(name);
    }
    renamed
}

fn unique_name(base: String, taken: &mut HashSet<String>) -> String {
    let mut name = base.clone();
    let mut counter = 0;
    while taken.contains(&name) {
        counter += 1;
        name = format!("{base}.{counter}");
    }
    taken.insert(name.clone());
    name
}
