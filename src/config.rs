//! YAML run files.
//!
//! A run file names the destination columns, the sources to load, the
//! identifier transformation rules and the mapping rules. Relative paths are
//! resolved against the directory holding the run file.
//!
//! ```yaml
//! destination: [GCPJ, NOME, UF, EMPRESA]
//! identifier_rules:
//!   - { kind: replace_prefix, from: "24", to: "16" }
//! sources:
//!   - { name: base, path: base.csv, identifier_column: GCPJ, priority: 1 }
//!   - { name: juridico, path: juridico.csv, identifier_column: CODIGO, priority: 2 }
//! rules:
//!   - { target: GCPJ, kind: direct, source: base, column: GCPJ }
//!   - { target: NOME, kind: direct, source: base, column: NOME }
//!   - target: UF
//!     kind: fallback
//!     steps: [{ source: juridico, column: UF }, { source: base, column: ESTADO }]
//!   - { target: EMPRESA, kind: constant, value: BANCO BRADESCO }
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    cli::parse_delimiter,
    completeness::CompletenessOptions,
    engine::{DestinationSchema, MigrationPlan, Scope},
    error::PlanError,
    formatting::ColumnFormats,
    identifier::KeyPolicy,
    io_utils,
    registry::SourceRegistry,
    rules::{ColumnRule, RuleSet},
    source::{SourceDataset, SourceSpec},
    value::{CellValue, parse_cell},
};

fn default_priority() -> u32 {
    10
}

fn default_identifier_header() -> String {
    "GCPJ".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub path: PathBuf,
    pub identifier_column: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

impl SourceConfig {
    pub fn spec(&self) -> SourceSpec {
        SourceSpec::new(&self.name, &self.identifier_column, self.priority)
    }
}

/// Explicit identifier scope: inline values, a CSV column, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeConfig {
    #[serde(default)]
    pub identifiers: Vec<CellValue>,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub destination: Vec<String>,
    #[serde(default)]
    pub identifier_rules: KeyPolicy,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub rules: Vec<ColumnRule>,
    #[serde(default)]
    pub scope: Option<ScopeConfig>,
    #[serde(default)]
    pub formats: ColumnFormats,
    #[serde(default)]
    pub completeness: CompletenessOptions,
    /// Header of the identifier column prepended to exported tables.
    #[serde(default = "default_identifier_header")]
    pub identifier_header: String,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("Reading run file {path:?}"))?;
        let mut config = Self::from_yaml(&raw).with_context(|| format!("Parsing run file {path:?}"))?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        debug!(
            "Loaded run file {path:?}: {} destination column(s), {} source(s), {} rule(s)",
            config.destination.len(),
            config.sources.len(),
            config.rules.len()
        );
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Loads every source. Missing or unreadable files become unavailable
    /// sources; blank or repeated headers are renamed with a warning. A
    /// readable file without its identifier column is fatal.
    pub fn build_registry(&self) -> Result<SourceRegistry> {
        let mut registry = SourceRegistry::new();
        for source in &self.sources {
            let path = self.resolve_path(&source.path);
            if !path.is_file() {
                registry.register_unavailable(&source.name, format!("file {path:?} not found"))?;
                continue;
            }
            let delimiter = match source.delimiter.as_deref() {
                Some(raw) => parse_delimiter(raw)
                    .map_err(|err| anyhow!("Source '{}': {err}", source.name))?,
                None => io_utils::resolve_input_delimiter(&path, None),
            };
            let encoding = io_utils::resolve_encoding(source.encoding.as_deref())
                .with_context(|| format!("Source '{}'", source.name))?;
            match SourceDataset::from_csv(&path, source.spec(), delimiter, encoding) {
                Ok(dataset) => {
                    info!(
                        "Loaded source '{}' ({} row(s)) from {path:?}",
                        source.name,
                        dataset.row_count()
                    );
                    registry.register(dataset)?;
                }
                Err(err) if err.downcast_ref::<PlanError>().is_some() => {
                    return Err(err.context(format!("Loading source '{}'", source.name)));
                }
                Err(err) => {
                    registry.register_unavailable(&source.name, format!("{err:#}"))?;
                }
            }
        }
        Ok(registry)
    }

    pub fn schema(&self) -> Result<DestinationSchema, PlanError> {
        DestinationSchema::new(self.destination.iter().cloned())
    }

    pub fn rule_set(&self) -> Result<RuleSet, PlanError> {
        RuleSet::from_rules(self.rules.iter().cloned())
    }

    pub fn plan(&self, registry: &SourceRegistry) -> Result<MigrationPlan, PlanError> {
        MigrationPlan::new(self.schema()?, self.rule_set()?, registry)
    }

    pub fn scope(&self) -> Result<Scope> {
        let Some(scope) = &self.scope else {
            return Ok(Scope::PrimarySource);
        };
        let mut identifiers = scope.identifiers.clone();
        if let Some(file) = &scope.file {
            let column = scope
                .column
                .as_deref()
                .ok_or_else(|| anyhow!("Scope file {file:?} requires a 'column'"))?;
            let path = self.resolve_path(file);
            identifiers.extend(read_scope_column(&path, column, scope)?);
        }
        Ok(Scope::Explicit(identifiers))
    }
}

fn read_scope_column(path: &Path, column: &str, scope: &ScopeConfig) -> Result<Vec<CellValue>> {
    let delimiter = match scope.delimiter.as_deref() {
        Some(raw) => parse_delimiter(raw).map_err(|err| anyhow!("Scope file: {err}"))?,
        None => io_utils::resolve_input_delimiter(path, None),
    };
    let encoding = io_utils::resolve_encoding(scope.encoding.as_deref())?;
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    let position = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| anyhow!("Column '{column}' not found in scope file {path:?}"))?;
    let mut values = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} in {path:?}", row_idx + 2))?;
        let raw = record.get(position).unwrap_or_default();
        let decoded = io_utils::decode_bytes(raw, encoding)?;
        values.push(parse_cell(&decoded).unwrap_or_else(|| CellValue::Text(String::new())));
    }
    debug!("Read {} scope value(s) from {path:?}", values.len());
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::MappingRule;

    const RUN: &str = r#"
destination: [ID, NAME, REGION]
identifier_rules:
  - { kind: replace_prefix, from: "24", to: "16" }
sources:
  - { name: P, path: p.csv, identifier_column: id, priority: 1 }
  - { name: S, path: s.csv, identifier_column: id, priority: 2, delimiter: ";" }
rules:
  - { target: NAME, kind: direct, source: P, column: name }
  - { target: REGION, kind: direct, source: S, column: region }
scope:
  identifiers: ["24100", 24101]
formats:
  NAME: upper
completeness:
  include_unmapped_columns: true
"#;

    #[test]
    fn parses_run_file() {
        let config = RunConfig::from_yaml(RUN).unwrap();
        assert_eq!(config.destination, vec!["ID", "NAME", "REGION"]);
        assert_eq!(config.sources[1].delimiter.as_deref(), Some(";"));
        assert_eq!(config.identifier_rules.rules().len(), 1);
        assert!(config.completeness.include_unmapped_columns);
        assert_eq!(config.completeness.top_n, 10);
        assert_eq!(config.identifier_header, "GCPJ");
        assert_eq!(
            config.rule_set().unwrap().get("NAME"),
            Some(&MappingRule::direct("P", "name"))
        );
        match config.scope().unwrap() {
            Scope::Explicit(values) => assert_eq!(values.len(), 2),
            Scope::PrimarySource => panic!("expected explicit scope"),
        }
    }

    #[test]
    fn relative_paths_follow_run_file() {
        let config = RunConfig::from_yaml(RUN).unwrap().with_base_dir("/data/run");
        assert_eq!(
            config.resolve_path(Path::new("p.csv")),
            PathBuf::from("/data/run/p.csv")
        );
        assert_eq!(
            config.resolve_path(Path::new("/abs/s.csv")),
            PathBuf::from("/abs/s.csv")
        );
    }

    #[test]
    fn missing_files_register_unavailable_sources() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("p.csv"), "id,name\n24100,Alice\n").unwrap();
        let config = RunConfig::from_yaml(RUN).unwrap().with_base_dir(dir.path());
        let registry = config.build_registry().unwrap();
        assert!(registry.dataset("P").is_some());
        assert!(registry.dataset("S").is_none());
        assert!(registry.unavailable_reason("S").is_some());
        assert!(config.plan(&registry).is_ok());
    }

    #[test]
    fn structural_source_errors_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("p.csv"), "codigo,name\n24100,Alice\n").unwrap();
        let config = RunConfig::from_yaml(RUN).unwrap().with_base_dir(dir.path());
        let err = config.build_registry().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlanError>(),
            Some(PlanError::MissingIdentifierColumn { .. })
        ));
    }

    #[test]
    fn blank_trailing_headers_do_not_abort_the_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("p.csv"), "id,name\n24100,Alice\n").unwrap();
        fs::write(dir.path().join("s.csv"), "id;region;;\n16100;North;;\n").unwrap();
        let config = RunConfig::from_yaml(RUN).unwrap().with_base_dir(dir.path());
        let registry = config.build_registry().unwrap();
        let source = registry.dataset("S").unwrap();
        assert_eq!(source.headers(), ["id", "region", "Unnamed: 2", "Unnamed: 3"]);
        assert!(config.plan(&registry).is_ok());
    }

    #[test]
    fn scope_file_column_is_read() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("scope.csv"), "GCPJ,OTHER\n24100,x\n,y\n0024102,z\n").unwrap();
        let yaml = "destination: [A]\nscope:\n  file: scope.csv\n  column: GCPJ\n";
        let config = RunConfig::from_yaml(yaml).unwrap().with_base_dir(dir.path());
        match config.scope().unwrap() {
            Scope::Explicit(values) => assert_eq!(
                values,
                vec![
                    CellValue::from("24100"),
                    CellValue::Text(String::new()),
                    CellValue::Text("0024102".to_string())
                ]
            ),
            Scope::PrimarySource => panic!("expected explicit scope"),
        }
    }
}
