use std::collections::{BTreeMap, btree_map::Entry};

use serde::{Deserialize, Serialize};

use crate::{error::PlanError, value::CellValue};

/// A column of a named source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceColumn {
    pub source: String,
    pub column: String,
}

impl SourceColumn {
    pub fn new(source: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            column: column.into(),
        }
    }
}

/// How one destination column is filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingRule {
    /// Read a single source column.
    Direct(SourceColumn),
    /// Same value for every identifier; never misses.
    Constant { value: CellValue },
    /// Source columns tried in list order until one yields a non-blank value.
    Fallback { steps: Vec<SourceColumn> },
}

impl MappingRule {
    pub fn direct(source: impl Into<String>, column: impl Into<String>) -> Self {
        MappingRule::Direct(SourceColumn::new(source, column))
    }

    pub fn constant(value: impl Into<CellValue>) -> Self {
        MappingRule::Constant {
            value: value.into(),
        }
    }

    pub fn fallback<I, S, C>(steps: I) -> Self
    where
        I: IntoIterator<Item = (S, C)>,
        S: Into<String>,
        C: Into<String>,
    {
        MappingRule::Fallback {
            steps: steps
                .into_iter()
                .map(|(source, column)| SourceColumn::new(source, column))
                .collect(),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, MappingRule::Constant { .. })
    }

    /// Probing order of a source-backed rule; empty for constants.
    pub fn steps(&self) -> &[SourceColumn] {
        match self {
            MappingRule::Direct(step) => std::slice::from_ref(step),
            MappingRule::Constant { .. } => &[],
            MappingRule::Fallback { steps } => steps,
        }
    }

    /// Source names the rule reads from, in probing order.
    pub fn sources(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for step in self.steps() {
            if !names.contains(&step.source.as_str()) {
                names.push(step.source.as_str());
            }
        }
        names
    }
}

/// A rule bound to its destination column, as written in run files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    pub target: String,
    #[serde(flatten)]
    pub rule: MappingRule,
}

/// At most one rule per destination column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: BTreeMap<String, MappingRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules<I>(rules: I) -> Result<Self, PlanError>
    where
        I: IntoIterator<Item = ColumnRule>,
    {
        let mut set = RuleSet::new();
        for ColumnRule { target, rule } in rules {
            set.insert(target, rule)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, column: impl Into<String>, rule: MappingRule) -> Result<(), PlanError> {
        let column = column.into();
        if matches!(&rule, MappingRule::Fallback { steps } if steps.is_empty()) {
            return Err(PlanError::EmptyFallback { column });
        }
        match self.rules.entry(column) {
            Entry::Occupied(entry) => Err(PlanError::DuplicateRule {
                column: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(rule);
                Ok(())
            }
        }
    }

    /// Builder-style [`RuleSet::insert`].
    pub fn with(mut self, column: impl Into<String>, rule: MappingRule) -> Result<Self, PlanError> {
        self.insert(column, rule)?;
        Ok(self)
    }

    pub fn get(&self, column: &str) -> Option<&MappingRule> {
        self.rules.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MappingRule)> {
        self.rules.iter().map(|(column, rule)| (column.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
