use std::collections::BTreeMap;

use log::{debug, warn};

use crate::{identifier, source::SourceDataset};

/// Rows of one source that share the candidate key that matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMatch<'a> {
    pub key: &'a str,
    pub rows: &'a [usize],
}

/// Lookup from canonical identifier to row positions, in dataset order.
///
/// Only the canonical key of each row is stored. Alternate encodings are
/// generated from the query side at lookup time.
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    map: BTreeMap<String, Vec<usize>>,
    first_seen: Vec<String>,
    row_count: usize,
    unindexable_rows: usize,
}

impl SourceIndex {
    pub fn build(dataset: &SourceDataset) -> Self {
        let mut map: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut first_seen = Vec::new();
        let mut unindexable_rows = 0usize;
        for row in 0..dataset.row_count() {
            match identifier::normalize_cell(dataset.identifier_cell(row)) {
                Some(key) => {
                    let key = key.into_string();
                    let bucket = map.entry(key.clone()).or_default();
                    if bucket.is_empty() {
                        first_seen.push(key);
                    }
                    bucket.push(row);
                }
                None => unindexable_rows += 1,
            }
        }
        if unindexable_rows > 0 {
            warn!(
                "Source '{}': {} row(s) without a usable identifier in column '{}'",
                dataset.name(),
                unindexable_rows,
                dataset.spec().identifier_column
            );
        }
        let index = SourceIndex {
            map,
            first_seen,
            row_count: dataset.row_count(),
            unindexable_rows,
        };
        debug!(
            "Indexed source '{}': {} key(s), {} duplicated",
            dataset.name(),
            index.key_count(),
            index.duplicate_key_count()
        );
        index
    }

    /// Returns the rows for the first candidate key present in the index.
    pub fn lookup(&self, candidate_keys: &[String]) -> Option<KeyMatch<'_>> {
        candidate_keys.iter().find_map(|candidate| {
            self.map
                .get_key_value(candidate.as_str())
                .filter(|(_, rows)| !rows.is_empty())
                .map(|(key, rows)| KeyMatch {
                    key: key.as_str(),
                    rows: rows.as_slice(),
                })
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn is_duplicate_key(&self, key: &str) -> bool {
        self.map.get(key).is_some_and(|rows| rows.len() > 1)
    }

    /// Keys held by more than one row, with their row counts.
    pub fn duplicate_keys(&self) -> BTreeMap<&str, usize> {
        self.map
            .iter()
            .filter(|(_, rows)| rows.len() > 1)
            .map(|(key, rows)| (key.as_str(), rows.len()))
            .collect()
    }

    pub fn duplicate_key_count(&self) -> usize {
        self.map.values().filter(|rows| rows.len() > 1).count()
    }

    /// Distinct identifiers in the order they first appear in the dataset.
    pub fn keys(&self) -> &[String] {
        &self.first_seen
    }

    pub fn key_count(&self) -> usize {
        self.map.len()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn unindexable_rows(&self) -> usize {
        self.unindexable_rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        identifier::{KeyPolicy, normalize_text},
        source::SourceSpec,
    };

    fn dataset(rows: &[Vec<&str>]) -> SourceDataset {
        SourceDataset::from_text_rows(SourceSpec::new("secondary", "GCPJ", 2), &["GCPJ", "TIPO"], rows)
            .unwrap()
    }

    #[test]
    fn build_groups_duplicates_in_dataset_order() {
        let data = dataset(&[
            vec!["16100", "a"],
            vec!["16100.0", "b"],
            vec!["", "c"],
            vec!["16200", "d"],
        ]);
        let index = SourceIndex::build(&data);
        assert_eq!(index.key_count(), 2);
        assert_eq!(index.unindexable_rows(), 1);
        assert!(index.is_duplicate_key("16100"));
        assert!(!index.is_duplicate_key("16200"));
        assert!(!index.is_duplicate_key("99999"));
        assert_eq!(index.keys(), ["16100".to_string(), "16200".to_string()]);
        let matched = index.lookup(&["16100".to_string()]).unwrap();
        assert_eq!(matched.rows, &[0, 1]);
        assert_eq!(index.duplicate_keys().get("16100"), Some(&2));
    }

    #[test]
    fn lookup_prefers_canonical_over_alternate() {
        let data = dataset(&[vec!["16100", "alternate"], vec!["24100", "canonical"]]);
        let index = SourceIndex::build(&data);
        let policy = KeyPolicy::with_prefix_pairs(&[("24", "16")]);
        let keys = policy.alternate_keys(&normalize_text("24100").unwrap());
        let matched = index.lookup(&keys).unwrap();
        assert_eq!(matched.key, "24100");
        assert_eq!(matched.rows, &[1]);
    }

    #[test]
    fn lookup_falls_back_to_alternates_in_order() {
        let data = dataset(&[vec!["16100", "x"]]);
        let index = SourceIndex::build(&data);
        let matched = index
            .lookup(&["24100".to_string(), "22100".to_string(), "16100".to_string()])
            .unwrap();
        assert_eq!(matched.key, "16100");
        assert!(index.lookup(&["24101".to_string()]).is_none());
        assert!(index.lookup(&[]).is_none());
    }
}
