//! Key-match diagnostics: how a scope of identifiers lands in one source.
//!
//! Used to tune the transformation table from data. Every scope identifier is
//! credited to the canonical key, the first rule whose rewrite exists in the
//! source, or the unmatched bucket.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    identifier::{CanonicalKey, KeyPolicy},
    index::SourceIndex,
};

const SAMPLE_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleMatches {
    pub rule: String,
    pub matches: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyMatchReport {
    pub source: String,
    pub scope: usize,
    pub canonical_matches: usize,
    pub rule_matches: Vec<RuleMatches>,
    pub unmatched: usize,
    /// Leading two characters of unmatched keys.
    pub unmatched_prefixes: BTreeMap<String, usize>,
    pub unmatched_lengths: BTreeMap<usize, usize>,
    pub unmatched_sample: Vec<String>,
}

impl KeyMatchReport {
    pub fn matched(&self) -> usize {
        self.canonical_matches + self.rule_matches.iter().map(|r| r.matches).sum::<usize>()
    }
}

pub fn analyze(
    source: &str,
    scope: &[CanonicalKey],
    index: &SourceIndex,
    policy: &KeyPolicy,
) -> KeyMatchReport {
    let mut report = KeyMatchReport {
        source: source.to_string(),
        scope: scope.len(),
        canonical_matches: 0,
        rule_matches: policy
            .rules()
            .iter()
            .map(|rule| RuleMatches {
                rule: rule.label(),
                matches: 0,
            })
            .collect(),
        unmatched: 0,
        unmatched_prefixes: BTreeMap::new(),
        unmatched_lengths: BTreeMap::new(),
        unmatched_sample: Vec::new(),
    };

    for key in scope {
        if index.contains(key.as_str()) {
            report.canonical_matches += 1;
            continue;
        }
        let credited = policy
            .rules()
            .iter()
            .position(|rule| rule.apply(key.as_str()).is_some_and(|alt| index.contains(&alt)));
        match credited {
            Some(idx) => report.rule_matches[idx].matches += 1,
            None => {
                report.unmatched += 1;
                let prefix: String = key.as_str().chars().take(2).collect();
                *report.unmatched_prefixes.entry(prefix).or_default() += 1;
                *report
                    .unmatched_lengths
                    .entry(key.as_str().chars().count())
                    .or_default() += 1;
                if report.unmatched_sample.len() < SAMPLE_LIMIT {
                    report.unmatched_sample.push(key.to_string());
                }
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        identifier::{TransformationRule, normalize_text},
        source::{SourceDataset, SourceSpec},
    };

    #[test]
    fn credits_canonical_then_first_matching_rule() {
        let dataset = SourceDataset::from_text_rows(
            SourceSpec::new("secondary", "GCPJ", 2),
            &["GCPJ"],
            &[vec!["24100"], vec!["16200"], vec!["22300"]],
        )
        .unwrap();
        let index = SourceIndex::build(&dataset);
        let policy = KeyPolicy::new(vec![
            TransformationRule::ReplacePrefix {
                from: "24".to_string(),
                to: "16".to_string(),
            },
            TransformationRule::ReplacePrefix {
                from: "24".to_string(),
                to: "22".to_string(),
            },
        ]);
        let scope: Vec<CanonicalKey> = ["24100", "24200", "24300", "24400", "999"]
            .iter()
            .map(|k| normalize_text(k).unwrap())
            .collect();
        let report = analyze("secondary", &scope, &index, &policy);
        assert_eq!(report.canonical_matches, 1);
        assert_eq!(report.rule_matches[0].matches, 1);
        assert_eq!(report.rule_matches[1].matches, 1);
        assert_eq!(report.unmatched, 2);
        assert_eq!(report.matched(), 3);
        assert_eq!(report.unmatched_prefixes.get("24"), Some(&1));
        assert_eq!(report.unmatched_lengths.get(&3), Some(&1));
        assert_eq!(report.unmatched_sample, vec!["24400", "999"]);
    }
}
