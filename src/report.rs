//! Plain-text reports for the terminal.

use std::fmt::Write as _;

use itertools::Itertools;

use crate::{
    completeness::{CompletenessSummary, Ranked},
    engine::RunDiagnostics,
    keys::KeyMatchReport,
    presence::PresenceReport,
    registry::SourceDiagnostics,
    resolver::MissReason,
    table::{Align, headers, percent, render_table},
};

pub fn render_sources(sources: &[SourceDiagnostics]) -> String {
    let rows = sources
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                if s.available { "yes" } else { "no" }.to_string(),
                s.rows.to_string(),
                s.distinct_identifiers.to_string(),
                s.unindexable_rows.to_string(),
                s.duplicate_identifiers.to_string(),
                s.unavailable_reason.clone().unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(
        &headers(&[
            "source",
            "available",
            "rows",
            "identifiers",
            "unindexable",
            "duplicated",
            "reason",
        ]),
        &rows,
        &[
            Align::Left,
            Align::Left,
            Align::Right,
            Align::Right,
            Align::Right,
            Align::Right,
            Align::Left,
        ],
    )
}

pub fn render_overview(summary: &CompletenessSummary, run: &RunDiagnostics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Identifiers: {}", summary.identifiers);
    if run.unparsable_scope_entries > 0 || run.duplicate_scope_entries > 0 {
        let _ = writeln!(
            out,
            "Scope entries dropped: {} unparsable, {} repeated",
            run.unparsable_scope_entries, run.duplicate_scope_entries
        );
    }
    if !run.unavailable_sources.is_empty() {
        let _ = writeln!(
            out,
            "Unavailable sources: {}",
            run.unavailable_sources.join(", ")
        );
    }
    let _ = writeln!(
        out,
        "Average record fill: {}",
        percent(summary.average_record_fill_rate)
    );
    let _ = writeln!(
        out,
        "Records: {} complete, {} partial, {} empty",
        summary.complete_records, summary.partial_records, summary.empty_records
    );
    out
}

/// Per-column fill with the miss breakdown spelled out per reason.
pub fn render_columns(summary: &CompletenessSummary) -> String {
    let mut names = vec!["column", "status", "filled", "missed", "fill"];
    names.extend(MissReason::ALL.iter().map(|r| r.as_str()));
    let rows = summary
        .columns
        .iter()
        .map(|c| {
            let mut row = vec![
                c.column.clone(),
                c.status.as_str().to_string(),
                c.filled.to_string(),
                c.missed.to_string(),
                percent(c.fill_rate),
            ];
            row.extend(
                MissReason::ALL
                    .iter()
                    .map(|r| c.misses_by_reason.get(r).copied().unwrap_or_default().to_string()),
            );
            row
        })
        .collect::<Vec<_>>();
    let mut aligns = vec![Align::Left, Align::Left];
    aligns.resize(names.len(), Align::Right);
    render_table(&headers(&names), &rows, &aligns)
}

pub fn render_bands(summary: &CompletenessSummary) -> String {
    let rows = summary
        .bands
        .iter()
        .map(|b| vec![b.label.clone(), b.records.to_string(), b.columns.to_string()])
        .collect::<Vec<_>>();
    render_table(
        &headers(&["band", "records", "columns"]),
        &rows,
        &[Align::Left, Align::Right, Align::Right],
    )
}

pub fn render_worst(summary: &CompletenessSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Worst columns:");
    out.push_str(&ranked_table("column", &summary.worst_columns));
    let _ = writeln!(out, "Worst records:");
    let records = summary
        .worst_records
        .iter()
        .map(|r| {
            let missing = summary
                .record(&r.name)
                .map(|record| record.missing_columns.iter().join(", "))
                .unwrap_or_default();
            vec![r.name.clone(), percent(r.fill_rate), missing]
        })
        .collect::<Vec<_>>();
    out.push_str(&render_table(
        &headers(&["identifier", "fill", "missing"]),
        &records,
        &[Align::Left, Align::Right, Align::Left],
    ));
    out
}

fn ranked_table(label: &str, ranked: &[Ranked]) -> String {
    let rows = ranked
        .iter()
        .map(|r| vec![r.name.clone(), percent(r.fill_rate)])
        .collect::<Vec<_>>();
    render_table(&headers(&[label, "fill"]), &rows, &[Align::Left, Align::Right])
}

pub fn render_problem_sources(summary: &CompletenessSummary) -> String {
    let rows = summary
        .misses_by_source
        .iter()
        .flat_map(|(source, reasons)| {
            reasons
                .iter()
                .map(move |(reason, count)| vec![source.clone(), reason.to_string(), count.to_string()])
        })
        .collect::<Vec<_>>();
    render_table(
        &headers(&["source", "reason", "misses"]),
        &rows,
        &[Align::Left, Align::Left, Align::Right],
    )
}

/// How many scope identifiers each available source holds.
pub fn render_presence(presence: &PresenceReport) -> String {
    let total = presence.records.len();
    let rows = presence
        .sources
        .iter()
        .map(|source| {
            let absent = presence.not_found.get(source).map_or(0, Vec::len);
            let duplicated = presence.duplicated.get(source).map_or(0, Vec::len);
            vec![
                source.clone(),
                (total - absent).to_string(),
                absent.to_string(),
                duplicated.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    let mut out = render_table(
        &headers(&["source", "present", "not found", "duplicated"]),
        &rows,
        &[Align::Left, Align::Right, Align::Right, Align::Right],
    );
    let _ = writeln!(out, "Without source data: {}", presence.no_data.len());
    out
}

pub fn render_key_report(report: &KeyMatchReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Source '{}': {} of {} identifier(s) matched",
        report.source,
        report.matched(),
        report.scope
    );
    let mut rows = vec![vec![
        "canonical".to_string(),
        report.canonical_matches.to_string(),
    ]];
    rows.extend(
        report
            .rule_matches
            .iter()
            .map(|r| vec![r.rule.clone(), r.matches.to_string()]),
    );
    rows.push(vec!["unmatched".to_string(), report.unmatched.to_string()]);
    out.push_str(&render_table(
        &headers(&["key", "identifiers"]),
        &rows,
        &[Align::Left, Align::Right],
    ));
    if report.unmatched > 0 {
        let prefixes = report
            .unmatched_prefixes
            .iter()
            .sorted_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)))
            .map(|(prefix, count)| vec![prefix.clone(), count.to_string()])
            .collect::<Vec<_>>();
        out.push_str(&render_table(
            &headers(&["unmatched prefix", "identifiers"]),
            &prefixes,
            &[Align::Left, Align::Right],
        ));
        let lengths = report
            .unmatched_lengths
            .iter()
            .map(|(len, count)| vec![len.to_string(), count.to_string()])
            .collect::<Vec<_>>();
        out.push_str(&render_table(
            &headers(&["unmatched length", "identifiers"]),
            &lengths,
            &[Align::Right, Align::Right],
        ));
        let _ = writeln!(out, "Sample: {}", report.unmatched_sample.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{keys::RuleMatches, presence::RecordPresence};

    #[test]
    fn presence_counts_per_source() {
        let presence = PresenceReport {
            sources: vec!["P".to_string(), "S".to_string()],
            unavailable_sources: Vec::new(),
            records: ["1", "2", "3"]
                .iter()
                .map(|id| RecordPresence {
                    identifier: id.to_string(),
                    rows_by_source: BTreeMap::new(),
                    has_source_data: true,
                })
                .collect(),
            not_found: BTreeMap::from([
                ("P".to_string(), Vec::new()),
                ("S".to_string(), vec!["2".to_string(), "3".to_string()]),
            ]),
            duplicated: BTreeMap::from([("P".to_string(), vec!["1".to_string()])]),
            no_data: vec!["3".to_string()],
        };
        let rendered = render_presence(&presence);
        let s_row = rendered
            .lines()
            .find(|line| line.starts_with('S'))
            .expect("row for S");
        let cells: Vec<&str> = s_row.split_whitespace().collect();
        assert_eq!(cells, vec!["S", "1", "2", "0"]);
        assert!(rendered.ends_with("Without source data: 1\n"));
    }

    #[test]
    fn key_report_lists_rules_and_unmatched_prefixes() {
        let report = KeyMatchReport {
            source: "juridico".to_string(),
            scope: 4,
            canonical_matches: 2,
            rule_matches: vec![RuleMatches {
                rule: "prefix 24 -> 16".to_string(),
                matches: 1,
            }],
            unmatched: 1,
            unmatched_prefixes: BTreeMap::from([("13".to_string(), 1)]),
            unmatched_lengths: BTreeMap::from([(5, 1)]),
            unmatched_sample: vec!["13100".to_string()],
        };
        let rendered = render_key_report(&report);
        assert!(rendered.starts_with("Source 'juridico': 3 of 4 identifier(s) matched"));
        assert!(rendered.contains("prefix 24 -> 16"));
        assert!(rendered.contains("Sample: 13100"));
    }
}
