use gcpj_migrate::{
    completeness::{CompletenessOptions, FillBand, summarize},
    engine::{ColumnStatus, DestinationSchema, MigrationPlan, Scope, resolve_all},
    identifier::KeyPolicy,
    registry::SourceRegistry,
    resolver::MissReason,
    rules::{MappingRule, RuleSet},
    source::{SourceDataset, SourceSpec},
};

/// Ten identifiers; NOME always present, UF present for the first six,
/// COMARCA only from an unavailable source.
fn output() -> gcpj_migrate::engine::RunOutput {
    let rows: Vec<Vec<String>> = (0..10)
        .map(|i| {
            vec![
                format!("{}", 24000 + i),
                format!("Parte {i}"),
                if i < 6 { "SP".to_string() } else { String::new() },
            ]
        })
        .collect();
    let mut registry = SourceRegistry::new();
    registry
        .register(
            SourceDataset::from_text_rows(
                SourceSpec::new("base", "GCPJ", 1),
                &["GCPJ", "NOME", "UF"],
                &rows,
            )
            .unwrap(),
        )
        .unwrap();
    registry.register_unavailable("juridico", "missing").unwrap();
    let schema = DestinationSchema::new(["NOME", "UF", "COMARCA", "EMPRESA", "OBS"]).unwrap();
    let rules = RuleSet::new()
        .with("NOME", MappingRule::direct("base", "NOME"))
        .unwrap()
        .with("UF", MappingRule::direct("base", "UF"))
        .unwrap()
        .with("COMARCA", MappingRule::direct("juridico", "COMARCA"))
        .unwrap()
        .with("EMPRESA", MappingRule::constant("BANCO"))
        .unwrap();
    let plan = MigrationPlan::new(schema, rules, &registry).unwrap();
    resolve_all(&plan, &Scope::PrimarySource, &registry, &KeyPolicy::default())
}

#[test]
fn column_statuses_and_rates() {
    let summary = summarize(&output().provenance, &CompletenessOptions::default());
    assert_eq!(summary.identifiers, 10);
    let uf = summary.column("UF").unwrap();
    assert_eq!(uf.fill_rate, 0.6);
    assert_eq!(uf.misses_by_reason.get(&MissReason::ValueNullInSource), Some(&4));
    assert_eq!(summary.column("EMPRESA").unwrap().status, ColumnStatus::Constant);
    assert_eq!(summary.column("OBS").unwrap().status, ColumnStatus::Unmapped);
    assert_eq!(
        summary.misses_by_source["juridico"].get(&MissReason::SourceUnavailable),
        Some(&10)
    );
}

#[test]
fn records_use_mapped_and_constant_columns_by_default() {
    let summary = summarize(&output().provenance, &CompletenessOptions::default());
    let full = summary.record("24000").unwrap();
    assert_eq!((full.filled, full.considered), (3, 4));
    assert_eq!(full.missing_columns, vec!["COMARCA"]);
    let sparse = summary.record("24009").unwrap();
    assert_eq!((sparse.filled, sparse.considered), (2, 4));
    assert_eq!(summary.complete_records, 0);
    assert_eq!(summary.partial_records, 10);
}

#[test]
fn worst_lists_respect_top_n_and_tie_break() {
    let options = CompletenessOptions {
        top_n: 3,
        ..CompletenessOptions::default()
    };
    let summary = summarize(&output().provenance, &options);
    let names: Vec<&str> = summary.worst_records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["24006", "24007", "24008"]);
    let columns: Vec<&str> = summary.worst_columns.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(columns, vec!["COMARCA", "UF", "EMPRESA"]);
}

#[test]
fn custom_bands_are_applied() {
    let options = CompletenessOptions {
        bands: vec![FillBand::new("half or better", 0.5), FillBand::new("rest", 0.0)],
        ..CompletenessOptions::default()
    };
    let summary = summarize(&output().provenance, &options);
    assert_eq!(summary.bands[0].records, 10);
    assert_eq!(summary.bands[1].records, 0);
}
