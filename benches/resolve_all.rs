use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use encoding_rs::UTF_8;
use gcpj_migrate::{
    completeness::{CompletenessOptions, summarize},
    engine::{DestinationSchema, MigrationPlan, Scope, resolve_all},
    identifier::KeyPolicy,
    registry::SourceRegistry,
    rules::{MappingRule, RuleSet},
    source::{SourceDataset, SourceSpec},
};
use tempfile::TempDir;

fn generate_sources(rows: usize) -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let primary_path = temp_dir.path().join("base.csv");
    let secondary_path = temp_dir.path().join("juridico.csv");

    let mut primary = File::create(&primary_path).expect("create base");
    writeln!(primary, "GCPJ,NOME,UF").expect("header");
    let mut secondary = File::create(&secondary_path).expect("create juridico");
    writeln!(secondary, "CODIGO,COMARCA,UF").expect("header");
    for i in 0..rows {
        let uf = if i % 4 == 0 { "" } else { "SP" };
        writeln!(primary, "{}.0,Parte {i},{uf}", 24_000_000 + i).expect("row");
        // Every third case is recorded under the 16 prefix, with some duplicates.
        if i % 3 == 0 {
            writeln!(secondary, "{},Comarca {},RJ", 16_000_000 + i, i % 50).expect("row");
            if i % 9 == 0 {
                writeln!(secondary, "{},,MG", 16_000_000 + i).expect("row");
            }
        }
    }
    (temp_dir, primary_path, secondary_path)
}

fn registry(primary: &Path, secondary: &Path) -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    registry
        .register(
            SourceDataset::from_csv(primary, SourceSpec::new("base", "GCPJ", 1), b',', UTF_8)
                .expect("load base"),
        )
        .expect("register base");
    registry
        .register(
            SourceDataset::from_csv(
                secondary,
                SourceSpec::new("juridico", "CODIGO", 2),
                b',',
                UTF_8,
            )
            .expect("load juridico"),
        )
        .expect("register juridico");
    registry
}

fn plan(registry: &SourceRegistry) -> MigrationPlan {
    let schema = DestinationSchema::new(["NOME", "UF", "COMARCA", "EMPRESA", "OBS"]).expect("schema");
    let rules = RuleSet::new()
        .with("NOME", MappingRule::direct("base", "NOME"))
        .and_then(|r| r.with("UF", MappingRule::fallback([("juridico", "UF"), ("base", "UF")])))
        .and_then(|r| r.with("COMARCA", MappingRule::direct("juridico", "COMARCA")))
        .and_then(|r| r.with("EMPRESA", MappingRule::constant("BANCO")))
        .expect("rules");
    MigrationPlan::new(schema, rules, registry).expect("plan")
}

fn bench_resolve_all(c: &mut Criterion) {
    let (temp_dir, primary, secondary) = generate_sources(20_000);
    let registry = registry(&primary, &secondary);
    let plan = plan(&registry);
    let policy = KeyPolicy::with_prefix_pairs(&[("24", "16"), ("22", "16")]);

    let mut group = c.benchmark_group("resolve");

    group.bench_function("resolve_all_primary_scope", |b| {
        b.iter_batched(
            || (),
            |_| resolve_all(&plan, &Scope::PrimarySource, &registry, &policy),
            BatchSize::SmallInput,
        );
    });

    let output = resolve_all(&plan, &Scope::PrimarySource, &registry, &policy);
    group.bench_function("summarize", |b| {
        b.iter(|| summarize(&output.provenance, &CompletenessOptions::default()));
    });

    drop(temp_dir);
    group.finish();
}

criterion_group!(benches, bench_resolve_all);
criterion_main!(benches);
