pub mod cli;
pub mod completeness;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod formatting;
pub mod identifier;
pub mod index;
pub mod io_utils;
pub mod keys;
pub mod presence;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod rules;
pub mod source;
pub mod table;
pub mod value;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, Commands, CompletenessArgs},
    completeness::CompletenessOptions,
    config::RunConfig,
    engine::MigrationPlan,
    export::RunReport,
    registry::{SourceCatalog, SourceRegistry},
    table::{Align, headers, percent},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("gcpj_migrate", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Resolve(args) => handle_resolve(&args),
        Commands::Diagnose(args) => handle_diagnose(&args),
        Commands::Keys(args) => handle_keys(&args),
    }
}

fn prepare(path: &Path) -> Result<(RunConfig, SourceRegistry, MigrationPlan)> {
    let config = RunConfig::load(path)?;
    let registry = config
        .build_registry()
        .with_context(|| format!("Loading sources for {path:?}"))?;
    let plan = config
        .plan(&registry)
        .with_context(|| format!("Validating run file {path:?}"))?;
    debug!(
        "Plan: {} destination column(s), {} rule(s)",
        plan.schema().len(),
        plan.rules().len()
    );
    Ok((config, registry, plan))
}

fn completeness_options(config: &RunConfig, args: &CompletenessArgs) -> CompletenessOptions {
    let mut options = config.completeness.clone();
    if args.include_unmapped {
        options.include_unmapped_columns = true;
    }
    if args.exclude_constants {
        options.include_constant_columns = false;
    }
    if let Some(top) = args.top {
        options.top_n = top;
    }
    options
}

fn handle_resolve(args: &cli::ResolveArgs) -> Result<()> {
    info!("Resolving run file '{}'", args.config.display());
    let (config, registry, plan) = prepare(&args.config)?;
    let scope = config.scope()?;
    let output = engine::resolve_all(&plan, &scope, &registry, &config.identifier_rules);

    let delimiter = args
        .output_delimiter
        .unwrap_or(io_utils::DEFAULT_CSV_DELIMITER);
    debug!("Writing CSV outputs with delimiter '{}'", printable_delimiter(delimiter));
    export::write_table(
        args.output.as_deref(),
        &output,
        &config.formats,
        &config.identifier_header,
        delimiter,
    )?;
    if let Some(path) = &args.provenance {
        export::write_provenance(
            Some(path.as_path()),
            &output,
            &config.identifier_header,
            delimiter,
        )?;
    }

    let options = completeness_options(&config, &args.completeness);
    let summary = completeness::summarize(&output.provenance, &options);
    let presence = presence::analyze(&output.provenance, &registry, &config.identifier_rules);
    if let Some(path) = &args.summary {
        let report = RunReport::new(&output, registry.diagnostics(), &summary, &presence);
        export::write_summary(path, &report)?;
    }
    if let Some(path) = &args.records {
        export::write_record_report(
            path,
            &summary,
            &presence,
            &config.identifier_header,
            delimiter,
        )?;
    }
    if let Some(dir) = &args.missing_lists {
        let written = export::write_identifier_lists(dir, &presence, &config.identifier_header)?;
        debug!("Wrote {} identifier list(s) under {dir:?}", written.len());
    }
    info!(
        "Resolved {} identifier(s); average record fill {} ({} complete, {} partial, {} empty)",
        summary.identifiers,
        percent(summary.average_record_fill_rate),
        summary.complete_records,
        summary.partial_records,
        summary.empty_records
    );
    debug!("Run fingerprint {}", output.fingerprint());
    Ok(())
}

fn handle_diagnose(args: &cli::DiagnoseArgs) -> Result<()> {
    let (config, registry, plan) = prepare(&args.config)?;
    let scope = config.scope()?;
    let output = engine::resolve_all(&plan, &scope, &registry, &config.identifier_rules);
    let options = completeness_options(&config, &args.completeness);
    let summary = completeness::summarize(&output.provenance, &options);
    let presence = presence::analyze(&output.provenance, &registry, &config.identifier_rules);

    if args.json {
        let report = RunReport::new(&output, registry.diagnostics(), &summary, &presence);
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Serializing summary")?
        );
        return Ok(());
    }

    print!("{}", report::render_sources(&registry.diagnostics()));
    println!();
    print!("{}", report::render_overview(&summary, &output.diagnostics));
    println!();
    print!("{}", report::render_columns(&summary));
    println!();
    print!("{}", report::render_bands(&summary));
    println!();
    print!("{}", report::render_worst(&summary));
    if !summary.misses_by_source.is_empty() {
        println!();
        print!("{}", report::render_problem_sources(&summary));
    }
    if !presence.sources.is_empty() {
        println!();
        print!("{}", report::render_presence(&presence));
    }
    if args.records {
        println!();
        let rows = summary
            .records_by_fill_rate()
            .into_iter()
            .map(|r| {
                vec![
                    r.identifier.clone(),
                    format!("{}/{}", r.filled, r.considered),
                    percent(r.fill_rate),
                    r.priority.as_str().to_string(),
                    r.missing_columns.join(", "),
                ]
            })
            .collect::<Vec<_>>();
        table::print_table(
            &headers(&["identifier", "filled", "fill", "priority", "missing"]),
            &rows,
            &[Align::Left, Align::Right, Align::Right, Align::Left, Align::Left],
        );
    }
    Ok(())
}

fn handle_keys(args: &cli::KeysArgs) -> Result<()> {
    let config = RunConfig::load(&args.config)?;
    let registry = config
        .build_registry()
        .with_context(|| format!("Loading sources for {:?}", args.config))?;
    let (identifiers, _) = config.scope()?.identifiers(&registry);
    let names: Vec<String> = if args.sources.is_empty() {
        registry.names().map(str::to_string).collect()
    } else {
        for name in &args.sources {
            if !registry.is_registered(name) {
                bail!("Source '{name}' is not defined in {:?}", args.config);
            }
        }
        args.sources.clone()
    };
    info!(
        "Matching {} scope identifier(s) against {} source(s)",
        identifiers.len(),
        names.len()
    );
    let mut first = true;
    for name in &names {
        let Some(index) = registry.index(name) else {
            warn!("Skipping unavailable source '{name}'");
            continue;
        };
        if !first {
            println!();
        }
        first = false;
        let report = keys::analyze(name, &identifiers, index, &config.identifier_rules);
        print!("{}", report::render_key_report(&report));
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
