use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Reconcile GCPJ case records across sources into a destination schema",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve the destination table and write table, provenance and summary files
    Resolve(ResolveArgs),
    /// Print completeness diagnostics for a run file without writing the table
    Diagnose(DiagnoseArgs),
    /// Show how scope identifiers match each source's keys
    Keys(KeysArgs),
}

#[derive(Debug, Args)]
pub struct CompletenessArgs {
    /// Count unmapped columns in the per-record denominator
    #[arg(long = "include-unmapped")]
    pub include_unmapped: bool,
    /// Leave constant columns out of the per-record denominator
    #[arg(long = "exclude-constants")]
    pub exclude_constants: bool,
    /// Length of the worst-column and worst-record rankings
    #[arg(long)]
    pub top: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// YAML run file describing destination, sources and rules
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,
    /// Output CSV for the resolved table (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output CSV for per-cell provenance
    #[arg(short = 'p', long = "provenance")]
    pub provenance: Option<PathBuf>,
    /// Output JSON file for the completeness summary
    #[arg(short = 's', long = "summary")]
    pub summary: Option<PathBuf>,
    /// Output CSV of records ordered by fill rate, with priority and per-source row counts
    #[arg(short = 'r', long = "records")]
    pub records: Option<PathBuf>,
    /// Directory for identifier lists (not found per source, no source data)
    #[arg(long = "missing-lists")]
    pub missing_lists: Option<PathBuf>,
    /// Delimiter for the CSV outputs
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    #[command(flatten)]
    pub completeness: CompletenessArgs,
}

#[derive(Debug, Args)]
pub struct DiagnoseArgs {
    /// YAML run file describing destination, sources and rules
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,
    /// Also list every record with its missing columns
    #[arg(long)]
    pub records: bool,
    /// Print the summary as JSON instead of tables
    #[arg(long)]
    pub json: bool,
    #[command(flatten)]
    pub completeness: CompletenessArgs,
}

#[derive(Debug, Args)]
pub struct KeysArgs {
    /// YAML run file describing sources, identifier rules and scope
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,
    /// Restrict the report to these sources (defaults to every available source)
    #[arg(long = "source", action = clap::ArgAction::Append)]
    pub sources: Vec<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_aliases() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("semicolon"), Ok(b';'));
        assert_eq!(parse_delimiter("#"), Ok(b'#'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter(";;").is_err());
    }

    #[test]
    fn resolve_arguments_parse() {
        let cli = Cli::try_parse_from([
            "gcpj-migrate",
            "resolve",
            "-c",
            "run.yaml",
            "-o",
            "out.csv",
            "--include-unmapped",
            "--top",
            "5",
        ])
        .unwrap();
        match cli.command {
            Commands::Resolve(args) => {
                assert!(args.completeness.include_unmapped);
                assert_eq!(args.completeness.top, Some(5));
                assert!(args.provenance.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
