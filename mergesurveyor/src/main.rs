//! Merge inspection tool.
//!
//! This binary joins two JSON datasets and reports the diagnostics a plain
//! join would hide: duplicated and null join keys, the share of matched keys
//! and exact duplicate rows in the output.
//!
//! # Guarantees
//! - Input files are only read, never rewritten
//! - The report is always printed, even when the merge is rejected
//! - Logs go to stderr; stdout carries only the JSON report

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use mergesurveyor_core::{
    Dataset, ErrorFlag, ErrorThresholds, JoinConfig, JoinKind, MergeConfig, MergeInspectError,
    MergeInspector, MergeReport, ThresholdMetric, init_logging,
};
use tracing::{error, info};

/// Exit status for a merge rejected by a raise-set flag.
const DIAGNOSTIC_FAILURE: u8 = 2;

/// Exit status for invalid invocations and usage errors.
const USAGE_ERROR: u8 = 1;

/// Command-line interface for merge inspection
#[derive(Parser)]
#[command(name = "mergesurveyor")]
#[command(about = "Join diagnostics for JSON datasets")]
#[command(version)]
#[command(long_about = "
mergesurveyor - inspect a join before trusting its result

Joins two datasets (JSON arrays of objects) and reports:
- Duplicated and null join keys on each side
- Matched and unmatched unique key values
- Exact duplicate rows in the joined output

Thresholds turn metrics into error flags; flags listed with --raise-on
reject the merge (exit status 2) while still printing the full report.

EXAMPLES:
  mergesurveyor inspect --left customers.json --right orders.json --on loyalty_code
  mergesurveyor inspect --left a.json --right b.json --how left \\
      --threshold rows_duplicated:1 --raise-on rows_duplicated_error
  mergesurveyor inspect --left a.json --right b.json --config merge.json --output joined.json
")]
pub struct Cli {
    /// Logging options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Join two datasets and report diagnostics
    Inspect(InspectArgs),
    /// List recognized threshold and error flag names
    ListFlags,
}

/// Options of the inspect command
#[derive(Args)]
pub struct InspectArgs {
    /// Left dataset
    #[arg(long, help = "Left dataset (JSON array of objects)")]
    pub left: PathBuf,

    /// Right dataset
    #[arg(long, help = "Right dataset (JSON array of objects)")]
    pub right: PathBuf,

    /// Join kind
    #[arg(long, help = "Join kind: inner, left, right, outer or cross [default: inner]")]
    pub how: Option<JoinKind>,

    /// Shared key columns
    #[arg(long, value_delimiter = ',', help = "Key columns present on both sides")]
    pub on: Vec<String>,

    /// Left key columns
    #[arg(long, value_delimiter = ',', help = "Key columns of the left dataset")]
    pub left_on: Vec<String>,

    /// Right key columns
    #[arg(long, value_delimiter = ',', help = "Key columns of the right dataset")]
    pub right_on: Vec<String>,

    /// Threshold overrides (format: name:value)
    #[arg(
        long,
        value_delimiter = ',',
        help = "Error thresholds in percent (duplicated_keys:0,null_keys:0,percentage_matched_keys:90,rows_duplicated:1)"
    )]
    pub threshold: Vec<String>,

    /// Flags that reject the merge
    #[arg(
        long,
        value_delimiter = ',',
        help = "Error flags that reject the merge (see list-flags)"
    )]
    pub raise_on: Vec<String>,

    /// Configuration document
    #[arg(
        long,
        env = "MERGESURVEYOR_CONFIG",
        help = "JSON merge configuration; command-line options override it"
    )]
    pub config: Option<PathBuf>,

    /// Joined output path
    #[arg(short, long, help = "Write the joined dataset to this file")]
    pub output: Option<PathBuf>,

    /// Report output path
    #[arg(long, help = "Also write the report to this file")]
    pub report: Option<PathBuf>,

    /// Unmatched key samples output path
    #[arg(long, help = "Write up to three unmatched keys per side to this file")]
    pub unmatched: Option<PathBuf>,
}

/// Verbosity options shared by every command
#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(
        short,
        long,
        global = true,
        help = "Suppress all log output except errors"
    )]
    pub quiet: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let usage = e.use_stderr();
            // help and version output are not errors
            if e.print().is_err() || usage {
                return ExitCode::from(USAGE_ERROR);
            }
            return ExitCode::SUCCESS;
        }
    };

    if let Err(e) = init_logging(cli.global.verbose, cli.global.quiet) {
        eprintln!("Error: {}", e);
        return ExitCode::from(USAGE_ERROR);
    }

    let result = match &cli.command {
        Command::Inspect(args) => inspect(args),
        Command::ListFlags => {
            list_flags();
            Ok(ExitCode::SUCCESS)
        }
    };

    result.unwrap_or_else(|e| {
        eprintln!("Error: {:#}", e);
        ExitCode::from(USAGE_ERROR)
    })
}

/// Runs one inspection and prints its report.
fn inspect(args: &InspectArgs) -> Result<ExitCode> {
    let config = build_config(args)?;
    let left = load_dataset(&args.left)?;
    let right = load_dataset(&args.right)?;

    info!(
        "Inspecting {} ({} rows) against {} ({} rows)",
        args.left.display(),
        left.row_count(),
        args.right.display(),
        right.row_count()
    );

    let mut inspector = MergeInspector::new(&left, &right, config)?;

    match inspector.perform_merge() {
        Ok(joined) => {
            let report = inspector.get_report()?;
            emit_report(report, args.report.as_deref())?;
            emit_unmatched(&inspector, args.unmatched.as_deref())?;
            if let Some(path) = &args.output {
                write_json(path, &joined.to_json_rows())?;
                info!("Joined dataset written to {}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(MergeInspectError::Diagnostic(failure)) => {
            emit_report(&failure.report, args.report.as_deref())?;
            emit_unmatched(&inspector, args.unmatched.as_deref())?;
            error!(
                "Merge rejected: {}",
                failure
                    .triggered
                    .iter()
                    .map(ErrorFlag::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            Ok(ExitCode::from(DIAGNOSTIC_FAILURE))
        }
        Err(e) => Err(e.into()),
    }
}

/// Combines the configuration document with command-line overrides.
fn build_config(args: &InspectArgs) -> Result<MergeConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            MergeConfig::from_json_str(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => MergeConfig::default(),
    };

    if let Some(how) = args.how {
        config.join.how = how;
    }
    config.join = apply_key_options(config.join, args)?;

    if !args.threshold.is_empty() {
        config.error_thresholds = parse_thresholds(&args.threshold)?;
    }
    for name in &args.raise_on {
        let flag: ErrorFlag = name.parse()?;
        config.raise_on_errors.insert(flag);
    }

    Ok(config)
}

/// Applies `--on` / `--left-on` / `--right-on`, replacing any keys from the
/// configuration document.
fn apply_key_options(join: JoinConfig, args: &InspectArgs) -> Result<JoinConfig> {
    let has_on = !args.on.is_empty();
    let has_pair = !args.left_on.is_empty() || !args.right_on.is_empty();

    if has_on && has_pair {
        bail!("use either --on or --left-on/--right-on, not both");
    }

    let mut join = join;
    if has_on {
        join.on = Some(args.on.clone());
        join.left_on = None;
        join.right_on = None;
    } else if has_pair {
        join.on = None;
        join.left_on = Some(args.left_on.clone());
        join.right_on = Some(args.right_on.clone());
    }
    Ok(join)
}

/// Parses `name:value` threshold pairs.
///
/// Only the named thresholds are enabled, the same as a thresholds mapping
/// in a configuration document.
fn parse_thresholds(thresholds: &[String]) -> Result<ErrorThresholds> {
    let mut pairs = Vec::with_capacity(thresholds.len());
    for threshold in thresholds {
        let Some((metric, value)) = threshold.split_once(':') else {
            bail!("invalid threshold '{}' (expected name:value)", threshold);
        };
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("invalid value for threshold {}: {}", metric, value))?;
        pairs.push((metric.trim(), value));
    }
    Ok(ErrorThresholds::from_pairs(pairs)?)
}

fn load_dataset(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;
    Dataset::from_json_str(&text).with_context(|| format!("Invalid dataset {}", path.display()))
}

fn emit_report(report: &MergeReport, path: Option<&Path>) -> Result<()> {
    let json = report.to_json_pretty()?;
    println!("{}", json);
    if let Some(path) = path {
        std::fs::write(path, &json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }
    Ok(())
}

fn emit_unmatched(inspector: &MergeInspector<'_>, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let cases = inspector.unmatched_key_cases()?;
    let json =
        serde_json::to_string_pretty(cases).context("Failed to serialize unmatched key samples")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Unmatched key samples written to {}", path.display());
    Ok(())
}

fn write_json(path: &Path, rows: &[serde_json::Value]) -> Result<()> {
    let json = serde_json::to_string_pretty(rows).context("Failed to serialize joined dataset")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Lists recognized threshold names, error flags and join kinds.
fn list_flags() {
    println!("Thresholds (percent, 0-100):");
    for metric in ThresholdMetric::ALL {
        let bound = if metric.is_lower_bound() {
            "flags when below"
        } else {
            "flags when above"
        };
        println!("  {:<24} {}", metric.as_str(), bound);
    }
    println!();

    println!("Error flags (--raise-on):");
    for flag in ErrorFlag::ALL {
        println!("  {}", flag.as_str());
    }
    println!();

    println!("Join kinds (--how):");
    for kind in JoinKind::ALL {
        println!("  {}", kind.as_str());
    }
}
