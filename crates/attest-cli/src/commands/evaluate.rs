//! Contract evaluation command
//!
//! Loads a contract file, runs the compliance orchestrator against the
//! selected policies, and persists reports in the requested formats.

use anyhow::{Context, Result, bail};
use attest_core::engine::ExecutionMode;
use attest_core::models::{load_contract, validate_contract};
use attest_core::orchestrator::{ComplianceOrchestrator, EvaluationOptions};
use attest_core::reports::{ReportFormat, build_report, save_reports};
use clap::Args;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Args)]
pub struct EvaluateArgs {
    /// Path to the contract JSON file
    #[arg(short, long)]
    contract: PathBuf,

    /// Policy category selector (e.g. eu_ai_act, international/eu_ai_act)
    #[arg(long, conflicts_with = "folder")]
    category: Option<String>,

    /// Direct policy folder, absolute or relative to the library root
    #[arg(long)]
    folder: Option<PathBuf>,

    /// Engine execution mode
    #[arg(long, default_value = "production")]
    mode: ExecutionMode,

    /// Report formats to write (comma separated: json, markdown)
    #[arg(long, default_value = "json", value_delimiter = ',')]
    format: Vec<ReportFormat>,

    /// Directory for report files; reports are skipped when omitted
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Custom policy parameters as key=value pairs
    #[arg(long = "param", value_parser = parse_key_value)]
    params: Vec<(String, Value)>,

    /// Per-policy engine deadline in seconds
    #[arg(long, default_value_t = 60)]
    timeout_seconds: u64,

    /// Maximum concurrent engine invocations
    #[arg(long)]
    workers: Option<usize>,
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub async fn run(library_root: &Path, args: EvaluateArgs) -> Result<()> {
    let contract = load_contract(&args.contract)
        .with_context(|| format!("failed to load contract {}", args.contract.display()))?;
    if !validate_contract(&contract) {
        bail!("contract {} failed validation", args.contract.display());
    }

    let orchestrator = ComplianceOrchestrator::from_library_root(library_root)
        .context("failed to initialize the compliance orchestrator")?;

    let mut options = EvaluationOptions {
        mode: args.mode,
        deadline: Duration::from_secs(args.timeout_seconds),
        ..EvaluationOptions::default()
    };
    if let Some(workers) = args.workers {
        options.worker_count = workers;
    }
    for (key, value) in args.params {
        options.custom_params.insert(key, value);
    }

    let outcome = match (&args.category, &args.folder) {
        (Some(category), None) => {
            orchestrator
                .evaluate_by_category(&contract, category, &options)
                .await?
        }
        (None, Some(folder)) => {
            orchestrator
                .evaluate_by_folder(&contract, folder, &options)
                .await?
        }
        _ => bail!("exactly one of --category or --folder is required"),
    };

    info!(
        "Evaluated {} policies for '{}': {}",
        outcome.policy_results.len(),
        outcome.application_name,
        if outcome.overall_passed {
            "COMPLIANT"
        } else {
            "NON-COMPLIANT"
        }
    );
    for result in &outcome.policy_results {
        info!(
            "  {} -> {}",
            result.policy_name,
            if result.result { "pass" } else { "fail" }
        );
    }

    if let Some(output_dir) = &args.output_dir {
        let report = build_report(&outcome, &contract);
        let written = save_reports(&report, &args.format, output_dir, "report")?;
        for path in written {
            println!("{}", path.display());
        }
    } else {
        warn!("No output directory given; skipping report files");
        println!(
            "{}",
            serde_json::to_string_pretty(&build_report(&outcome, &contract))?
        );
    }

    Ok(())
}
