//! Policy library inspection commands

use anyhow::{Context, Result};
use attest_core::policy::{PolicyLibrary, required_metrics, required_params};
use clap::{Args, Subcommand};
use std::path::Path;

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// List categories, subcategories, and policy counts
    List,
    /// Show the metrics and parameters a selector requires
    Requirements(RequirementsArgs),
}

#[derive(Args)]
pub struct RequirementsArgs {
    /// Policy category selector (e.g. eu_ai_act)
    #[arg(short, long)]
    category: String,
}

pub fn run(library_root: &Path, command: PolicyCommands) -> Result<()> {
    let library = PolicyLibrary::open(library_root)
        .with_context(|| format!("failed to open policy library {}", library_root.display()))?;

    match command {
        PolicyCommands::List => {
            if let Some(version) = library.library_version() {
                println!("Library version: {version}");
            }
            println!("Policies: {}", library.len());
            for (category, subcategory) in library.categories() {
                let label = match &subcategory {
                    Some(subcategory) => format!("{category}/{subcategory}"),
                    None => category.to_string(),
                };
                let latest = library
                    .latest_version(category, subcategory.as_deref().unwrap_or(""))
                    .unwrap_or_default();
                let count = library
                    .get_policies(category, subcategory.as_deref().unwrap_or(""), None)
                    .map(|p| p.len())
                    .unwrap_or(0);
                println!("  {label} (latest {latest}, {count} policies)");
            }
        }
        PolicyCommands::Requirements(args) => {
            let policies = library.policies_by_category(&args.category);
            if policies.is_empty() {
                println!("No policies matched '{}'", args.category);
                return Ok(());
            }
            println!("Policies: {}", policies.len());
            println!("Required metrics:");
            for metric in required_metrics(&policies) {
                println!("  - {metric}");
            }
            println!("Required params:");
            for (name, value) in required_params(&policies) {
                println!("  - {name} (default {value})");
            }
        }
    }
    Ok(())
}
