//! Policy dependency resolution and query construction
//!
//! Policies reference each other through `import data.<package>` statements.
//! When a policy is handed to the decision engine, every file in its import
//! closure must be supplied alongside it so cross-file references resolve.

use super::library::{Policy, PolicyLibrary};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*import\s+data\.([A-Za-z0-9_.]+)(?:\s+as\s+[A-Za-z0-9_]+)?")
        .expect("valid import regex")
});
static COMMON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^common\.([A-Za-z0-9_]+)\.(v[0-9]+)$").expect("valid common module regex")
});

/// Computes the transitive closure of policy files needed to evaluate the
/// given starting policies
///
/// Imported packages are resolved through the library's package index;
/// common-module imports (`data.common.<name>.v<N>`) additionally try the
/// conventional `global/v<N>/common/<name>.rego` location. Unknown imports
/// are logged and skipped; the decision engine surfaces the error if the
/// missing rule is actually needed.
#[must_use]
pub fn resolve_dependencies(library: &PolicyLibrary, policies: &[&Policy]) -> Vec<PathBuf> {
    let mut resolved: BTreeSet<PathBuf> = policies.iter().map(|p| p.path.clone()).collect();
    let mut pending: Vec<String> = policies.iter().map(|p| p.source.clone()).collect();

    while let Some(source) = pending.pop() {
        for capture in IMPORT_RE.captures_iter(&source) {
            let package = &capture[1];
            if let Some(dependency) = library.policy_by_package(package) {
                if resolved.insert(dependency.path.clone()) {
                    debug!("Resolved import {package} -> {}", dependency.path.display());
                    pending.push(dependency.source.clone());
                }
                continue;
            }

            if let Some(common_path) = common_module_fallback(library.root(), package) {
                if resolved.insert(common_path.clone()) {
                    debug!(
                        "Resolved common module {package} -> {}",
                        common_path.display()
                    );
                    if let Ok(source) = std::fs::read_to_string(&common_path) {
                        pending.push(source);
                    }
                }
                continue;
            }

            warn!("Could not resolve import for package: {package}");
        }
    }

    if resolved.len() > policies.len() {
        info!(
            "Resolved {} dependency files beyond the {} starting policies",
            resolved.len() - policies.len(),
            policies.len()
        );
    }
    resolved.into_iter().collect()
}

fn common_module_fallback(root: &Path, package: &str) -> Option<PathBuf> {
    let captures = COMMON_RE.captures(package)?;
    let name = &captures[1];
    let version = &captures[2];
    let candidate = root
        .join("global")
        .join(version)
        .join("common")
        .join(format!("{name}.rego"));
    candidate.exists().then_some(candidate)
}

/// Derives the decision query for a policy file
///
/// The query targets the policy's `compliance_report` rule:
/// `data.<package>.compliance_report`. When the package cannot be
/// determined, a path-derived query (library-relative path with the version
/// segment removed) is used instead.
#[must_use]
pub fn query_for_policy(library: &PolicyLibrary, policy: &Policy) -> String {
    if !policy.package.is_empty() {
        return format!("data.{}.compliance_report", policy.package);
    }

    // path-derived fallback: strip the version segment and extension
    if let Ok(relative) = policy.path.strip_prefix(library.root()) {
        let parts: Vec<String> = relative
            .with_extension("")
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .filter(|part| {
                !(part.starts_with('v') && part[1..].bytes().all(|b| b.is_ascii_digit()))
            })
            .collect();
        if !parts.is_empty() {
            return format!("data.{}.compliance_report", parts.join("."));
        }
    }

    "data.compliance_report".to_string()
}
