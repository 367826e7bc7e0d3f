//! Policy library indexing and lookup
//!
//! The library scans a policy tree once at open, building two indexes: a
//! bucket index keyed by `(category, subcategory, version)` and a package
//! index keyed by declared package name. Both are immutable after open
//! unless the library is explicitly reloaded.

use super::metadata::{PolicyMetadata, parse_metadata};
use super::{PolicyError, PolicyLibResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

static PACKAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*package\s+([A-Za-z0-9_.]+)").expect("valid package regex")
});

/// Version range the library is known to work with, checked against the
/// optional root VERSION file
const MIN_SUPPORTED_LIBRARY_VERSION: &str = "1.0.0";
const MAX_SUPPORTED_LIBRARY_MAJOR: u32 = 2;

/// Top-level policy category (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// Globally applicable policies
    Global,
    /// International regulation sets (EU AI Act, NIST, ...)
    International,
    /// Industry-specific policies (healthcare, finance, ...)
    IndustrySpecific,
    /// Operational policies (AIOps, scalability, ...)
    Operational,
    /// User-supplied policies
    Custom,
}

impl Category {
    /// All categories in index order
    pub const ALL: [Self; 5] = [
        Self::Global,
        Self::International,
        Self::IndustrySpecific,
        Self::Operational,
        Self::Custom,
    ];
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Global => write!(f, "global"),
            Self::International => write!(f, "international"),
            Self::IndustrySpecific => write!(f, "industry_specific"),
            Self::Operational => write!(f, "operational"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "international" => Ok(Self::International),
            "industry_specific" => Ok(Self::IndustrySpecific),
            "operational" => Ok(Self::Operational),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("Unknown policy category: {s}")),
        }
    }
}

/// A single loaded policy
#[derive(Debug, Clone)]
pub struct Policy {
    /// Absolute path of the policy file
    pub path: PathBuf,
    /// Declared package name (dotted identifier)
    pub package: String,
    /// Version segment, e.g. `v1`
    pub version: String,
    /// Category the policy belongs to
    pub category: Category,
    /// Subcategory when present (`eu_ai_act`, `healthcare`, ...)
    pub subcategory: Option<String>,
    /// Raw source text
    pub source: String,
    /// Metrics and parameters declared in the header comments
    pub metadata: PolicyMetadata,
}

impl Policy {
    /// File stem used as the policy's short name
    #[must_use]
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

type BucketKey = (Category, String, String);

/// Filesystem-indexed, versioned policy catalog
#[derive(Debug)]
pub struct PolicyLibrary {
    root: PathBuf,
    policies: Vec<Policy>,
    /// `(category, subcategory, version)` -> policy indices, in scan order
    buckets: BTreeMap<BucketKey, Vec<usize>>,
    /// package name -> policy index (injective; last writer wins on collision)
    package_index: BTreeMap<String, usize>,
    /// Human-readable library version from the root VERSION file
    library_version: Option<String>,
}

impl PolicyLibrary {
    /// Opens a policy library rooted at `root` and scans the whole tree
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::LibraryNotFound` if the root does not exist and
    /// `PolicyError::LibraryMalformed` if it is not a directory. Individual
    /// files that do not fit the layout are skipped with a warning.
    pub fn open<P: Into<PathBuf>>(root: P) -> PolicyLibResult<Self> {
        let root = root.into();
        if !root.exists() {
            return Err(PolicyError::LibraryNotFound {
                path: root.display().to_string(),
            });
        }
        if !root.is_dir() {
            return Err(PolicyError::LibraryMalformed {
                message: format!("{} is not a directory", root.display()),
            });
        }

        let library_version = read_library_version(&root);

        let mut library = Self {
            root,
            policies: Vec::new(),
            buckets: BTreeMap::new(),
            package_index: BTreeMap::new(),
            library_version,
        };
        library.scan()?;
        Ok(library)
    }

    /// Discards the indexes and rescans the tree
    ///
    /// # Errors
    ///
    /// Same failure modes as [`PolicyLibrary::open`].
    pub fn reload(&mut self) -> PolicyLibResult<()> {
        *self = Self::open(self.root.clone())?;
        Ok(())
    }

    fn scan(&mut self) -> PolicyLibResult<()> {
        let rego_files: Vec<PathBuf> = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rego"))
            .map(|e| e.path().to_path_buf())
            .collect();
        debug!(
            "Found {} .rego files under {}",
            rego_files.len(),
            self.root.display()
        );

        for path in rego_files {
            if path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with("_test.rego"))
            {
                debug!("Skipping test policy: {}", path.display());
                continue;
            }
            if let Err(e) = self.index_policy_file(&path) {
                warn!("Skipping policy file {}: {e}", path.display());
            }
        }

        info!(
            "Policy library open: {} policies in {} buckets, {} packages",
            self.policies.len(),
            self.buckets.len(),
            self.package_index.len()
        );
        for ((category, subcategory, version), indices) in &self.buckets {
            debug!(
                "Bucket {category}/{}/{version}: {} policies",
                if subcategory.is_empty() { "-" } else { subcategory },
                indices.len()
            );
        }
        Ok(())
    }

    fn index_policy_file(&mut self, path: &Path) -> PolicyLibResult<()> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            PolicyError::LibraryMalformed {
                message: format!("{} escapes the library root", path.display()),
            }
        })?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        let category: Category = parts
            .first()
            .and_then(|c| c.parse().ok())
            .ok_or_else(|| PolicyError::LibraryMalformed {
                message: format!("unrecognized category in path {}", relative.display()),
            })?;

        let version_index = parts
            .iter()
            .position(|part| is_version_segment(part))
            .ok_or_else(|| PolicyError::LibraryMalformed {
                message: format!("no version directory in path {}", relative.display()),
            })?;
        let version = parts[version_index].clone();

        // global policies sit directly under the category; everything else
        // carries a subcategory component before the version directory
        let subcategory = if category == Category::Global && version_index == 1 {
            None
        } else if version_index == 2 {
            Some(parts[1].clone())
        } else {
            return Err(PolicyError::LibraryMalformed {
                message: format!("unexpected path structure for {}", relative.display()),
            });
        };

        let source =
            std::fs::read_to_string(path).map_err(|source| PolicyError::PolicyUnreadable {
                path: path.display().to_string(),
                source,
            })?;
        let package = PACKAGE_RE
            .captures(&source)
            .map(|c| c[1].to_string())
            .ok_or_else(|| PolicyError::LibraryMalformed {
                message: format!("no package declaration in {}", path.display()),
            })?;

        let metadata = parse_metadata(&source);
        let policy = Policy {
            path: path.to_path_buf(),
            package: package.clone(),
            version: version.clone(),
            category,
            subcategory: subcategory.clone(),
            source,
            metadata,
        };

        let index = self.policies.len();
        self.policies.push(policy);
        self.buckets
            .entry((category, subcategory.unwrap_or_default(), version))
            .or_default()
            .push(index);

        if let Some(previous) = self.package_index.insert(package.clone(), index) {
            warn!(
                "Duplicate package declaration '{package}': {} replaces {}",
                path.display(),
                self.policies[previous].path.display()
            );
        }
        Ok(())
    }

    /// Library root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Human-readable version string from the root VERSION file, if present
    #[must_use]
    pub fn library_version(&self) -> Option<&str> {
        self.library_version.as_deref()
    }

    /// Total number of indexed policies
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// True when the library holds no policies
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Every `(category, subcategory)` pair present in the library
    #[must_use]
    pub fn categories(&self) -> Vec<(Category, Option<String>)> {
        let mut seen = Vec::new();
        for (category, subcategory, _) in self.buckets.keys() {
            let entry = (
                *category,
                if subcategory.is_empty() {
                    None
                } else {
                    Some(subcategory.clone())
                },
            );
            if !seen.contains(&entry) {
                seen.push(entry);
            }
        }
        seen
    }

    /// Latest version segment for a category/subcategory, by numeric suffix
    #[must_use]
    pub fn latest_version(&self, category: Category, subcategory: &str) -> Option<String> {
        self.buckets
            .keys()
            .filter(|(c, s, _)| *c == category && s == subcategory)
            .map(|(_, _, v)| v.clone())
            .max_by_key(|v| version_number(v))
    }

    /// Policies for a `(category, subcategory, version)` bucket
    ///
    /// When `version` is omitted, the latest version is used.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::BucketNotFound` when the bucket does not exist.
    pub fn get_policies(
        &self,
        category: Category,
        subcategory: &str,
        version: Option<&str>,
    ) -> PolicyLibResult<Vec<&Policy>> {
        let version = match version {
            Some(v) => v.to_string(),
            None => self
                .latest_version(category, subcategory)
                .ok_or_else(|| PolicyError::BucketNotFound {
                    category: category.to_string(),
                    subcategory: subcategory.to_string(),
                    version: "latest".to_string(),
                })?,
        };

        let key = (category, subcategory.to_string(), version.clone());
        let indices = self
            .buckets
            .get(&key)
            .ok_or_else(|| PolicyError::BucketNotFound {
                category: category.to_string(),
                subcategory: subcategory.to_string(),
                version,
            })?;

        debug!(
            "Found {} policies for {category}/{subcategory}/{}",
            indices.len(),
            key.2
        );
        Ok(indices.iter().map(|&i| &self.policies[i]).collect())
    }

    /// Every non-test policy under a folder path
    ///
    /// The folder may be absolute or relative to the library root.
    #[must_use]
    pub fn policies_by_folder(&self, folder: &Path) -> Vec<&Policy> {
        let folder = if folder.is_absolute() {
            folder.to_path_buf()
        } else {
            self.root.join(folder)
        };
        self.policies
            .iter()
            .filter(|p| p.path.starts_with(&folder))
            .collect()
    }

    /// Loose category lookup
    ///
    /// Accepts a bare category, a bare subcategory, a
    /// `category/subcategory` fragment (with either path separator and an
    /// optional `compliance/` prefix), and well-known synonyms such as
    /// `eu_ai_act`. Returns an empty list on miss and logs the known
    /// buckets.
    #[must_use]
    pub fn policies_by_category(&self, selector: &str) -> Vec<&Policy> {
        let normalized = selector.replace('\\', "/").to_lowercase();
        info!("Resolving policy selector: {normalized}");

        // category/subcategory fragment
        if normalized.contains('/') {
            let mut parts: Vec<&str> = normalized.split('/').filter(|p| !p.is_empty()).collect();
            if parts.first() == Some(&"compliance") && parts.len() > 1 {
                parts.remove(0);
            }
            if parts.len() >= 2 {
                if let Ok(category) = parts[0].parse::<Category>() {
                    if let Ok(policies) = self.get_policies(category, parts[1], None) {
                        debug!("Resolved selector via direct path {}/{}", parts[0], parts[1]);
                        return policies;
                    }
                }
            }
        }

        // bare category: all subcategories at their latest versions
        if let Ok(category) = normalized.parse::<Category>() {
            let mut all = Vec::new();
            for (c, subcategory) in self.categories() {
                if c == category {
                    if let Ok(policies) =
                        self.get_policies(category, subcategory.as_deref().unwrap_or(""), None)
                    {
                        all.extend(policies);
                    }
                }
            }
            if !all.is_empty() {
                debug!("Resolved selector via category match {category}");
                return all;
            }
        }

        // bare subcategory across categories
        for (category, subcategory) in self.categories() {
            if subcategory.as_deref() == Some(normalized.as_str()) {
                if let Ok(policies) = self.get_policies(category, &normalized, None) {
                    debug!("Resolved selector via subcategory match {category}/{normalized}");
                    return policies;
                }
            }
        }

        // well-known synonyms
        if matches!(normalized.as_str(), "eu_ai_act" | "eu-ai-act" | "euaiact") {
            if let Ok(policies) = self.get_policies(Category::International, "eu_ai_act", None) {
                debug!("Resolved selector via EU AI Act synonym");
                return policies;
            }
        }

        // global fallback
        if normalized.contains("global") {
            if let Ok(policies) = self.get_policies(Category::Global, "", None) {
                debug!("Resolved selector via global fallback");
                return policies;
            }
        }

        let known: Vec<String> = self
            .categories()
            .iter()
            .map(|(c, s)| match s {
                Some(s) => format!("{c}/{s}"),
                None => c.to_string(),
            })
            .collect();
        warn!("No policies found for selector '{selector}'. Known buckets: {known:?}");
        Vec::new()
    }

    /// Looks up a policy by its declared package name
    #[must_use]
    pub fn policy_by_package(&self, package: &str) -> Option<&Policy> {
        self.package_index.get(package).map(|&i| &self.policies[i])
    }

    /// All indexed policies, in scan order
    #[must_use]
    pub fn all_policies(&self) -> &[Policy] {
        &self.policies
    }
}

fn is_version_segment(part: &str) -> bool {
    part.strip_prefix('v')
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

fn version_number(version: &str) -> u64 {
    version
        .strip_prefix('v')
        .and_then(|rest| rest.parse().ok())
        .unwrap_or(0)
}

fn read_library_version(root: &Path) -> Option<String> {
    let version_file = root.join("VERSION");
    if !version_file.exists() {
        return None;
    }
    match std::fs::read_to_string(&version_file) {
        Ok(content) => {
            let version = content.trim().to_string();
            info!("Policy library version: {version}");
            check_library_compatibility(&version);
            Some(version)
        }
        Err(e) => {
            warn!("Error reading library VERSION file: {e}");
            None
        }
    }
}

fn check_library_compatibility(version: &str) {
    if version < MIN_SUPPORTED_LIBRARY_VERSION {
        warn!(
            "Policy library version {version} is older than minimum supported \
             {MIN_SUPPORTED_LIBRARY_VERSION}"
        );
        return;
    }
    let major: Option<u32> = version.split('.').next().and_then(|m| m.parse().ok());
    if major.is_some_and(|m| m > MAX_SUPPORTED_LIBRARY_MAJOR) {
        warn!("Policy library version {version} may not be compatible with this release");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_policy(root: &Path, relative: &str, package: &str, extra: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            format!("{extra}package {package}\n\ndefault allow := false\n"),
        )
        .unwrap();
    }

    fn sample_library() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write_policy(
            root,
            "international/eu_ai_act/v1/transparency/transparency.rego",
            "international.eu_ai_act.v1.transparency",
            "# RequiredMetrics:\n#   - model_card.completeness\n",
        );
        write_policy(
            root,
            "international/eu_ai_act/v1/fairness/fairness.rego",
            "international.eu_ai_act.v1.fairness",
            "# RequiredMetrics:\n#   - fairness.score\n",
        );
        write_policy(
            root,
            "international/eu_ai_act/v2/transparency/transparency.rego",
            "international.eu_ai_act.v2.transparency",
            "",
        );
        write_policy(
            root,
            "global/v1/accountability/accountability.rego",
            "global.v1.accountability",
            "",
        );
        write_policy(
            root,
            "global/v1/common/fairness.rego",
            "common.fairness.v1",
            "",
        );
        write_policy(
            root,
            "industry_specific/healthcare/v1/patient_safety/patient_safety.rego",
            "industry_specific.healthcare.v1.patient_safety",
            "",
        );
        dir
    }

    #[test]
    fn test_open_missing_root() {
        let result = PolicyLibrary::open("/nonexistent/policies");
        assert!(matches!(result, Err(PolicyError::LibraryNotFound { .. })));
    }

    #[test]
    fn test_scan_builds_both_indexes() {
        let dir = sample_library();
        let library = PolicyLibrary::open(dir.path()).unwrap();

        assert_eq!(library.len(), 6);
        assert!(
            library
                .policy_by_package("international.eu_ai_act.v1.transparency")
                .is_some()
        );
        assert!(library.policy_by_package("common.fairness.v1").is_some());

        let categories = library.categories();
        assert!(categories.contains(&(Category::Global, None)));
        assert!(categories.contains(&(Category::International, Some("eu_ai_act".to_string()))));
    }

    #[test]
    fn test_scan_skips_test_files_and_unknown_layouts() {
        let dir = sample_library();
        let root = dir.path();
        write_policy(
            root,
            "international/eu_ai_act/v1/fairness/fairness_test.rego",
            "international.eu_ai_act.v1.fairness_test",
            "",
        );
        write_policy(root, "legacy/old_policy.rego", "legacy.old", "");
        fs::write(root.join("README.md"), "docs").unwrap();

        let library = PolicyLibrary::open(root).unwrap();
        assert_eq!(library.len(), 6);
    }

    #[test]
    fn test_latest_version_picks_greatest_numeric_suffix() {
        let dir = sample_library();
        let library = PolicyLibrary::open(dir.path()).unwrap();
        assert_eq!(
            library.latest_version(Category::International, "eu_ai_act"),
            Some("v2".to_string())
        );
        assert_eq!(
            library.latest_version(Category::Global, ""),
            Some("v1".to_string())
        );
    }

    #[test]
    fn test_get_policies_defaults_to_latest() {
        let dir = sample_library();
        let library = PolicyLibrary::open(dir.path()).unwrap();

        let latest = library
            .get_policies(Category::International, "eu_ai_act", None)
            .unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].version, "v2");

        let v1 = library
            .get_policies(Category::International, "eu_ai_act", Some("v1"))
            .unwrap();
        assert_eq!(v1.len(), 2);

        let missing = library.get_policies(Category::Operational, "aiops", None);
        assert!(matches!(missing, Err(PolicyError::BucketNotFound { .. })));
    }

    #[test]
    fn test_loose_category_lookup_variants() {
        let dir = sample_library();
        let library = PolicyLibrary::open(dir.path()).unwrap();

        let direct = library.policies_by_category("international/eu_ai_act");
        let backslash = library.policies_by_category("international\\eu_ai_act");
        let prefixed = library.policies_by_category("compliance/international/eu_ai_act");
        let synonym = library.policies_by_category("eu_ai_act");

        assert!(!direct.is_empty());
        assert_eq!(direct.len(), backslash.len());
        assert_eq!(direct.len(), prefixed.len());
        assert_eq!(direct.len(), synonym.len());

        assert!(library.policies_by_category("unknown_regulation").is_empty());
        assert!(!library.policies_by_category("healthcare").is_empty());
        assert!(!library.policies_by_category("global").is_empty());
    }

    #[test]
    fn test_policies_by_folder_filters_by_prefix() {
        let dir = sample_library();
        let library = PolicyLibrary::open(dir.path()).unwrap();

        let relative = library.policies_by_folder(Path::new("international/eu_ai_act"));
        assert_eq!(relative.len(), 3);

        let absolute =
            library.policies_by_folder(&dir.path().join("international/eu_ai_act/v1"));
        assert_eq!(absolute.len(), 2);
    }

    #[test]
    fn test_reopen_yields_identical_indexes() {
        let dir = sample_library();
        let first = PolicyLibrary::open(dir.path()).unwrap();
        let second = PolicyLibrary::open(dir.path()).unwrap();

        let first_packages: Vec<&String> = first.package_index.keys().collect();
        let second_packages: Vec<&String> = second.package_index.keys().collect();
        assert_eq!(first_packages, second_packages);
        assert_eq!(first.buckets.keys().count(), second.buckets.keys().count());
    }

    #[test]
    fn test_duplicate_package_last_writer_wins() {
        let dir = sample_library();
        let root = dir.path();
        write_policy(
            root,
            "custom/duplicates/v1/a/first.rego",
            "custom.duplicates.v1.shared",
            "",
        );
        write_policy(
            root,
            "custom/duplicates/v1/b/second.rego",
            "custom.duplicates.v1.shared",
            "",
        );

        let library = PolicyLibrary::open(root).unwrap();
        let resolved = library.policy_by_package("custom.duplicates.v1.shared").unwrap();
        // walkdir sorts by file name, so b/second.rego is indexed last
        assert!(resolved.path.ends_with("b/second.rego"));
    }

    #[test]
    fn test_version_file_is_read() {
        let dir = sample_library();
        fs::write(dir.path().join("VERSION"), "1.2.0\n").unwrap();
        let library = PolicyLibrary::open(dir.path()).unwrap();
        assert_eq!(library.library_version(), Some("1.2.0"));
    }

    #[test]
    fn test_metadata_parsed_during_scan() {
        let dir = sample_library();
        let library = PolicyLibrary::open(dir.path()).unwrap();
        let policy = library
            .policy_by_package("international.eu_ai_act.v1.transparency")
            .unwrap();
        assert_eq!(
            policy.metadata.required_metrics,
            vec!["model_card.completeness"]
        );
    }
}
