//! Policy library for Attest
//!
//! This module manages the versioned, hierarchical library of Rego policies.
//! Policies live in a directory tree laid out as
//! `category/[subcategory/]v<N>/<group>/<name>.rego`, declare the metrics
//! and parameters they require in structured header comments, and may import
//! other policies by package.
//!
//! # Example
//!
//! ```rust,no_run
//! use attest_core::policy::PolicyLibrary;
//!
//! let library = PolicyLibrary::open("policies").unwrap();
//! let policies = library.policies_by_category("eu_ai_act");
//! for policy in policies {
//!     println!("{} ({})", policy.package, policy.path.display());
//! }
//! ```

mod dependency;
mod library;
mod metadata;

pub use dependency::{query_for_policy, resolve_dependencies};
pub use library::{Category, Policy, PolicyLibrary};
pub use metadata::{PolicyMetadata, parse_metadata, parse_metadata_file, required_metrics, required_params};

/// Policy library errors
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The library root directory does not exist
    #[error("Policy library not found at {path}")]
    LibraryNotFound {
        /// Path that was probed
        path: String,
    },

    /// The library root exists but cannot serve as a policy tree
    #[error("Policy library malformed: {message}")]
    LibraryMalformed {
        /// What went wrong
        message: String,
    },

    /// No policies exist for the requested category/subcategory/version
    #[error("No policies for category '{category}', subcategory '{subcategory}', version '{version}'")]
    BucketNotFound {
        /// Requested category
        category: String,
        /// Requested subcategory (empty for direct policies)
        subcategory: String,
        /// Requested or resolved version
        version: String,
    },

    /// A policy file could not be read
    #[error("Policy file unreadable: {path}: {source}")]
    PolicyUnreadable {
        /// Path of the unreadable file
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Policy library result type
pub type PolicyLibResult<T> = Result<T, PolicyError>;
