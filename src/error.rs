// src/error.rs

//! Error types for resolution, planning and removal
//!
//! Every failure is discovered during the pure computation phase and halts the
//! current run. Nothing here is transient, so nothing is retried.

use thiserror::Error;

use crate::version::VersionScheme;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the resolution engine
#[derive(Error, Debug)]
pub enum Error {
    /// Version text does not match the grammar of its scheme
    #[error("Failed to parse '{text}' as a {scheme} version: {reason}")]
    ParseError {
        text: String,
        scheme: VersionScheme,
        reason: String,
    },

    /// Two versions of different schemes were compared or aggregated
    #[error(
        "Version scheme mismatch{}: expected {expected}, found {found} ({})",
        port_suffix(.port),
        .sources.join(", ")
    )]
    SchemeMismatch {
        port: Option<String>,
        expected: VersionScheme,
        found: VersionScheme,
        sources: Vec<String>,
    },

    /// Two different string-scheme versions have no defined order
    #[error("Versions '{left}' and '{right}' cannot be ordered under the {scheme} scheme")]
    IncomparableVersions {
        scheme: VersionScheme,
        left: String,
        right: String,
    },

    /// Constraints on one port cannot all be satisfied
    #[error(
        "Unsatisfiable version constraints for {port}: {reason}\n{}",
        format_constraints(.constraints)
    )]
    UnsatisfiableConstraint {
        port: String,
        reason: String,
        /// (requirer, constraint) pairs that contributed
        constraints: Vec<(String, String)>,
    },

    /// A dependency cycle was found
    #[error("Circular dependency: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// A removal target is still needed by installed packages
    #[error("Cannot remove {package}: required by {}", .dependents.join(", "))]
    BlockingDependents {
        package: String,
        dependents: Vec<String>,
    },

    /// The resolved graph violates an invariant the builder guarantees
    #[error("Internal consistency check failed: {0}")]
    InternalConsistency(String),

    /// No manifest exists for a port
    #[error("Port '{port}' not found")]
    PortNotFound { port: String },

    /// A feature was requested that the port does not declare
    #[error("Port '{port}' has no feature '{feature}'")]
    UnknownFeature { port: String, feature: String },

    /// The port's supports expression excludes the triplet
    #[error("{spec} is not supported (supports: {expression})")]
    UnsupportedPlatform { spec: String, expression: String },

    /// A reachable port has no constraint, baseline or known version
    #[error("No version available for port '{port}'")]
    NoVersionAvailable { port: String },

    /// Malformed package spec text such as `zlib[core]:x64-linux`
    #[error("Invalid package spec '{text}': {reason}")]
    InvalidPackageSpec { text: String, reason: String },

    /// Malformed platform expression
    #[error("Invalid platform expression '{expression}': {reason}")]
    InvalidPlatformExpression { expression: String, reason: String },

    /// Manifest or baseline document is structurally invalid
    #[error("Manifest error: {0}")]
    ManifestError(String),

    /// JSON decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure reported by the status database collaborator
    #[error("Status database error: {0}")]
    StatusDatabase(String),

    /// The run was cancelled at a checkpoint
    #[error("Resolution cancelled")]
    Cancelled,
}

fn port_suffix(port: &Option<String>) -> String {
    match port {
        Some(port) => format!(" for {port}"),
        None => String::new(),
    }
}

fn format_constraints(constraints: &[(String, String)]) -> String {
    constraints
        .iter()
        .map(|(requirer, constraint)| format!("  - {requirer} requires {constraint}"))
        .collect::<Vec<_>>()
        .join("\n")
}
