// src/lib.rs

//! Portplan dependency resolution engine
//!
//! Computes ordered install, upgrade and remove plans for port-based
//! package trees: given requested ports, their manifests, a version baseline
//! and a target triplet, it produces the action sequence that brings an
//! installation to a consistent state.
//!
//! # Architecture
//!
//! - Pure core: resolution and planning do no I/O and never touch the status
//!   database; collaborators are traits passed in by the caller
//! - Schemed versions: semver, date, string and relaxed orderings that are
//!   never compared across schemes
//! - Minimum-version selection: one version per (port, triplet), no
//!   backtracking
//! - Arena graph: nodes keyed by (port, triplet) with monotonic feature growth
//! - Write phase last: status database updates happen only after a complete
//!   plan exists

pub mod config;
mod error;
pub mod manifest;
pub mod package;
pub mod registry;
pub mod remove;
pub mod resolver;
pub mod status;
pub mod version;

pub use config::{ConfigError, ResolverConfig, parse_config_file, parse_config_str};
pub use error::{Error, Result};
pub use manifest::{
    ConstraintKind, Dependency, FeatureParagraph, ManifestCatalog, ManifestProvider,
    PlatformExpr, PortManifest, VersionConstraint,
};
pub use package::{FullPackageSpec, PackageSpec, Triplet};
pub use registry::{InMemoryRegistry, VersionRegistry};
pub use remove::{RemoveOptions, RemovePlanExecutor, remove_packages};
pub use resolver::{
    ActionPlan, CancellationToken, ConstraintSet, ExecutorStep, PlanAction, PlanComputer,
    PlanSummary, PlannedNode, Resolver,
};
pub use status::{
    InstallReason, InstalledSpec, MemoryStatusDb, StatusDatabase, record_plan_installs,
};
pub use version::{SchemedVersion, Version, VersionScheme, compare, parse};
