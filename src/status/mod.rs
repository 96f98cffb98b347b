// src/status/mod.rs

//! Installed-package state, owned by an external status database
//!
//! The engine reads a snapshot through [`StatusDatabase::list_installed`]
//! before planning and writes only after a plan has been fully computed.

use crate::error::Result;
use crate::package::PackageSpec;
use crate::resolver::ActionPlan;
use crate::version::SchemedVersion;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Why a package is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallReason {
    /// User explicitly requested this package
    #[default]
    Explicit,
    /// Installed automatically as a dependency of another package
    Dependency,
}

impl InstallReason {
    pub fn as_str(&self) -> &str {
        match self {
            InstallReason::Explicit => "explicit",
            InstallReason::Dependency => "dependency",
        }
    }
}

impl fmt::Display for InstallReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallReason {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "explicit" => Ok(InstallReason::Explicit),
            "dependency" => Ok(InstallReason::Dependency),
            _ => Err(format!("Invalid install reason: {s}")),
        }
    }
}

/// One installed package as recorded by the status database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledSpec {
    pub spec: PackageSpec,
    pub version: SchemedVersion,
    pub features: BTreeSet<String>,
    /// Packages this one depended on when it was installed
    pub dependencies: Vec<PackageSpec>,
    pub reason: InstallReason,
}

impl InstalledSpec {
    pub fn new(spec: PackageSpec, version: SchemedVersion) -> Self {
        Self {
            spec,
            version,
            features: BTreeSet::new(),
            dependencies: Vec::new(),
            reason: InstallReason::Explicit,
        }
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features.extend(features.into_iter().map(Into::into));
        self
    }

    pub fn with_dependencies(
        mut self,
        dependencies: impl IntoIterator<Item = PackageSpec>,
    ) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    pub fn as_dependency(mut self) -> Self {
        self.reason = InstallReason::Dependency;
        self
    }
}

/// Status database collaborator
pub trait StatusDatabase {
    /// Snapshot of everything currently installed
    fn list_installed(&self) -> Result<Vec<InstalledSpec>>;

    fn record_install(&mut self, installed: &InstalledSpec) -> Result<()>;

    fn record_remove(&mut self, spec: &PackageSpec) -> Result<()>;
}

/// In-memory status database
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusDb {
    installed: BTreeMap<PackageSpec, InstalledSpec>,
    writes: usize,
}

impl MemoryStatusDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with already-installed packages; not counted as writes
    pub fn with_installed(installed: impl IntoIterator<Item = InstalledSpec>) -> Self {
        Self {
            installed: installed
                .into_iter()
                .map(|i| (i.spec.clone(), i))
                .collect(),
            writes: 0,
        }
    }

    pub fn get(&self, spec: &PackageSpec) -> Option<&InstalledSpec> {
        self.installed.get(spec)
    }

    pub fn contains(&self, spec: &PackageSpec) -> bool {
        self.installed.contains_key(spec)
    }

    /// Number of record_install/record_remove calls made
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl StatusDatabase for MemoryStatusDb {
    fn list_installed(&self) -> Result<Vec<InstalledSpec>> {
        Ok(self.installed.values().cloned().collect())
    }

    fn record_install(&mut self, installed: &InstalledSpec) -> Result<()> {
        self.writes += 1;
        self.installed
            .insert(installed.spec.clone(), installed.clone());
        Ok(())
    }

    fn record_remove(&mut self, spec: &PackageSpec) -> Result<()> {
        self.writes += 1;
        self.installed.remove(spec);
        Ok(())
    }
}

/// Record every install and upgrade of a completed plan
///
/// Called once the external executor has built the plan. Upgrades replace
/// the old record; already-present entries are only rewritten when their
/// install reason changed.
pub fn record_plan_installs(db: &mut dyn StatusDatabase, plan: &ActionPlan) -> Result<usize> {
    let mut records = plan.reason_updates(&db.list_installed()?);
    for record in &records {
        debug!("Marking {} as {}", record.spec, record.reason);
    }
    records.extend(plan.install_records());

    for record in &records {
        debug!("Recording install of {} {}", record.spec, record.version);
        db.record_install(record)?;
    }
    Ok(records.len())
}
