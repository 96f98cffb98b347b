// src/registry/mod.rs

//! Baseline and registry version source
//!
//! The baseline pins a default version per port. When a reachable port has
//! neither a constraint nor a baseline entry, the registry's latest known
//! version is used instead.

use crate::error::{Error, Result};
use crate::manifest::ManifestCatalog;
use crate::version::{SchemedVersion, Version};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Source of baseline pins and latest known versions
pub trait VersionRegistry: Send + Sync {
    /// The baseline pin for `port`, if any
    fn baseline(&self, port: &str) -> Result<Option<SchemedVersion>>;

    /// The newest version the registry knows for `port`, if any
    fn latest(&self, port: &str) -> Result<Option<SchemedVersion>>;
}

#[derive(Debug, Deserialize)]
struct BaselineFile {
    default: BTreeMap<String, BaselineEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct BaselineEntry {
    baseline: String,
    #[serde(default)]
    port_version: u32,
}

/// Registry backed by in-memory maps
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    baseline: HashMap<String, SchemedVersion>,
    latest: HashMap<String, SchemedVersion>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest versions taken from the catalog's manifests, no baseline
    pub fn from_catalog(catalog: &ManifestCatalog) -> Self {
        let latest = catalog
            .iter()
            .map(|m| (m.name.clone(), m.version.clone()))
            .collect();
        Self {
            baseline: HashMap::new(),
            latest,
        }
    }

    /// Catalog versions plus a baseline document
    ///
    /// Baseline text is parsed under the scheme the catalog declares for
    /// each port. Entries for ports missing from the catalog are skipped.
    pub fn from_baseline_json(text: &str, catalog: &ManifestCatalog) -> Result<Self> {
        let file: BaselineFile = serde_json::from_str(text)?;
        let mut registry = Self::from_catalog(catalog);

        for (port, entry) in file.default {
            let Some(manifest) = catalog.get(&port) else {
                warn!("Baseline entry for unknown port '{}' ignored", port);
                continue;
            };
            let version = Version::with_port_version(
                &entry.baseline,
                entry.port_version,
                manifest.scheme(),
            )
            .map_err(|e| match e {
                Error::ParseError { .. } => e,
                other => Error::ManifestError(format!("baseline entry '{port}': {other}")),
            })?;
            debug!("Baseline pin {} {}", port, version);
            registry
                .baseline
                .insert(port, SchemedVersion::new(manifest.scheme(), version));
        }

        Ok(registry)
    }

    pub fn set_baseline(&mut self, port: impl Into<String>, version: SchemedVersion) {
        self.baseline.insert(port.into(), version);
    }

    pub fn set_latest(&mut self, port: impl Into<String>, version: SchemedVersion) {
        self.latest.insert(port.into(), version);
    }

    pub fn with_baseline(mut self, port: impl Into<String>, version: SchemedVersion) -> Self {
        self.set_baseline(port, version);
        self
    }
}

impl VersionRegistry for InMemoryRegistry {
    fn baseline(&self, port: &str) -> Result<Option<SchemedVersion>> {
        Ok(self.baseline.get(port).cloned())
    }

    fn latest(&self, port: &str) -> Result<Option<SchemedVersion>> {
        Ok(self.latest.get(port).cloned())
    }
}
