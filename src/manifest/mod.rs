// src/manifest/mod.rs

//! Port manifests and the manifest source collaborator
//!
//! A [`PortManifest`] declares a port's scheme and version, its core
//! dependencies, optional features with their own dependencies, the default
//! feature set and an optional `supports` expression. The resolver reads
//! manifests through [`ManifestProvider`]; [`ManifestCatalog`] is the
//! in-memory implementation, loadable from vcpkg.json-shaped documents.

mod json;
mod platform;

pub use platform::{PlatformContext, PlatformExpr};

use crate::error::{Error, Result};
use crate::package::{CORE_FEATURE, Triplet};
use crate::version::{SchemedVersion, VersionScheme};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// How a dependency constrains the version of its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintKind {
    /// Chosen version must be >= the constraint
    Minimum,
    /// Chosen version must equal the constraint
    Exact,
}

/// Version constraint carried on a dependency edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionConstraint {
    pub version: SchemedVersion,
    pub kind: ConstraintKind,
}

impl VersionConstraint {
    pub fn minimum(version: SchemedVersion) -> Self {
        Self {
            version,
            kind: ConstraintKind::Minimum,
        }
    }

    pub fn exact(version: SchemedVersion) -> Self {
        Self {
            version,
            kind: ConstraintKind::Exact,
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConstraintKind::Minimum => write!(f, ">= {}", self.version),
            ConstraintKind::Exact => write!(f, "== {}", self.version),
        }
    }
}

/// One dependency declared by a manifest or feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    /// Features required of the target, beyond `core`
    pub features: Vec<String>,
    /// Whether the target's default features are wanted
    pub default_features: bool,
    /// Resolve against the host triplet instead of the declaring triplet
    pub host: bool,
    /// Edge only applies where this evaluates true
    pub platform: Option<PlatformExpr>,
    pub constraint: Option<VersionConstraint>,
}

impl Dependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
            default_features: true,
            host: false,
            platform: None,
            constraint: None,
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

    pub fn without_defaults(mut self) -> Self {
        self.default_features = false;
        self
    }

    pub fn host(mut self) -> Self {
        self.host = true;
        self
    }

    pub fn on_platform(mut self, platform: PlatformExpr) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn at_least(mut self, version: SchemedVersion) -> Self {
        self.constraint = Some(VersionConstraint::minimum(version));
        self
    }

    pub fn exactly(mut self, version: SchemedVersion) -> Self {
        self.constraint = Some(VersionConstraint::exact(version));
        self
    }

    /// Whether this edge is active when building for `ctx`
    pub fn applies_to(&self, ctx: &PlatformContext<'_>) -> bool {
        self.platform.as_ref().is_none_or(|p| p.evaluate(ctx))
    }
}

/// An optional feature and the dependencies it pulls in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureParagraph {
    pub description: String,
    pub dependencies: Vec<Dependency>,
}

/// Parsed port manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortManifest {
    pub name: String,
    pub version: SchemedVersion,
    pub default_features: Vec<String>,
    /// Dependencies of the `core` feature
    pub dependencies: Vec<Dependency>,
    pub features: BTreeMap<String, FeatureParagraph>,
    pub supports: Option<PlatformExpr>,
}

impl PortManifest {
    pub fn new(name: impl Into<String>, version: SchemedVersion) -> Self {
        Self {
            name: name.into(),
            version,
            default_features: Vec::new(),
            dependencies: Vec::new(),
            features: BTreeMap::new(),
            supports: None,
        }
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_feature(mut self, name: impl Into<String>, paragraph: FeatureParagraph) -> Self {
        self.features.insert(name.into(), paragraph);
        self
    }

    pub fn with_default_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_features
            .extend(features.into_iter().map(Into::into));
        self
    }

    pub fn with_supports(mut self, supports: PlatformExpr) -> Self {
        self.supports = Some(supports);
        self
    }

    /// The port's declared scheme
    pub fn scheme(&self) -> VersionScheme {
        self.version.scheme
    }

    /// Whether `feature` names `core` or a declared feature
    pub fn has_feature(&self, feature: &str) -> bool {
        feature == CORE_FEATURE || self.features.contains_key(feature)
    }

    /// Dependencies activated by one feature; `core` yields the core list
    pub fn feature_dependencies(&self, feature: &str) -> Result<&[Dependency]> {
        if feature == CORE_FEATURE {
            return Ok(&self.dependencies);
        }
        self.features
            .get(feature)
            .map(|p| p.dependencies.as_slice())
            .ok_or_else(|| Error::UnknownFeature {
                port: self.name.clone(),
                feature: feature.to_string(),
            })
    }
}

/// Source of port manifests
///
/// Implementations are read-only during a resolution run and may be shared
/// across parallel runs.
pub trait ManifestProvider: Send + Sync {
    /// Load the manifest of `port` as seen from `triplet`
    ///
    /// Returns [`Error::PortNotFound`] when the port does not exist.
    fn load(&self, port: &str, triplet: &Triplet) -> Result<PortManifest>;
}

/// In-memory manifest source keyed by port name
#[derive(Debug, Clone, Default)]
pub struct ManifestCatalog {
    manifests: HashMap<String, PortManifest>,
}

impl ManifestCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a manifest
    pub fn insert(&mut self, manifest: PortManifest) {
        self.manifests.insert(manifest.name.clone(), manifest);
    }

    pub fn with(mut self, manifest: PortManifest) -> Self {
        self.insert(manifest);
        self
    }

    pub fn get(&self, port: &str) -> Option<&PortManifest> {
        self.manifests.get(port)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortManifest> {
        self.manifests.values()
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}

impl ManifestProvider for ManifestCatalog {
    fn load(&self, port: &str, _triplet: &Triplet) -> Result<PortManifest> {
        self.manifests
            .get(port)
            .cloned()
            .ok_or_else(|| Error::PortNotFound {
                port: port.to_string(),
            })
    }
}
