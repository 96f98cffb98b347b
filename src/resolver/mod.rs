// src/resolver/mod.rs

//! Dependency resolution and action planning
//!
//! A run goes through three pure stages over immutable inputs:
//!
//! 1. [`GraphBuilder`] expands the requested specs and their features into a
//!    [`DependencyGraph`] keyed by (port, triplet).
//! 2. One [`ConstraintSet`] per node chooses its version, giving a
//!    [`ResolvedGraph`].
//! 3. [`PlanComputer`] orders the graph and diffs it against the installed
//!    snapshot, producing an [`ActionPlan`].
//!
//! Nothing is written anywhere; recording the result is the caller's write
//! phase (see [`crate::status::record_plan_installs`]).

pub mod constraint;
pub mod graph;
pub mod plan;

pub use constraint::ConstraintSet;
pub use graph::{DependencyGraph, GraphBuilder, GraphNode, NodeId, ResolvedGraph, ResolvedNode};
pub use plan::{ActionPlan, ExecutorStep, PlanAction, PlanComputer, PlanSummary, PlannedNode};

use crate::error::{Error, Result};
use crate::manifest::ManifestProvider;
use crate::package::{FullPackageSpec, Triplet};
use crate::registry::VersionRegistry;
use crate::status::{InstalledSpec, StatusDatabase};
use crate::version::SchemedVersion;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Cooperative cancellation flag shared between a caller and a run
///
/// Checked between graph nodes and between stages; a cancelled run returns
/// [`Error::Cancelled`] and keeps no partial state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Entry point tying the builder, constraint sets and planner together
pub struct Resolver<'a> {
    manifests: &'a dyn ManifestProvider,
    registry: &'a dyn VersionRegistry,
    host: Triplet,
    /// port -> version text, parsed under the port's scheme
    overrides: BTreeMap<String, String>,
    cancel: CancellationToken,
}

impl<'a> Resolver<'a> {
    pub fn new(
        manifests: &'a dyn ManifestProvider,
        registry: &'a dyn VersionRegistry,
        host: Triplet,
    ) -> Self {
        Self {
            manifests,
            registry,
            host,
            overrides: BTreeMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Force `port` to `version`, ignoring every other constraint on it
    pub fn with_override(mut self, port: impl Into<String>, version: impl Into<String>) -> Self {
        self.overrides.insert(port.into(), version.into());
        self
    }

    pub fn with_overrides<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.overrides.extend(overrides);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn host(&self) -> &Triplet {
        &self.host
    }

    /// Build the graph and choose a version for every node
    pub fn resolve(&self, requests: &[FullPackageSpec]) -> Result<ResolvedGraph> {
        info!(
            "Resolving {} request(s) (host {})",
            requests.len(),
            self.host
        );

        let graph = GraphBuilder::new(self.manifests, self.host.clone())
            .with_cancellation(&self.cancel)
            .build(requests)?;
        self.cancel.checkpoint()?;

        let resolved = graph.resolve_with(|node| self.choose_version(node))?;
        info!("Resolved {} package(s)", resolved.len());
        Ok(resolved)
    }

    /// Resolve and diff against an installed snapshot
    pub fn plan(
        &self,
        requests: &[FullPackageSpec],
        installed: &[InstalledSpec],
    ) -> Result<ActionPlan> {
        let resolved = self.resolve(requests)?;
        self.cancel.checkpoint()?;
        PlanComputer::new(installed).compute(&resolved)
    }

    /// Plan against a snapshot read from `status`
    pub fn plan_with_status(
        &self,
        requests: &[FullPackageSpec],
        status: &dyn StatusDatabase,
    ) -> Result<ActionPlan> {
        let snapshot = status.list_installed()?;
        self.plan(requests, &snapshot)
    }

    /// Plan independent request batches in parallel
    ///
    /// Each batch gets its own builder state; results are in batch order.
    pub fn plan_many(
        &self,
        batches: &[Vec<FullPackageSpec>],
        installed: &[InstalledSpec],
    ) -> Vec<Result<ActionPlan>> {
        batches
            .par_iter()
            .map(|batch| self.plan(batch, installed))
            .collect()
    }

    fn choose_version(&self, node: &GraphNode) -> Result<SchemedVersion> {
        let scheme = node.manifest.scheme();
        let port = &node.spec.name;

        let mut set = ConstraintSet::new(node.spec.to_string(), scheme);
        for (requirer, constraint) in &node.constraints {
            set.add(requirer.clone(), constraint.clone());
        }
        set.set_baseline(self.registry.baseline(port)?);
        if let Some(text) = self.overrides.get(port) {
            set.set_override(Some(SchemedVersion::parse(text, scheme)?));
        }

        let latest = self.registry.latest(port)?;
        set.resolve(latest.as_ref())
    }
}
