// src/resolver/graph.rs

//! Dependency graph construction
//!
//! Expands requested package specs into the full transitive node set with a
//! breadth-first worklist. Nodes live in an arena and refer to each other by
//! [`NodeId`]. A node's feature set only ever grows; a node that gains
//! features is queued again so the new features' dependencies are expanded.

use super::CancellationToken;
use crate::error::{Error, Result};
use crate::manifest::{ManifestProvider, PlatformContext, PortManifest, VersionConstraint};
use crate::package::{CORE_FEATURE, FullPackageSpec, PackageSpec, Triplet};
use crate::status::InstallReason;
use crate::version::SchemedVersion;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

/// Index of a node in its graph's arena
pub type NodeId = usize;

/// A (port, triplet) node under construction
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub spec: PackageSpec,
    pub manifest: PortManifest,
    /// Active features, always including `core`
    pub features: BTreeSet<String>,
    pub dependencies: BTreeSet<NodeId>,
    /// (requirer, constraint) pairs targeting this node
    pub constraints: Vec<(String, VersionConstraint)>,
    pub requested: bool,
    wants_defaults: bool,
    defaults_applied: bool,
    expanded: BTreeSet<String>,
    /// feature -> features of the same port it pulls in
    feature_links: BTreeMap<String, BTreeSet<String>>,
}

/// Graph produced by [`GraphBuilder`], versions not yet chosen
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<PackageSpec, NodeId>,
}

impl DependencyGraph {
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn find(&self, spec: &PackageSpec) -> Option<&GraphNode> {
        self.index.get(spec).map(|&id| &self.nodes[id])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Find one cross-port cycle, returned as a closed node sequence
    pub fn find_cycle(&self) -> Option<Vec<NodeId>> {
        let mut roots: Vec<NodeId> = (0..self.nodes.len()).collect();
        roots.sort_by(|&a, &b| self.nodes[a].spec.cmp(&self.nodes[b].spec));
        first_cycle(&roots, |id| self.nodes[id].dependencies.iter().copied().collect())
    }

    /// Assign a version to every node
    pub fn resolve_with<F>(self, mut choose: F) -> Result<ResolvedGraph>
    where
        F: FnMut(&GraphNode) -> Result<SchemedVersion>,
    {
        let mut resolved = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let version = choose(node)?;
            resolved.push(ResolvedNode {
                spec: node.spec.clone(),
                version,
                features: node.features.clone(),
                dependencies: node.dependencies.iter().copied().collect(),
                reason: if node.requested {
                    InstallReason::Explicit
                } else {
                    InstallReason::Dependency
                },
            });
        }
        Ok(ResolvedGraph {
            nodes: resolved,
            index: self.index,
        })
    }
}

/// A node with its chosen version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNode {
    pub spec: PackageSpec,
    pub version: SchemedVersion,
    pub features: BTreeSet<String>,
    pub dependencies: Vec<NodeId>,
    pub reason: InstallReason,
}

/// Fully resolved graph, input to plan computation
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    nodes: Vec<ResolvedNode>,
    index: HashMap<PackageSpec, NodeId>,
}

impl ResolvedGraph {
    /// Build from nodes whose `dependencies` index into `nodes`
    pub fn from_nodes(nodes: Vec<ResolvedNode>) -> Self {
        let mut index = HashMap::new();
        for (id, node) in nodes.iter().enumerate() {
            index.entry(node.spec.clone()).or_insert(id);
        }
        Self { nodes, index }
    }

    pub fn nodes(&self) -> &[ResolvedNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &ResolvedNode {
        &self.nodes[id]
    }

    pub fn find(&self, spec: &PackageSpec) -> Option<&ResolvedNode> {
        self.index.get(spec).map(|&id| &self.nodes[id])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// One version per (port, triplet) and no dangling edges
    pub fn check_consistency(&self) -> Result<()> {
        let mut chosen: HashMap<&PackageSpec, &SchemedVersion> = HashMap::new();
        for node in &self.nodes {
            if let Some(previous) = chosen.insert(&node.spec, &node.version) {
                if previous != &node.version {
                    return Err(Error::InternalConsistency(format!(
                        "{} resolved to both {} and {}",
                        node.spec, previous, node.version
                    )));
                }
                return Err(Error::InternalConsistency(format!(
                    "{} appears twice in the resolved graph",
                    node.spec
                )));
            }
            if let Some(bad) = node.dependencies.iter().find(|&&d| d >= self.nodes.len()) {
                return Err(Error::InternalConsistency(format!(
                    "{} depends on missing node {}",
                    node.spec, bad
                )));
            }
        }
        Ok(())
    }

    /// Find one dependency cycle, returned as a closed node sequence
    pub fn find_cycle(&self) -> Option<Vec<NodeId>> {
        let mut roots: Vec<NodeId> = (0..self.nodes.len()).collect();
        roots.sort_by(|&a, &b| self.nodes[a].spec.cmp(&self.nodes[b].spec));
        first_cycle(&roots, |id| self.nodes[id].dependencies.clone())
    }
}

/// Depth-first search over `roots` in order with an explicit stack.
/// Returns the first back edge found as `[n0, .., nk, n0]`.
fn first_cycle<F>(roots: &[NodeId], successors: F) -> Option<Vec<NodeId>>
where
    F: Fn(NodeId) -> Vec<NodeId>,
{
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut on_path: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<(NodeId, std::vec::IntoIter<NodeId>)> = Vec::new();

    for &root in roots {
        if !visited.insert(root) {
            continue;
        }
        on_path.insert(root);
        stack.push((root, successors(root).into_iter()));

        while let Some((_, pending)) = stack.last_mut() {
            match pending.next() {
                Some(next) if on_path.contains(&next) => {
                    let pos = stack.iter().position(|(id, _)| *id == next)?;
                    let mut cycle: Vec<NodeId> = stack[pos..].iter().map(|(id, _)| *id).collect();
                    cycle.push(next);
                    return Some(cycle);
                }
                Some(next) => {
                    if visited.insert(next) {
                        on_path.insert(next);
                        stack.push((next, successors(next).into_iter()));
                    }
                }
                None => {
                    if let Some((done, _)) = stack.pop() {
                        on_path.remove(&done);
                    }
                }
            }
        }
    }
    None
}

/// Breadth-first graph builder
pub struct GraphBuilder<'a> {
    manifests: &'a dyn ManifestProvider,
    host: Triplet,
    cancel: Option<&'a CancellationToken>,
    graph: DependencyGraph,
    queue: VecDeque<NodeId>,
    queued: HashSet<NodeId>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(manifests: &'a dyn ManifestProvider, host: Triplet) -> Self {
        Self {
            manifests,
            host,
            cancel: None,
            graph: DependencyGraph::default(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
        }
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Expand `requests` to a fixed point
    pub fn build(mut self, requests: &[FullPackageSpec]) -> Result<DependencyGraph> {
        for request in requests {
            self.add_request(request)?;
        }

        while let Some(id) = self.queue.pop_front() {
            if self.cancel.is_some_and(|c| c.is_cancelled()) {
                return Err(Error::Cancelled);
            }
            self.queued.remove(&id);
            self.expand(id)?;
        }

        if let Some(ids) = self.graph.find_cycle() {
            let cycle = ids
                .iter()
                .map(|&id| self.graph.nodes[id].spec.to_string())
                .collect();
            return Err(Error::CircularDependency { cycle });
        }

        debug!("Dependency graph complete: {} nodes", self.graph.len());
        Ok(self.graph)
    }

    fn add_request(&mut self, request: &FullPackageSpec) -> Result<()> {
        let id = self.ensure_node(&request.spec)?;
        self.graph.nodes[id].requested = true;

        let features: Vec<String> = if request.features.contains("*") {
            self.graph.nodes[id].manifest.features.keys().cloned().collect()
        } else {
            request.features.iter().cloned().collect()
        };
        self.add_features(id, &features, !request.excludes_defaults())
    }

    /// Look up or create the node for `spec`
    fn ensure_node(&mut self, spec: &PackageSpec) -> Result<NodeId> {
        if let Some(&id) = self.graph.index.get(spec) {
            return Ok(id);
        }

        let manifest = self.manifests.load(&spec.name, &spec.triplet)?;
        if let Some(supports) = &manifest.supports {
            let ctx = PlatformContext {
                target: &spec.triplet,
                host: &self.host,
            };
            if !supports.evaluate(&ctx) {
                return Err(Error::UnsupportedPlatform {
                    spec: spec.to_string(),
                    expression: supports.to_string(),
                });
            }
        }

        let id = self.graph.nodes.len();
        self.graph.nodes.push(GraphNode {
            spec: spec.clone(),
            manifest,
            features: BTreeSet::from([CORE_FEATURE.to_string()]),
            dependencies: BTreeSet::new(),
            constraints: Vec::new(),
            requested: false,
            wants_defaults: false,
            defaults_applied: false,
            expanded: BTreeSet::new(),
            feature_links: BTreeMap::new(),
        });
        self.graph.index.insert(spec.clone(), id);
        debug!("Discovered {}", spec);
        self.enqueue(id);
        Ok(id)
    }

    /// Grow a node's feature set, re-queueing it if anything changed
    fn add_features(&mut self, id: NodeId, features: &[String], defaults: bool) -> Result<()> {
        let node = &mut self.graph.nodes[id];
        let mut changed = false;

        for feature in features {
            if !node.manifest.has_feature(feature) {
                return Err(Error::UnknownFeature {
                    port: node.spec.name.clone(),
                    feature: feature.clone(),
                });
            }
            changed |= node.features.insert(feature.clone());
        }
        if defaults && !node.wants_defaults {
            node.wants_defaults = true;
            changed = true;
        }

        if changed {
            debug!("{} now has features {:?}", node.spec, node.features);
            self.enqueue(id);
        }
        Ok(())
    }

    fn enqueue(&mut self, id: NodeId) {
        if self.queued.insert(id) {
            self.queue.push_back(id);
        }
    }

    /// Expand every feature of `id` that has not been expanded yet
    fn expand(&mut self, id: NodeId) -> Result<()> {
        {
            let node = &mut self.graph.nodes[id];
            if node.wants_defaults && !node.defaults_applied {
                node.defaults_applied = true;
                let defaults = node.manifest.default_features.clone();
                node.features.extend(defaults);
            }
        }

        loop {
            let node = &self.graph.nodes[id];
            let pending: Vec<String> = node.features.difference(&node.expanded).cloned().collect();
            if pending.is_empty() {
                break;
            }
            for feature in pending {
                self.graph.nodes[id].expanded.insert(feature.clone());
                self.expand_feature(id, &feature)?;
            }
        }

        self.check_feature_cycles(id)
    }

    fn expand_feature(&mut self, id: NodeId, feature: &str) -> Result<()> {
        let spec = self.graph.nodes[id].spec.clone();
        let dependencies = self.graph.nodes[id]
            .manifest
            .feature_dependencies(feature)?
            .to_vec();
        let ctx = PlatformContext {
            target: &spec.triplet,
            host: &self.host,
        };
        let active: Vec<_> = dependencies
            .into_iter()
            .filter(|d| d.applies_to(&ctx))
            .collect();

        for dependency in active {
            let triplet = if dependency.host {
                self.host.clone()
            } else {
                spec.triplet.clone()
            };
            let target = PackageSpec::new(dependency.name.clone(), triplet);

            if target == spec {
                if feature == CORE_FEATURE {
                    return Err(Error::CircularDependency {
                        cycle: vec![spec.to_string(), spec.to_string()],
                    });
                }
                let node = &mut self.graph.nodes[id];
                for linked in &dependency.features {
                    if !node.manifest.has_feature(linked) {
                        return Err(Error::UnknownFeature {
                            port: spec.name.clone(),
                            feature: linked.clone(),
                        });
                    }
                    node.feature_links
                        .entry(feature.to_string())
                        .or_default()
                        .insert(linked.clone());
                    node.features.insert(linked.clone());
                }
                continue;
            }

            let target_id = self.ensure_node(&target)?;
            self.add_features(target_id, &dependency.features, dependency.default_features)?;
            if let Some(constraint) = &dependency.constraint {
                self.graph.nodes[target_id]
                    .constraints
                    .push((spec.to_string(), constraint.clone()));
            }
            self.graph.nodes[id].dependencies.insert(target_id);
        }
        Ok(())
    }

    /// Features of one port must not pull each other in circularly
    fn check_feature_cycles(&self, id: NodeId) -> Result<()> {
        let node = &self.graph.nodes[id];
        let links = &node.feature_links;

        let mut done: HashSet<&str> = HashSet::new();
        for start in links.keys() {
            let mut path: Vec<&str> = Vec::new();
            if let Some(cycle) = feature_cycle(links, start, &mut path, &mut done) {
                return Err(Error::CircularDependency {
                    cycle: cycle
                        .iter()
                        .map(|f| format!("{}[{}]", node.spec, f))
                        .collect(),
                });
            }
        }
        Ok(())
    }
}

fn feature_cycle<'l>(
    links: &'l BTreeMap<String, BTreeSet<String>>,
    feature: &'l str,
    path: &mut Vec<&'l str>,
    done: &mut HashSet<&'l str>,
) -> Option<Vec<&'l str>> {
    if let Some(pos) = path.iter().position(|&f| f == feature) {
        let mut cycle = path[pos..].to_vec();
        cycle.push(feature);
        return Some(cycle);
    }
    if done.contains(feature) {
        return None;
    }

    path.push(feature);
    if let Some(next) = links.get(feature) {
        for linked in next {
            if let Some(cycle) = feature_cycle(links, linked, path, done) {
                return Some(cycle);
            }
        }
    }
    path.pop();
    done.insert(feature);
    None
}
