// src/resolver/plan.rs

//! Action plans
//!
//! [`PlanComputer`] linearizes a [`ResolvedGraph`] (dependencies first, ties
//! broken by port name then triplet) and diffs it against the installed set.
//! The same [`ActionPlan`] type carries removal plans, where dependents come
//! before their dependencies.

use super::graph::{NodeId, ResolvedGraph};
use crate::error::{Error, Result};
use crate::package::PackageSpec;
use crate::status::{InstallReason, InstalledSpec};
use crate::version::SchemedVersion;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};

/// A resolved node as it appears in a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedNode {
    pub spec: PackageSpec,
    pub version: SchemedVersion,
    pub features: BTreeSet<String>,
    pub dependencies: Vec<PackageSpec>,
    pub reason: InstallReason,
}

impl PlannedNode {
    fn to_installed(&self) -> InstalledSpec {
        InstalledSpec {
            spec: self.spec.clone(),
            version: self.version.clone(),
            features: self.features.clone(),
            dependencies: self.dependencies.clone(),
            reason: self.reason,
        }
    }
}

/// One unit of work in a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum PlanAction {
    Install(PlannedNode),
    Upgrade {
        old: SchemedVersion,
        node: PlannedNode,
    },
    Remove(PackageSpec),
    AlreadyPresent(PlannedNode),
}

impl PlanAction {
    pub fn spec(&self) -> &PackageSpec {
        match self {
            PlanAction::Install(node)
            | PlanAction::Upgrade { node, .. }
            | PlanAction::AlreadyPresent(node) => &node.spec,
            PlanAction::Remove(spec) => spec,
        }
    }
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanAction::Install(node) => write!(f, "install {} {}", node.spec, node.version),
            PlanAction::Upgrade { old, node } => {
                write!(f, "upgrade {} {} -> {}", node.spec, old, node.version)
            }
            PlanAction::Remove(spec) => write!(f, "remove {spec}"),
            PlanAction::AlreadyPresent(node) => write!(f, "{} is already installed", node.spec),
        }
    }
}

/// Flat unit of work for the external executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutorStep {
    Remove(PackageSpec),
    Install(PlannedNode),
}

/// Counts per action kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub install: usize,
    pub upgrade: usize,
    pub remove: usize,
    pub already_present: usize,
}

impl PlanSummary {
    /// Whether the plan requires any work
    pub fn has_work(&self) -> bool {
        self.install + self.upgrade + self.remove > 0
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.install > 0 {
            parts.push(format!("{} to install", self.install));
        }
        if self.upgrade > 0 {
            parts.push(format!("{} to upgrade", self.upgrade));
        }
        if self.remove > 0 {
            parts.push(format!("{} to remove", self.remove));
        }
        if self.already_present > 0 {
            parts.push(format!("{} already installed", self.already_present));
        }
        if parts.is_empty() {
            write!(f, "nothing to do")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Ordered, internally consistent sequence of plan actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    actions: Vec<PlanAction>,
}

impl ActionPlan {
    pub fn new(actions: Vec<PlanAction>) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &[PlanAction] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for action in &self.actions {
            match action {
                PlanAction::Install(_) => summary.install += 1,
                PlanAction::Upgrade { .. } => summary.upgrade += 1,
                PlanAction::Remove(_) => summary.remove += 1,
                PlanAction::AlreadyPresent(_) => summary.already_present += 1,
            }
        }
        summary
    }

    /// Expand into executor steps; an upgrade is a remove then an install
    pub fn steps(&self) -> Vec<ExecutorStep> {
        let mut steps = Vec::new();
        for action in &self.actions {
            match action {
                PlanAction::Install(node) => steps.push(ExecutorStep::Install(node.clone())),
                PlanAction::Upgrade { node, .. } => {
                    steps.push(ExecutorStep::Remove(node.spec.clone()));
                    steps.push(ExecutorStep::Install(node.clone()));
                }
                PlanAction::Remove(spec) => steps.push(ExecutorStep::Remove(spec.clone())),
                PlanAction::AlreadyPresent(_) => {}
            }
        }
        steps
    }

    /// Records to write to the status database after a successful build
    ///
    /// Already-present entries are excluded; see [`ActionPlan::reason_updates`].
    pub fn install_records(&self) -> Vec<InstalledSpec> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                PlanAction::Install(node) | PlanAction::Upgrade { node, .. } => {
                    Some(node.to_installed())
                }
                _ => None,
            })
            .collect()
    }

    /// Already-present records whose install reason changed
    ///
    /// A package first pulled in as a dependency becomes explicit once the
    /// user requests it by name; nothing is rebuilt, only the record changes.
    pub fn reason_updates(&self, installed: &[InstalledSpec]) -> Vec<InstalledSpec> {
        let recorded: HashMap<&PackageSpec, &InstalledSpec> =
            installed.iter().map(|i| (&i.spec, i)).collect();

        self.actions
            .iter()
            .filter_map(|action| match action {
                PlanAction::AlreadyPresent(node) => recorded.get(&node.spec).and_then(|record| {
                    (record.reason != node.reason).then(|| InstalledSpec {
                        reason: node.reason,
                        ..(*record).clone()
                    })
                }),
                _ => None,
            })
            .collect()
    }

    /// Check the dependency-order guarantee
    ///
    /// Installed-side actions must follow every dependency they name that is
    /// also in the plan. A removal must precede the removal of anything the
    /// removed package depended on, per `installed`.
    pub fn verify_order(&self, installed: &[InstalledSpec]) -> Result<()> {
        let position: HashMap<&PackageSpec, usize> = self
            .actions
            .iter()
            .enumerate()
            .map(|(i, a)| (a.spec(), i))
            .collect();
        let recorded: HashMap<&PackageSpec, &InstalledSpec> =
            installed.iter().map(|i| (&i.spec, i)).collect();

        for (i, action) in self.actions.iter().enumerate() {
            match action {
                PlanAction::Install(node) | PlanAction::Upgrade { node, .. } => {
                    for dep in &node.dependencies {
                        if position.get(dep).is_some_and(|&p| p > i) {
                            return Err(order_error(&node.spec, dep));
                        }
                    }
                }
                PlanAction::Remove(spec) => {
                    let Some(record) = recorded.get(spec) else {
                        continue;
                    };
                    for dep in &record.dependencies {
                        let dep_removed_first = matches!(
                            position.get(dep).map(|&p| &self.actions[p]),
                            Some(PlanAction::Remove(_))
                        ) && position[dep] < i;
                        if dep_removed_first {
                            return Err(order_error(spec, dep));
                        }
                    }
                }
                PlanAction::AlreadyPresent(_) => {}
            }
        }
        Ok(())
    }
}

fn order_error(spec: &PackageSpec, dep: &PackageSpec) -> Error {
    Error::InternalConsistency(format!("plan places {dep} on the wrong side of {spec}"))
}

impl fmt::Display for ActionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for action in &self.actions {
            writeln!(f, "  {action}")?;
        }
        write!(f, "{}", self.summary())
    }
}

/// Diffs a resolved graph against the installed set
pub struct PlanComputer<'a> {
    installed: HashMap<&'a PackageSpec, &'a InstalledSpec>,
}

impl<'a> PlanComputer<'a> {
    pub fn new(installed: &'a [InstalledSpec]) -> Self {
        Self {
            installed: installed.iter().map(|i| (&i.spec, i)).collect(),
        }
    }

    pub fn compute(&self, graph: &ResolvedGraph) -> Result<ActionPlan> {
        graph.check_consistency()?;
        let order = install_order(graph)?;

        let mut actions = Vec::with_capacity(order.len());
        for id in order {
            let node = graph.node(id);
            let planned = PlannedNode {
                spec: node.spec.clone(),
                version: node.version.clone(),
                features: node.features.clone(),
                dependencies: node
                    .dependencies
                    .iter()
                    .map(|&d| graph.node(d).spec.clone())
                    .collect(),
                reason: merged_reason(self.installed.get(&node.spec).copied(), node.reason),
            };

            let action = match self.installed.get(&node.spec) {
                None => PlanAction::Install(planned),
                Some(current) if is_same_install(current, &planned) => {
                    PlanAction::AlreadyPresent(planned)
                }
                Some(current) => PlanAction::Upgrade {
                    old: current.version.clone(),
                    node: planned,
                },
            };
            debug!("Planned: {}", action);
            actions.push(action);
        }

        let plan = ActionPlan::new(actions);
        plan.verify_order(&[])?;
        info!("Plan computed: {}", plan.summary());
        Ok(plan)
    }
}

/// A user-requested package stays explicit whichever run installed it
fn merged_reason(current: Option<&InstalledSpec>, resolved: InstallReason) -> InstallReason {
    match current {
        Some(record) if record.reason == InstallReason::Explicit => InstallReason::Explicit,
        _ => resolved,
    }
}

/// Same scheme, version text, port-version and feature set
fn is_same_install(current: &InstalledSpec, planned: &PlannedNode) -> bool {
    current.version.scheme == planned.version.scheme
        && current.version.version == planned.version.version
        && current.features == planned.features
}

/// Kahn's algorithm, dependencies first, smallest (port, triplet) first
fn install_order(graph: &ResolvedGraph) -> Result<Vec<NodeId>> {
    let nodes = graph.nodes();
    let mut remaining: Vec<usize> = nodes
        .iter()
        .map(|n| n.dependencies.iter().collect::<HashSet<_>>().len())
        .collect();
    let mut dependents: Vec<Vec<NodeId>> = vec![Vec::new(); nodes.len()];
    for (id, node) in nodes.iter().enumerate() {
        for &dep in node.dependencies.iter().collect::<HashSet<_>>() {
            dependents[dep].push(id);
        }
    }

    let mut ready: BinaryHeap<Reverse<(&PackageSpec, NodeId)>> = nodes
        .iter()
        .enumerate()
        .filter(|(id, _)| remaining[*id] == 0)
        .map(|(id, node)| Reverse((&node.spec, id)))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse((_, id))) = ready.pop() {
        order.push(id);
        for &dependent in &dependents[id] {
            remaining[dependent] -= 1;
            if remaining[dependent] == 0 {
                ready.push(Reverse((&nodes[dependent].spec, dependent)));
            }
        }
    }

    if order.len() != nodes.len() {
        let cycle = graph
            .find_cycle()
            .map(|ids| ids.iter().map(|&id| graph.node(id).spec.to_string()).collect())
            .unwrap_or_default();
        return Err(Error::CircularDependency { cycle });
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Triplet;
    use crate::resolver::graph::ResolvedNode;
    use crate::version::VersionScheme;

    fn v(text: &str) -> SchemedVersion {
        SchemedVersion::parse(text, VersionScheme::Semver).unwrap()
    }

    fn spec(name: &str) -> PackageSpec {
        PackageSpec::new(name, Triplet::new("x64-linux").unwrap())
    }

    fn node(name: &str, deps: Vec<NodeId>) -> ResolvedNode {
        ResolvedNode {
            spec: spec(name),
            version: v("1.0.0"),
            features: BTreeSet::from(["core".to_string()]),
            dependencies: deps,
            reason: InstallReason::Dependency,
        }
    }

    fn names(plan: &ActionPlan) -> Vec<String> {
        plan.actions().iter().map(|a| a.spec().name.clone()).collect()
    }

    #[test]
    fn test_dependencies_first_with_name_tiebreak() {
        // 0:app -> 1:zlib, 2:bzip2
        let graph = ResolvedGraph::from_nodes(vec![
            node("app", vec![1, 2]),
            node("zlib", vec![]),
            node("bzip2", vec![]),
        ]);
        let plan = PlanComputer::new(&[]).compute(&graph).unwrap();
        assert_eq!(names(&plan), vec!["bzip2", "zlib", "app"]);
    }

    #[test]
    fn test_triplet_breaks_name_ties() {
        let mut arm = node("zlib", vec![]);
        arm.spec = PackageSpec::new("zlib", Triplet::new("arm64-linux").unwrap());
        let graph = ResolvedGraph::from_nodes(vec![node("zlib", vec![]), arm]);
        let plan = PlanComputer::new(&[]).compute(&graph).unwrap();
        assert_eq!(plan.actions()[0].spec().triplet.as_str(), "arm64-linux");
    }

    #[test]
    fn test_cycle_reported_with_sequence() {
        let graph = ResolvedGraph::from_nodes(vec![node("a", vec![1]), node("b", vec![0])]);
        match PlanComputer::new(&[]).compute(&graph) {
            Err(Error::CircularDependency { cycle }) => {
                assert_eq!(cycle, vec!["a:x64-linux", "b:x64-linux", "a:x64-linux"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_classification() {
        let graph = ResolvedGraph::from_nodes(vec![
            node("same", vec![]),
            node("newer", vec![]),
            node("featured", vec![]),
            node("fresh", vec![]),
        ]);
        let installed = vec![
            InstalledSpec::new(spec("same"), v("1.0.0")).with_features(["core"]),
            InstalledSpec::new(spec("newer"), v("0.9.0")).with_features(["core"]),
            InstalledSpec::new(spec("featured"), v("1.0.0")).with_features(["core", "ssl"]),
        ];
        let plan = PlanComputer::new(&installed).compute(&graph).unwrap();

        let by_name: HashMap<String, &PlanAction> = plan
            .actions()
            .iter()
            .map(|a| (a.spec().name.clone(), a))
            .collect();
        assert!(matches!(by_name["same"], PlanAction::AlreadyPresent(_)));
        assert!(matches!(by_name["newer"], PlanAction::Upgrade { .. }));
        assert!(matches!(by_name["featured"], PlanAction::Upgrade { .. }));
        assert!(matches!(by_name["fresh"], PlanAction::Install(_)));

        let summary = plan.summary();
        assert_eq!(summary.install, 1);
        assert_eq!(summary.upgrade, 2);
        assert_eq!(summary.already_present, 1);
        assert!(summary.has_work());
    }

    #[test]
    fn test_explicit_reason_survives_dependency_resolution() {
        let graph = ResolvedGraph::from_nodes(vec![node("kept", vec![]), node("bumped", vec![])]);
        let installed = vec![
            InstalledSpec::new(spec("kept"), v("1.0.0")).with_features(["core"]),
            InstalledSpec::new(spec("bumped"), v("0.9.0")).with_features(["core"]),
        ];
        let plan = PlanComputer::new(&installed).compute(&graph).unwrap();

        let records = plan.install_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].spec, spec("bumped"));
        assert_eq!(records[0].reason, InstallReason::Explicit);
        assert!(plan.reason_updates(&installed).is_empty());
    }

    #[test]
    fn test_requested_dependency_is_promoted() {
        let mut requested = node("zlib", vec![]);
        requested.reason = InstallReason::Explicit;
        let graph = ResolvedGraph::from_nodes(vec![requested]);
        let installed = vec![
            InstalledSpec::new(spec("zlib"), v("1.0.0"))
                .with_features(["core"])
                .as_dependency(),
        ];
        let plan = PlanComputer::new(&installed).compute(&graph).unwrap();

        assert!(matches!(plan.actions()[0], PlanAction::AlreadyPresent(_)));
        assert!(plan.install_records().is_empty());
        let updates = plan.reason_updates(&installed);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].reason, InstallReason::Explicit);
        assert_eq!(updates[0].version, v("1.0.0"));
    }

    #[test]
    fn test_scheme_change_is_upgrade() {
        let graph = ResolvedGraph::from_nodes(vec![node("a", vec![])]);
        let installed = vec![
            InstalledSpec::new(
                spec("a"),
                SchemedVersion::parse("1.0.0", VersionScheme::Relaxed).unwrap(),
            )
            .with_features(["core"]),
        ];
        let plan = PlanComputer::new(&installed).compute(&graph).unwrap();
        assert!(matches!(plan.actions()[0], PlanAction::Upgrade { .. }));
    }

    #[test]
    fn test_steps_expand_upgrades() {
        let graph = ResolvedGraph::from_nodes(vec![node("a", vec![])]);
        let installed = vec![InstalledSpec::new(spec("a"), v("0.1.0"))];
        let plan = PlanComputer::new(&installed).compute(&graph).unwrap();
        let steps = plan.steps();
        assert_eq!(steps.len(), 2);
        assert!(matches!(steps[0], ExecutorStep::Remove(_)));
        assert!(matches!(steps[1], ExecutorStep::Install(_)));
        assert_eq!(plan.install_records().len(), 1);
    }

    #[test]
    fn test_verify_order_rejects_misordered_plan() {
        let dependent = PlannedNode {
            spec: spec("a"),
            version: v("1.0.0"),
            features: BTreeSet::new(),
            dependencies: vec![spec("b")],
            reason: InstallReason::Explicit,
        };
        let dependency = PlannedNode {
            spec: spec("b"),
            dependencies: vec![],
            ..dependent.clone()
        };
        let plan = ActionPlan::new(vec![
            PlanAction::Install(dependent),
            PlanAction::Install(dependency),
        ]);
        assert!(plan.verify_order(&[]).is_err());
    }

    #[test]
    fn test_summary_display() {
        assert_eq!(ActionPlan::default().summary().to_string(), "nothing to do");
    }
}
