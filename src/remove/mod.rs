// src/remove/mod.rs

//! Removal planning and execution
//!
//! Removal works on the installed-package graph reconstructed from the
//! dependencies recorded at install time. Dependents are always removed
//! before what they depend on. Purge mode then sweeps every
//! dependency-installed package nothing depends on any more, repeating until
//! nothing changes.

use crate::error::{Error, Result};
use crate::package::PackageSpec;
use crate::resolver::{ActionPlan, PlanAction};
use crate::status::{InstallReason, InstalledSpec, StatusDatabase};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, VecDeque};
use tracing::{debug, info, warn};

/// Options of a remove request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveOptions {
    /// Also remove dependency-installed packages left without dependents
    #[serde(default)]
    pub purge: bool,
    /// Remove even when installed packages still depend on a target
    #[serde(default)]
    pub force: bool,
    /// Extend the request to every installed transitive dependent
    #[serde(default)]
    pub recurse: bool,
}

/// Computes and applies removal plans against an installed snapshot
pub struct RemovePlanExecutor {
    installed: BTreeMap<PackageSpec, InstalledSpec>,
    /// spec -> installed packages that depend on it
    dependents: BTreeMap<PackageSpec, BTreeSet<PackageSpec>>,
    options: RemoveOptions,
}

impl RemovePlanExecutor {
    pub fn new(installed: Vec<InstalledSpec>, options: RemoveOptions) -> Self {
        let installed: BTreeMap<PackageSpec, InstalledSpec> = installed
            .into_iter()
            .map(|i| (i.spec.clone(), i))
            .collect();

        let mut dependents: BTreeMap<PackageSpec, BTreeSet<PackageSpec>> = BTreeMap::new();
        for record in installed.values() {
            for dep in &record.dependencies {
                if installed.contains_key(dep) && dep != &record.spec {
                    dependents
                        .entry(dep.clone())
                        .or_default()
                        .insert(record.spec.clone());
                }
            }
        }

        Self {
            installed,
            dependents,
            options,
        }
    }

    /// Snapshot the status database
    pub fn from_status(status: &dyn StatusDatabase, options: RemoveOptions) -> Result<Self> {
        Ok(Self::new(status.list_installed()?, options))
    }

    /// Compute the ordered removal plan for `targets`
    pub fn plan(&self, targets: &[PackageSpec]) -> Result<ActionPlan> {
        let mut removing: BTreeSet<PackageSpec> = BTreeSet::new();
        for target in targets {
            if self.installed.contains_key(target) {
                removing.insert(target.clone());
            } else {
                warn!("{} is not installed, skipping", target);
            }
        }

        if self.options.recurse {
            let extra = self.transitive_dependents(&removing);
            if !extra.is_empty() {
                info!("Also removing {} dependent package(s)", extra.len());
            }
            removing.extend(extra);
        }

        for target in &removing {
            let blockers: Vec<String> = self
                .dependents_of(target)
                .filter(|d| !removing.contains(*d))
                .map(ToString::to_string)
                .collect();
            if blockers.is_empty() {
                continue;
            }
            if self.options.force {
                warn!(
                    "Removing {} although it is required by {}",
                    target,
                    blockers.join(", ")
                );
            } else {
                return Err(Error::BlockingDependents {
                    package: target.to_string(),
                    dependents: blockers,
                });
            }
        }

        if self.options.purge {
            self.sweep_orphans(&mut removing);
        }

        let order = self.removal_order(&removing)?;
        let plan = ActionPlan::new(order.into_iter().map(PlanAction::Remove).collect());
        let snapshot: Vec<InstalledSpec> = self.installed.values().cloned().collect();
        plan.verify_order(&snapshot)?;

        info!("Removal plan: {}", plan.summary());
        Ok(plan)
    }

    /// Apply a computed plan through the status database
    pub fn execute(&self, plan: &ActionPlan, status: &mut dyn StatusDatabase) -> Result<usize> {
        let mut removed = 0;
        for action in plan.actions() {
            if let PlanAction::Remove(spec) = action {
                debug!("Recording removal of {}", spec);
                status.record_remove(spec)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn dependents_of<'s>(&'s self, spec: &PackageSpec) -> impl Iterator<Item = &'s PackageSpec> {
        self.dependents.get(spec).into_iter().flatten()
    }

    fn transitive_dependents(&self, roots: &BTreeSet<PackageSpec>) -> BTreeSet<PackageSpec> {
        let mut found = BTreeSet::new();
        let mut queue: VecDeque<&PackageSpec> = roots.iter().collect();

        while let Some(spec) = queue.pop_front() {
            for dependent in self.dependents_of(spec) {
                if !roots.contains(dependent) && found.insert(dependent.clone()) {
                    queue.push_back(dependent);
                }
            }
        }
        found
    }

    /// Add dependency-installed packages whose dependents are all going away
    fn sweep_orphans(&self, removing: &mut BTreeSet<PackageSpec>) {
        loop {
            let orphans: Vec<PackageSpec> = self
                .installed
                .values()
                .filter(|i| i.reason == InstallReason::Dependency)
                .filter(|i| !removing.contains(&i.spec))
                .filter(|i| self.dependents_of(&i.spec).all(|d| removing.contains(d)))
                .map(|i| i.spec.clone())
                .collect();
            if orphans.is_empty() {
                break;
            }
            for orphan in orphans {
                debug!("Purging orphaned dependency {}", orphan);
                removing.insert(orphan);
            }
        }
    }

    /// Dependents before dependencies, smallest spec first among ready ones
    fn removal_order(&self, removing: &BTreeSet<PackageSpec>) -> Result<Vec<PackageSpec>> {
        let mut pending: BTreeMap<&PackageSpec, usize> = removing
            .iter()
            .map(|spec| {
                let count = self
                    .dependents_of(spec)
                    .filter(|d| removing.contains(*d))
                    .count();
                (spec, count)
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<&PackageSpec>> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(spec, _)| Reverse(*spec))
            .collect();

        let mut order = Vec::with_capacity(removing.len());
        while let Some(Reverse(spec)) = ready.pop() {
            order.push(spec.clone());
            let Some(record) = self.installed.get(spec) else {
                continue;
            };
            let unique: BTreeSet<&PackageSpec> = record.dependencies.iter().collect();
            for dep in unique {
                if dep == spec {
                    continue;
                }
                if let Some(count) = pending.get_mut(dep) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(Reverse(dep));
                    }
                }
            }
        }

        if order.len() != removing.len() {
            let cycle: Vec<String> = pending
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(spec, _)| spec.to_string())
                .collect();
            return Err(Error::CircularDependency { cycle });
        }
        Ok(order)
    }
}

/// Snapshot, plan and apply a removal in one call
///
/// Nothing is written unless the whole plan computes successfully.
pub fn remove_packages(
    status: &mut dyn StatusDatabase,
    targets: &[PackageSpec],
    options: RemoveOptions,
) -> Result<ActionPlan> {
    let executor = RemovePlanExecutor::from_status(&*status, options)?;
    let plan = executor.plan(targets)?;
    executor.execute(&plan, status)?;
    Ok(plan)
}
