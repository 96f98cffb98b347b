// tests/scenarios.rs

//! End-to-end resolution and removal scenarios.

mod common;

use common::*;
use portplan::{
    Dependency, Error, InMemoryRegistry, InstallReason, MemoryStatusDb, PlanAction, RemoveOptions,
    Resolver, StatusDatabase, record_plan_installs, remove_packages,
};

fn install_names(actions: &[PlanAction]) -> Vec<String> {
    actions
        .iter()
        .map(|a| match a {
            PlanAction::Install(node) => format!("install {}", node.spec.name),
            PlanAction::Upgrade { node, .. } => format!("upgrade {}", node.spec.name),
            PlanAction::Remove(spec) => format!("remove {}", spec.name),
            PlanAction::AlreadyPresent(node) => format!("present {}", node.spec.name),
        })
        .collect()
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// A requires B >= 1.2.0; baseline pins B at 1.2.0#1
#[test]
fn test_baseline_pin_above_minimum() {
    init_tracing();
    let catalog = catalog([
        port("a", "1.0.0", &[]).with_dependency(Dependency::new("b").at_least(semver("1.2.0"))),
        port("b", "1.2.0", &[]),
    ]);
    let registry = InMemoryRegistry::from_catalog(&catalog).with_baseline("b", semver("1.2.0#1"));
    let resolver = Resolver::new(&catalog, &registry, x64());

    let plan = resolver.plan(&[request("a")], &[]).unwrap();
    assert_eq!(install_names(plan.actions()), vec!["install b", "install a"]);

    match &plan.actions()[0] {
        PlanAction::Install(node) => assert_eq!(node.version.to_string(), "1.2.0#1"),
        other => panic!("expected install of b, got {other:?}"),
    }
}

/// A pins B == 2.0.0, C pins B == 1.0.0
#[test]
fn test_conflicting_exact_pins_name_both_edges() {
    init_tracing();
    let catalog = catalog([
        port("root", "1.0.0", &["a", "c"]),
        port("a", "1.0.0", &[]).with_dependency(Dependency::new("b").exactly(semver("2.0.0"))),
        port("c", "1.0.0", &[]).with_dependency(Dependency::new("b").exactly(semver("1.0.0"))),
        port("b", "2.0.0", &[]),
    ]);
    let registry = InMemoryRegistry::from_catalog(&catalog);
    let resolver = Resolver::new(&catalog, &registry, x64());

    match resolver.plan(&[request("root")], &[]) {
        Err(Error::UnsatisfiableConstraint {
            port, constraints, ..
        }) => {
            assert_eq!(port, "b:x64-linux");
            let requirers: Vec<&str> = constraints.iter().map(|(r, _)| r.as_str()).collect();
            assert!(requirers.contains(&"a:x64-linux"));
            assert!(requirers.contains(&"c:x64-linux"));
        }
        other => panic!("expected unsatisfiable constraint, got {other:?}"),
    }
}

fn date(text: &str) -> portplan::SchemedVersion {
    portplan::SchemedVersion::parse(text, portplan::VersionScheme::Date).unwrap()
}

#[test]
fn test_scheme_mismatch_is_fatal() {
    let catalog = catalog([
        port("a", "1.0.0", &[]).with_dependency(Dependency::new("b").at_least(date("2023-01-01"))),
        port("b", "1.0.0", &[]),
    ]);
    let registry = InMemoryRegistry::from_catalog(&catalog);
    let resolver = Resolver::new(&catalog, &registry, x64());
    assert!(matches!(
        resolver.plan(&[request("a")], &[]),
        Err(Error::SchemeMismatch { .. })
    ));
}

#[test]
fn test_cycle_across_ports() {
    let catalog = catalog([port("a", "1.0.0", &["b"]), port("b", "1.0.0", &["a"])]);
    let registry = InMemoryRegistry::from_catalog(&catalog);
    let resolver = Resolver::new(&catalog, &registry, x64());
    match resolver.plan(&[request("a")], &[]) {
        Err(Error::CircularDependency { cycle }) => {
            assert_eq!(cycle, vec!["a:x64-linux", "b:x64-linux", "a:x64-linux"]);
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn test_triplets_resolve_independently() {
    let catalog = catalog([port("app", "1.0.0", &["zlib"]), port("zlib", "1.3.0", &[])]);
    let registry = InMemoryRegistry::from_catalog(&catalog);
    let resolver = Resolver::new(&catalog, &registry, x64());
    let arm = portplan::Triplet::new("arm64-linux").unwrap();

    let plan = resolver
        .plan(
            &[
                request("app"),
                portplan::FullPackageSpec::parse("app", &arm).unwrap(),
            ],
            &[],
        )
        .unwrap();
    assert_eq!(plan.summary().install, 4);
    let order: Vec<String> = plan.actions().iter().map(|a| a.spec().to_string()).collect();
    assert_eq!(
        order,
        vec![
            "zlib:arm64-linux",
            "app:arm64-linux",
            "zlib:x64-linux",
            "app:x64-linux"
        ]
    );
}

#[test]
fn test_cycle_rejected_by_resolve() {
    let catalog = catalog([
        port("a", "1.0.0", &["b"]),
        port("b", "1.0.0", &["c"]),
        port("c", "1.0.0", &["a"]),
    ]);
    let registry = InMemoryRegistry::from_catalog(&catalog);
    let resolver = Resolver::new(&catalog, &registry, x64());
    match resolver.resolve(&[request("a")]) {
        Err(Error::CircularDependency { cycle }) => {
            assert_eq!(cycle, vec!["a:x64-linux", "b:x64-linux", "c:x64-linux", "a:x64-linux"]);
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn test_reinstall_is_already_present() {
    let catalog = catalog([port("a", "1.0.0", &["b"]), port("b", "1.0.0", &[])]);
    let registry = InMemoryRegistry::from_catalog(&catalog);
    let resolver = Resolver::new(&catalog, &registry, x64());

    let mut db = MemoryStatusDb::new();
    let first = resolver.plan_with_status(&[request("a")], &db).unwrap();
    record_plan_installs(&mut db, &first).unwrap();

    let b = db.get(&spec("b")).unwrap();
    assert_eq!(b.reason, InstallReason::Dependency);
    assert_eq!(db.get(&spec("a")).unwrap().reason, InstallReason::Explicit);

    let second = resolver.plan_with_status(&[request("a")], &db).unwrap();
    assert!(!second.summary().has_work());
    assert_eq!(second.summary().already_present, 2);
}

// =============================================================================
// REMOVAL
// =============================================================================

/// B is a dependency of A only; remove A --purge
#[test]
fn test_remove_with_purge() {
    init_tracing();
    let mut db = MemoryStatusDb::with_installed([
        installed("a", &["b"]),
        installed("b", &[]).as_dependency(),
    ]);
    let options = RemoveOptions {
        purge: true,
        ..Default::default()
    };

    let plan = remove_packages(&mut db, &[spec("a")], options).unwrap();
    assert_eq!(install_names(plan.actions()), vec!["remove a", "remove b"]);
    assert!(db.list_installed().unwrap().is_empty());
}

#[test]
fn test_blocked_removal_writes_nothing() {
    let mut db = MemoryStatusDb::with_installed([installed("a", &["b"]), installed("b", &[])]);

    let result = remove_packages(&mut db, &[spec("b")], RemoveOptions::default());
    match result {
        Err(Error::BlockingDependents { package, dependents }) => {
            assert_eq!(package, "b:x64-linux");
            assert_eq!(dependents, vec!["a:x64-linux"]);
        }
        other => panic!("expected blocking dependents, got {other:?}"),
    }
    assert_eq!(db.write_count(), 0);
    assert_eq!(db.list_installed().unwrap().len(), 2);
}

#[test]
fn test_forced_removal_leaves_dependent() {
    let mut db = MemoryStatusDb::with_installed([installed("a", &["b"]), installed("b", &[])]);
    let options = RemoveOptions {
        force: true,
        ..Default::default()
    };
    let plan = remove_packages(&mut db, &[spec("b")], options).unwrap();
    assert_eq!(plan.len(), 1);
    assert!(db.contains(&spec("a")));
}

// =============================================================================
// INSTALL REASONS
// =============================================================================

/// b was installed by name, then upgraded as a dependency of a
#[test]
fn test_upgrade_keeps_explicit_reason_through_purge() {
    init_tracing();
    let catalog = catalog([port("a", "1.0.0", &["b"]), port("b", "2.0.0", &[])]);
    let registry = InMemoryRegistry::from_catalog(&catalog);
    let resolver = Resolver::new(&catalog, &registry, x64());

    let mut db = MemoryStatusDb::with_installed([installed("b", &[])]);
    let plan = resolver.plan_with_status(&[request("a")], &db).unwrap();
    assert_eq!(install_names(plan.actions()), vec!["upgrade b", "install a"]);
    record_plan_installs(&mut db, &plan).unwrap();

    let b = db.get(&spec("b")).unwrap();
    assert_eq!(b.reason, InstallReason::Explicit);
    assert_eq!(b.version, semver("2.0.0"));

    let options = RemoveOptions {
        purge: true,
        ..Default::default()
    };
    let removal = remove_packages(&mut db, &[spec("a")], options).unwrap();
    assert_eq!(install_names(removal.actions()), vec!["remove a"]);
    assert!(db.contains(&spec("b")));
}

/// b arrived as a dependency of a, then the user asks for b by name
#[test]
fn test_requesting_dependency_by_name_makes_it_explicit() {
    let catalog = catalog([port("a", "1.0.0", &["b"]), port("b", "1.0.0", &[])]);
    let registry = InMemoryRegistry::from_catalog(&catalog);
    let resolver = Resolver::new(&catalog, &registry, x64());

    let mut db = MemoryStatusDb::new();
    let first = resolver.plan_with_status(&[request("a")], &db).unwrap();
    record_plan_installs(&mut db, &first).unwrap();
    assert_eq!(db.get(&spec("b")).unwrap().reason, InstallReason::Dependency);

    let second = resolver.plan_with_status(&[request("b")], &db).unwrap();
    assert_eq!(install_names(second.actions()), vec!["present b"]);
    let writes = db.write_count();
    assert_eq!(record_plan_installs(&mut db, &second).unwrap(), 1);
    assert_eq!(db.write_count(), writes + 1);
    assert_eq!(db.get(&spec("b")).unwrap().reason, InstallReason::Explicit);

    let options = RemoveOptions {
        purge: true,
        ..Default::default()
    };
    remove_packages(&mut db, &[spec("a")], options).unwrap();
    assert!(db.contains(&spec("b")));
}
