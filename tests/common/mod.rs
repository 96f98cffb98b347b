// tests/common/mod.rs

//! Shared fixtures for integration tests: triplets, versions, catalogs and
//! installed records.

#![allow(dead_code)]

use portplan::{
    Dependency, FullPackageSpec, InstalledSpec, ManifestCatalog, PackageSpec, PortManifest,
    SchemedVersion, Triplet, VersionScheme,
};

/// Route engine logs to the test writer; honours RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn x64() -> Triplet {
    Triplet::new("x64-linux").unwrap()
}

pub fn semver(text: &str) -> SchemedVersion {
    SchemedVersion::parse(text, VersionScheme::Semver).unwrap()
}

pub fn spec(name: &str) -> PackageSpec {
    PackageSpec::new(name, x64())
}

pub fn request(text: &str) -> FullPackageSpec {
    FullPackageSpec::parse(text, &x64()).unwrap()
}

/// Semver port at `version` depending on `deps` without constraints
pub fn port(name: &str, version: &str, deps: &[&str]) -> PortManifest {
    deps.iter().fold(PortManifest::new(name, semver(version)), |m, d| {
        m.with_dependency(Dependency::new(*d))
    })
}

pub fn catalog(ports: impl IntoIterator<Item = PortManifest>) -> ManifestCatalog {
    ports
        .into_iter()
        .fold(ManifestCatalog::new(), |catalog, m| catalog.with(m))
}

/// Explicitly installed semver 1.0.0 record with the given dependencies
pub fn installed(name: &str, deps: &[&str]) -> InstalledSpec {
    InstalledSpec::new(spec(name), semver("1.0.0"))
        .with_features(["core"])
        .with_dependencies(deps.iter().map(|d| spec(d)))
}

/// A layered graph of `width * depth` ports where each port depends on
/// two ports of the next layer
pub fn layered_catalog(width: usize, depth: usize) -> (ManifestCatalog, Vec<FullPackageSpec>) {
    let name = |layer: usize, i: usize| format!("p{layer}x{i}");
    let mut ports = Vec::new();
    for layer in 0..depth {
        for i in 0..width {
            let mut manifest = PortManifest::new(name(layer, i), semver("1.0.0"));
            if layer + 1 < depth {
                manifest = manifest
                    .with_dependency(Dependency::new(name(layer + 1, i)))
                    .with_dependency(Dependency::new(name(layer + 1, (i * 7 + 3) % width)));
            }
            ports.push(manifest);
        }
    }
    let roots = (0..width).map(|i| request(&name(0, i))).collect();
    (catalog(ports), roots)
}
