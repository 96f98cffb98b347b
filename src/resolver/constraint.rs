// src/resolver/constraint.rs

//! Per-port version constraint aggregation
//!
//! Minimum-version selection: the chosen version is the maximum of every
//! `>=` constraint and the baseline pin, or the exact pin when one exists.
//! No alternative versions are ever tried. An override replaces the whole
//! computation.

use crate::error::{Error, Result};
use crate::manifest::{ConstraintKind, VersionConstraint};
use crate::version::{SchemedVersion, VersionScheme};
use std::cmp::Ordering;
use tracing::debug;

const BASELINE: &str = "baseline";
const OVERRIDE: &str = "override";

/// All constraints targeting one port on one triplet
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    port: String,
    scheme: VersionScheme,
    /// (requirer, constraint)
    constraints: Vec<(String, VersionConstraint)>,
    baseline: Option<SchemedVersion>,
    override_version: Option<SchemedVersion>,
}

impl ConstraintSet {
    /// An empty set for `port`, whose declared scheme is `scheme`
    pub fn new(port: impl Into<String>, scheme: VersionScheme) -> Self {
        Self {
            port: port.into(),
            scheme,
            constraints: Vec::new(),
            baseline: None,
            override_version: None,
        }
    }

    pub fn add(&mut self, requirer: impl Into<String>, constraint: VersionConstraint) {
        self.constraints.push((requirer.into(), constraint));
    }

    pub fn set_baseline(&mut self, baseline: Option<SchemedVersion>) {
        self.baseline = baseline;
    }

    pub fn set_override(&mut self, version: Option<SchemedVersion>) {
        self.override_version = version;
    }

    pub fn constraints(&self) -> &[(String, VersionConstraint)] {
        &self.constraints
    }

    /// Choose the single version satisfying every constraint
    ///
    /// `latest` is only consulted when there are no constraints and no
    /// baseline pin.
    pub fn resolve(&self, latest: Option<&SchemedVersion>) -> Result<SchemedVersion> {
        self.check_schemes(latest)?;

        if let Some(version) = &self.override_version {
            debug!("{}: override {} wins", self.port, version);
            return Ok(version.clone());
        }

        let mut floor: Option<&SchemedVersion> = self.baseline.as_ref();
        let mut pin: Option<&SchemedVersion> = None;

        for (_, constraint) in &self.constraints {
            match constraint.kind {
                ConstraintKind::Minimum => {
                    floor = Some(match floor {
                        None => &constraint.version,
                        Some(current) => {
                            match self.compare(&constraint.version, current)? {
                                Ordering::Greater => &constraint.version,
                                _ => current,
                            }
                        }
                    });
                }
                ConstraintKind::Exact => match pin {
                    None => pin = Some(&constraint.version),
                    Some(existing) => {
                        if self.compare(existing, &constraint.version)? != Ordering::Equal {
                            return Err(self.unsatisfiable("exact version pins disagree"));
                        }
                    }
                },
            }
        }

        let chosen = match (pin, floor) {
            (Some(pin), Some(floor)) => {
                if self.compare(pin, floor)? == Ordering::Less {
                    return Err(self.unsatisfiable(&format!(
                        "minimum {floor} exceeds exact pin {pin}"
                    )));
                }
                pin
            }
            (Some(pin), None) => pin,
            (None, Some(floor)) => floor,
            (None, None) => latest.ok_or_else(|| Error::NoVersionAvailable {
                port: self.port.clone(),
            })?,
        };

        debug!(
            "{}: chose {} from {} constraint(s)",
            self.port,
            chosen,
            self.constraints.len()
        );
        Ok(chosen.clone())
    }

    /// Every contributing version must be under the declared scheme
    fn check_schemes(&self, latest: Option<&SchemedVersion>) -> Result<()> {
        let mut mismatched: Vec<String> = Vec::new();
        let mut found: Option<VersionScheme> = None;

        let mut note = |label: String, version: &SchemedVersion| {
            if version.scheme != self.scheme {
                found.get_or_insert(version.scheme);
                mismatched.push(format!("{label} ({} {})", version.scheme, version));
            }
        };

        for (requirer, constraint) in &self.constraints {
            note(requirer.clone(), &constraint.version);
        }
        if let Some(baseline) = &self.baseline {
            note(BASELINE.to_string(), baseline);
        }
        if let Some(version) = &self.override_version {
            note(OVERRIDE.to_string(), version);
        }
        if let Some(latest) = latest {
            note("registry".to_string(), latest);
        }

        match found {
            None => Ok(()),
            Some(found) => Err(Error::SchemeMismatch {
                port: Some(self.port.clone()),
                expected: self.scheme,
                found,
                sources: mismatched,
            }),
        }
    }

    /// Compare within this set; unordered versions make the set unsatisfiable
    fn compare(&self, a: &SchemedVersion, b: &SchemedVersion) -> Result<Ordering> {
        a.compare(b).map_err(|e| match e {
            Error::IncomparableVersions { left, right, .. } => {
                self.unsatisfiable(&format!("'{left}' and '{right}' cannot be ordered"))
            }
            other => other,
        })
    }

    fn unsatisfiable(&self, reason: &str) -> Error {
        let mut constraints: Vec<(String, String)> = self
            .constraints
            .iter()
            .map(|(requirer, c)| (requirer.clone(), c.to_string()))
            .collect();
        constraints.sort();
        if let Some(baseline) = &self.baseline {
            constraints.push((BASELINE.to_string(), format!(">= {baseline}")));
        }
        Error::UnsatisfiableConstraint {
            port: self.port.clone(),
            reason: reason.to_string(),
            constraints,
        }
    }
}
