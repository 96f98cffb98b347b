// src/package.rs

//! Package identity: triplets and package specs
//!
//! Text forms:
//! - `zlib:x64-linux` is a [`PackageSpec`]
//! - `curl[ssl,http2]:arm64-osx` is a [`FullPackageSpec`]; the triplet part
//!   is optional when a default triplet is supplied

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Name of the implicit feature every port has
pub const CORE_FEATURE: &str = "core";

/// Target platform identifier such as `x64-windows-static`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triplet(String);

impl Triplet {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(Error::InvalidPackageSpec {
                text: name,
                reason: "triplet must be lowercase alphanumerics separated by '-'".to_string(),
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Dash-separated components, used by platform expressions
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('-')
    }
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A port built for one triplet: the key of every graph node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    pub triplet: Triplet,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>, triplet: Triplet) -> Self {
        Self {
            name: name.into(),
            triplet,
        }
    }

    /// Parse `name:triplet`
    pub fn parse(text: &str) -> Result<Self> {
        let (name, triplet) = text.split_once(':').ok_or_else(|| Error::InvalidPackageSpec {
            text: text.to_string(),
            reason: "expected name:triplet".to_string(),
        })?;
        validate_port_name(text, name)?;
        Ok(Self::new(name, Triplet::new(triplet)?))
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.triplet)
    }
}

/// A requested package spec with the features asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullPackageSpec {
    pub spec: PackageSpec,
    /// Explicitly requested features. `core` disables default features;
    /// `*` selects every feature.
    pub features: BTreeSet<String>,
}

impl FullPackageSpec {
    pub fn new(spec: PackageSpec, features: impl IntoIterator<Item = String>) -> Self {
        Self {
            spec,
            features: features.into_iter().collect(),
        }
    }

    /// Parse `name[feat,...]:triplet`, falling back to `default_triplet`
    pub fn parse(text: &str, default_triplet: &Triplet) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidPackageSpec {
            text: text.to_string(),
            reason: reason.to_string(),
        };

        let (head, triplet) = match text.rsplit_once(':') {
            Some((head, triplet)) if !triplet.contains(']') => (head, Triplet::new(triplet)?),
            _ => (text, default_triplet.clone()),
        };

        let (name, features) = match head.split_once('[') {
            None => (head, BTreeSet::new()),
            Some((name, rest)) => {
                let list = rest
                    .strip_suffix(']')
                    .ok_or_else(|| invalid("unterminated feature list"))?;
                let mut features = BTreeSet::new();
                for feature in list.split(',').map(str::trim) {
                    if feature != "*" && !is_identifier(feature) {
                        return Err(invalid(&format!("invalid feature name '{feature}'")));
                    }
                    features.insert(feature.to_string());
                }
                (name, features)
            }
        };

        validate_port_name(text, name)?;
        Ok(Self {
            spec: PackageSpec::new(name, triplet),
            features,
        })
    }

    /// Whether the request opted out of default features
    pub fn excludes_defaults(&self) -> bool {
        self.features.contains(CORE_FEATURE)
    }
}

impl fmt::Display for FullPackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spec.name)?;
        if !self.features.is_empty() {
            let list: Vec<&str> = self.features.iter().map(String::as_str).collect();
            write!(f, "[{}]", list.join(","))?;
        }
        write!(f, ":{}", self.spec.triplet)
    }
}

fn validate_port_name(text: &str, name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(Error::InvalidPackageSpec {
            text: text.to_string(),
            reason: format!("invalid port name '{name}'"),
        })
    }
}

/// Lowercase alphanumerics separated by single dashes
pub(crate) fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.split('-').all(|part| {
            !part.is_empty()
                && part
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        })
}
