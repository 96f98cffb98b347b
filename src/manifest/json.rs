// src/manifest/json.rs

//! Loading manifests from vcpkg.json-shaped documents
//!
//! Dependency constraints (`version>=`, `version==`) carry no scheme of their
//! own; they are parsed under the target port's declared scheme, so all
//! documents are read once for names and schemes before any dependency is
//! interpreted.

use super::{
    Dependency, FeatureParagraph, ManifestCatalog, PlatformExpr, PortManifest, VersionConstraint,
};
use crate::error::{Error, Result};
use crate::version::{
    SchemedVersion, VersionScheme, schemed_version_from_json, serialize_schemed_version,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawManifest {
    name: String,
    #[serde(default)]
    default_features: Vec<String>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    #[serde(default)]
    features: BTreeMap<String, RawFeature>,
    #[serde(default)]
    supports: Option<String>,
    /// Version fields, read by `schemed_version_from_json`
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Name(String),
    Detailed(RawDependencyObject),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawDependencyObject {
    name: String,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default = "default_true")]
    default_features: bool,
    #[serde(default)]
    host: bool,
    #[serde(default)]
    platform: Option<String>,
    #[serde(rename = "version>=", default)]
    minimum: Option<String>,
    #[serde(rename = "version==", default)]
    exact: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFeature {
    #[serde(default)]
    description: String,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
}

fn default_true() -> bool {
    true
}

impl ManifestCatalog {
    /// Build a catalog from manifest JSON documents
    pub fn from_json_documents<I, S>(documents: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut raws = Vec::new();
        let mut versions: HashMap<String, SchemedVersion> = HashMap::new();

        for document in documents {
            let raw: RawManifest = serde_json::from_str(document.as_ref())?;
            let parent = format!("manifest '{}'", raw.name);
            let version = schemed_version_from_json(&parent, &raw.rest, false)?;
            if versions.insert(raw.name.clone(), version).is_some() {
                return Err(Error::ManifestError(format!(
                    "port '{}' is defined more than once",
                    raw.name
                )));
            }
            raws.push(raw);
        }

        let schemes: HashMap<&str, VersionScheme> = versions
            .iter()
            .map(|(name, v)| (name.as_str(), v.scheme))
            .collect();

        let mut catalog = ManifestCatalog::new();
        for raw in &raws {
            let version = versions[&raw.name].clone();
            let manifest = convert_manifest(raw, version, &schemes)?;
            debug!(
                "Loaded manifest {} {} ({} dependencies, {} features)",
                manifest.name,
                manifest.version,
                manifest.dependencies.len(),
                manifest.features.len()
            );
            catalog.insert(manifest);
        }

        Ok(catalog)
    }
}

impl PortManifest {
    /// Parse a single manifest whose dependency targets have `schemes`
    pub fn from_json(text: &str, schemes: &HashMap<&str, VersionScheme>) -> Result<Self> {
        let raw: RawManifest = serde_json::from_str(text)?;
        let parent = format!("manifest '{}'", raw.name);
        let version = schemed_version_from_json(&parent, &raw.rest, false)?;

        let mut known: HashMap<&str, VersionScheme> =
            schemes.iter().map(|(name, scheme)| (*name, *scheme)).collect();
        known.insert(raw.name.as_str(), version.scheme);
        convert_manifest(&raw, version, &known)
    }

    /// Render the manifest back to its JSON document form
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("name".to_string(), Value::String(self.name.clone()));
        serialize_schemed_version(
            &mut out,
            self.version.scheme,
            self.version.version.text(),
            self.version.version.port_version(),
            false,
        );
        if !self.default_features.is_empty() {
            out.insert("default-features".to_string(), json!(self.default_features));
        }
        if let Some(supports) = &self.supports {
            out.insert("supports".to_string(), Value::String(supports.to_string()));
        }
        if !self.dependencies.is_empty() {
            out.insert(
                "dependencies".to_string(),
                Value::Array(self.dependencies.iter().map(dependency_to_json).collect()),
            );
        }
        if !self.features.is_empty() {
            let features: Map<String, Value> = self
                .features
                .iter()
                .map(|(name, paragraph)| {
                    let mut obj = Map::new();
                    obj.insert(
                        "description".to_string(),
                        Value::String(paragraph.description.clone()),
                    );
                    if !paragraph.dependencies.is_empty() {
                        obj.insert(
                            "dependencies".to_string(),
                            Value::Array(
                                paragraph.dependencies.iter().map(dependency_to_json).collect(),
                            ),
                        );
                    }
                    (name.clone(), Value::Object(obj))
                })
                .collect();
            out.insert("features".to_string(), Value::Object(features));
        }
        Value::Object(out)
    }
}

fn convert_manifest(
    raw: &RawManifest,
    version: SchemedVersion,
    schemes: &HashMap<&str, VersionScheme>,
) -> Result<PortManifest> {
    let supports = raw
        .supports
        .as_deref()
        .map(PlatformExpr::parse)
        .transpose()?;

    let dependencies = raw
        .dependencies
        .iter()
        .map(|d| convert_dependency(&raw.name, d, schemes))
        .collect::<Result<Vec<_>>>()?;

    let mut features = BTreeMap::new();
    for (name, feature) in &raw.features {
        let dependencies = feature
            .dependencies
            .iter()
            .map(|d| convert_dependency(&raw.name, d, schemes))
            .collect::<Result<Vec<_>>>()?;
        features.insert(
            name.clone(),
            FeatureParagraph {
                description: feature.description.clone(),
                dependencies,
            },
        );
    }

    for default in &raw.default_features {
        if !features.contains_key(default) {
            return Err(Error::UnknownFeature {
                port: raw.name.clone(),
                feature: default.clone(),
            });
        }
    }

    Ok(PortManifest {
        name: raw.name.clone(),
        version,
        default_features: raw.default_features.clone(),
        dependencies,
        features,
        supports,
    })
}

fn convert_dependency(
    owner: &str,
    raw: &RawDependency,
    schemes: &HashMap<&str, VersionScheme>,
) -> Result<Dependency> {
    let obj = match raw {
        RawDependency::Name(name) => return Ok(Dependency::new(name.clone())),
        RawDependency::Detailed(obj) => obj,
    };

    let mut dependency = Dependency::new(obj.name.clone()).with_features(obj.features.clone());
    dependency.default_features = obj.default_features;
    dependency.host = obj.host;
    dependency.platform = obj
        .platform
        .as_deref()
        .map(PlatformExpr::parse)
        .transpose()?;

    let constraint = match (&obj.minimum, &obj.exact) {
        (Some(_), Some(_)) => {
            return Err(Error::ManifestError(format!(
                "{owner}: dependency '{}' sets both 'version>=' and 'version=='",
                obj.name
            )));
        }
        (Some(text), None) => Some((text, false)),
        (None, Some(text)) => Some((text, true)),
        (None, None) => None,
    };

    if let Some((text, exact)) = constraint {
        let scheme = schemes.get(obj.name.as_str()).copied().ok_or_else(|| {
            Error::ManifestError(format!(
                "{owner}: version constraint on '{}' whose scheme is unknown",
                obj.name
            ))
        })?;
        let version = SchemedVersion::parse(text, scheme)?;
        dependency.constraint = Some(if exact {
            VersionConstraint::exact(version)
        } else {
            VersionConstraint::minimum(version)
        });
    }

    Ok(dependency)
}

fn dependency_to_json(dependency: &Dependency) -> Value {
    let plain = dependency.features.is_empty()
        && dependency.default_features
        && !dependency.host
        && dependency.platform.is_none()
        && dependency.constraint.is_none();
    if plain {
        return Value::String(dependency.name.clone());
    }

    let mut obj = Map::new();
    obj.insert("name".to_string(), Value::String(dependency.name.clone()));
    if !dependency.features.is_empty() {
        obj.insert("features".to_string(), json!(dependency.features));
    }
    if !dependency.default_features {
        obj.insert("default-features".to_string(), Value::Bool(false));
    }
    if dependency.host {
        obj.insert("host".to_string(), Value::Bool(true));
    }
    if let Some(platform) = &dependency.platform {
        obj.insert("platform".to_string(), Value::String(platform.to_string()));
    }
    if let Some(constraint) = &dependency.constraint {
        let key = match constraint.kind {
            super::ConstraintKind::Minimum => "version>=",
            super::ConstraintKind::Exact => "version==",
        };
        obj.insert(
            key.to_string(),
            Value::String(constraint.version.version.to_string()),
        );
    }
    Value::Object(obj)
}
