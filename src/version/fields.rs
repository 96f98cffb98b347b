// src/version/fields.rs

//! JSON field encoding of schemed versions
//!
//! A schemed version is stored as exactly one of `version`, `version-semver`,
//! `version-date` or `version-string`, plus an optional `port-version`.

use super::{SchemedVersion, Version, VersionScheme};
use crate::error::{Error, Result};
use serde_json::{Map, Value};

const PORT_VERSION: &str = "port-version";

/// Every field a schemed version may occupy
pub const SCHEMED_FIELDS: [&str; 5] = [
    "version",
    "version-semver",
    "version-date",
    "version-string",
    PORT_VERSION,
];

fn field_for(scheme: VersionScheme) -> &'static str {
    match scheme {
        VersionScheme::Relaxed => "version",
        VersionScheme::Semver => "version-semver",
        VersionScheme::Date => "version-date",
        VersionScheme::String => "version-string",
    }
}

/// Read the schemed version of `parent_type` from a JSON object
///
/// With `allow_hash_portversion` the version text may carry `#N`, which
/// cannot be combined with an explicit `port-version` field.
pub fn schemed_version_from_json(
    parent_type: &str,
    obj: &Map<String, Value>,
    allow_hash_portversion: bool,
) -> Result<SchemedVersion> {
    let schemes = [
        VersionScheme::Relaxed,
        VersionScheme::Semver,
        VersionScheme::Date,
        VersionScheme::String,
    ];

    let mut found: Option<(VersionScheme, &str)> = None;
    for scheme in schemes {
        let field = field_for(scheme);
        let Some(value) = obj.get(field) else {
            continue;
        };
        let text = value.as_str().ok_or_else(|| {
            Error::ManifestError(format!("{parent_type}: '{field}' must be a string"))
        })?;
        if let Some((previous, _)) = found {
            return Err(Error::ManifestError(format!(
                "{parent_type}: '{}' and '{field}' are mutually exclusive",
                field_for(previous)
            )));
        }
        found = Some((scheme, text));
    }

    let (scheme, text) = found.ok_or_else(|| {
        Error::ManifestError(format!(
            "{parent_type}: expected one of version, version-semver, version-date, version-string"
        ))
    })?;

    let explicit_port_version = match obj.get(PORT_VERSION) {
        None => None,
        Some(value) => {
            let n = value.as_u64().ok_or_else(|| {
                Error::ManifestError(format!(
                    "{parent_type}: 'port-version' must be a non-negative integer"
                ))
            })?;
            let n = u32::try_from(n).map_err(|_| {
                Error::ManifestError(format!("{parent_type}: 'port-version' {n} is out of range"))
            })?;
            Some(n)
        }
    };

    if text.contains('#') {
        if !allow_hash_portversion {
            return Err(Error::ManifestError(format!(
                "{parent_type}: '#' is not allowed in version text '{text}', use 'port-version'"
            )));
        }
        if explicit_port_version.is_some() {
            return Err(Error::ManifestError(format!(
                "{parent_type}: '{text}' embeds a port-version and also sets 'port-version'"
            )));
        }
        return SchemedVersion::parse(text, scheme);
    }

    let version = Version::with_port_version(text, explicit_port_version.unwrap_or(0), scheme)?;
    Ok(SchemedVersion::new(scheme, version))
}

/// Write a schemed version into `out` using the scheme's field name
pub fn serialize_schemed_version(
    out: &mut Map<String, Value>,
    scheme: VersionScheme,
    version: &str,
    port_version: u32,
    always_emit_port_version: bool,
) {
    out.insert(field_for(scheme).to_string(), Value::String(version.to_string()));
    if port_version != 0 || always_emit_port_version {
        out.insert(PORT_VERSION.to_string(), Value::from(port_version));
    }
}
