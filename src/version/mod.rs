// src/version/mod.rs

//! Version handling for port manifests and baselines
//!
//! A [`Version`] is version text plus a port-version tiebreaker. The text is
//! only meaningful under a [`VersionScheme`], so ordering is defined on
//! [`SchemedVersion`] and only between versions of the same scheme.
//!
//! Textual form: `<text>` or `<text>#<port-version>` when the port-version is
//! non-zero. Parsing accepts both forms.

mod date;
mod fields;
mod relaxed;

pub use fields::{SCHEMED_FIELDS, schemed_version_from_json, serialize_schemed_version};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Ordering algorithm a port's version text is interpreted under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionScheme {
    /// Semantic versioning 2.0: `MAJOR.MINOR.PATCH[-pre][+build]`
    Semver,
    /// ISO-8601 date with optional numeric release sequence: `2024-01-31.2`
    Date,
    /// Opaque text, equal only to itself
    String,
    /// Numeric-aware dotted components with an optional `-qualifier`
    Relaxed,
}

impl VersionScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionScheme::Semver => "semver",
            VersionScheme::Date => "date",
            VersionScheme::String => "string",
            VersionScheme::Relaxed => "relaxed",
        }
    }
}

impl fmt::Display for VersionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionScheme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "semver" => Ok(VersionScheme::Semver),
            "date" => Ok(VersionScheme::Date),
            "string" => Ok(VersionScheme::String),
            "relaxed" => Ok(VersionScheme::Relaxed),
            _ => Err(format!("Invalid version scheme: {s}")),
        }
    }
}

/// Version text plus port-version
///
/// Immutable once constructed. Only built through [`Version::parse`], so the
/// text is always valid for the scheme it was parsed under. It deserializes
/// only as part of a [`SchemedVersion`], which supplies the scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Version {
    text: String,
    port_version: u32,
}

impl Version {
    /// Parse `text` (optionally suffixed with `#<port-version>`) under `scheme`
    ///
    /// Parsing is strict: text that does not match the scheme's grammar fails
    /// instead of being reinterpreted under another scheme.
    pub fn parse(text: &str, scheme: VersionScheme) -> Result<Self> {
        let (body, port_version) = split_port_version(text, scheme)?;
        validate(body, scheme)?;
        Ok(Self {
            text: body.to_string(),
            port_version,
        })
    }

    /// Parse bare version text with a separately supplied port-version
    pub fn with_port_version(text: &str, port_version: u32, scheme: VersionScheme) -> Result<Self> {
        validate(text, scheme)?;
        Ok(Self {
            text: text.to_string(),
            port_version,
        })
    }

    /// Version text without the port-version
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn port_version(&self) -> u32 {
        self.port_version
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)?;
        if self.port_version > 0 {
            write!(f, "#{}", self.port_version)?;
        }
        Ok(())
    }
}

/// A version together with the scheme it must be compared under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SchemedVersionRepr")]
pub struct SchemedVersion {
    pub scheme: VersionScheme,
    pub version: Version,
}

/// Wire shape of [`SchemedVersion`] before the text is checked
#[derive(Deserialize)]
struct SchemedVersionRepr {
    scheme: VersionScheme,
    version: VersionRepr,
}

#[derive(Deserialize)]
struct VersionRepr {
    text: String,
    port_version: u32,
}

impl TryFrom<SchemedVersionRepr> for SchemedVersion {
    type Error = Error;

    fn try_from(repr: SchemedVersionRepr) -> Result<Self> {
        let version =
            Version::with_port_version(&repr.version.text, repr.version.port_version, repr.scheme)?;
        Ok(Self::new(repr.scheme, version))
    }
}

impl SchemedVersion {
    pub fn new(scheme: VersionScheme, version: Version) -> Self {
        Self { scheme, version }
    }

    /// Parse `text` under `scheme`
    pub fn parse(text: &str, scheme: VersionScheme) -> Result<Self> {
        Ok(Self {
            scheme,
            version: Version::parse(text, scheme)?,
        })
    }

    /// Scheme-aware comparison, see [`compare`]
    pub fn compare(&self, other: &SchemedVersion) -> Result<Ordering> {
        compare(self, other)
    }
}

impl fmt::Display for SchemedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)
    }
}

/// Parse `text` under `scheme`
pub fn parse(text: &str, scheme: VersionScheme) -> Result<Version> {
    Version::parse(text, scheme)
}

/// Compare two schemed versions
///
/// Only defined when both sides share a scheme; otherwise
/// [`Error::SchemeMismatch`]. The port-version is consulted only after the
/// version text compares equal, and a higher port-version is greater.
pub fn compare(a: &SchemedVersion, b: &SchemedVersion) -> Result<Ordering> {
    if a.scheme != b.scheme {
        return Err(Error::SchemeMismatch {
            port: None,
            expected: a.scheme,
            found: b.scheme,
            sources: vec![format!("{} vs {}", a.version, b.version)],
        });
    }

    match compare_text(a.scheme, &a.version.text, &b.version.text)? {
        Ordering::Equal => Ok(a.version.port_version.cmp(&b.version.port_version)),
        ord => Ok(ord),
    }
}

/// Compare primary version text under one scheme
fn compare_text(scheme: VersionScheme, a: &str, b: &str) -> Result<Ordering> {
    match scheme {
        VersionScheme::Semver => {
            let lhs = parse_semver(a)?;
            let rhs = parse_semver(b)?;
            // Build metadata does not take part in precedence. An empty
            // prerelease sorts above every non-empty one.
            Ok((lhs.major, lhs.minor, lhs.patch, &lhs.pre)
                .cmp(&(rhs.major, rhs.minor, rhs.patch, &rhs.pre)))
        }
        VersionScheme::Date => {
            let lhs = date::DateVersion::parse(a)?;
            let rhs = date::DateVersion::parse(b)?;
            Ok(lhs.cmp(&rhs))
        }
        VersionScheme::Relaxed => {
            let lhs = relaxed::RelaxedVersion::parse(a)?;
            let rhs = relaxed::RelaxedVersion::parse(b)?;
            Ok(lhs.compare(&rhs))
        }
        VersionScheme::String => {
            if a == b {
                Ok(Ordering::Equal)
            } else {
                Err(Error::IncomparableVersions {
                    scheme,
                    left: a.to_string(),
                    right: b.to_string(),
                })
            }
        }
    }
}

fn validate(text: &str, scheme: VersionScheme) -> Result<()> {
    match scheme {
        VersionScheme::Semver => parse_semver(text).map(|_| ()),
        VersionScheme::Date => date::DateVersion::parse(text).map(|_| ()),
        VersionScheme::Relaxed => relaxed::RelaxedVersion::parse(text).map(|_| ()),
        VersionScheme::String => {
            if text.is_empty() {
                Err(parse_error(text, scheme, "version text is empty"))
            } else {
                Ok(())
            }
        }
    }
}

fn parse_semver(text: &str) -> Result<semver::Version> {
    semver::Version::parse(text)
        .map_err(|e| parse_error(text, VersionScheme::Semver, &e.to_string()))
}

/// Split `1.2.3#4` into (`1.2.3`, 4)
fn split_port_version(text: &str, scheme: VersionScheme) -> Result<(&str, u32)> {
    match text.split_once('#') {
        None => Ok((text, 0)),
        Some((body, port)) => {
            if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
                return Err(parse_error(
                    text,
                    scheme,
                    "port-version must be a non-negative integer",
                ));
            }
            let port_version = port
                .parse::<u32>()
                .map_err(|e| parse_error(text, scheme, &format!("invalid port-version: {e}")))?;
            Ok((body, port_version))
        }
    }
}

pub(crate) fn parse_error(text: &str, scheme: VersionScheme, reason: &str) -> Error {
    Error::ParseError {
        text: text.to_string(),
        scheme,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sv(text: &str, scheme: VersionScheme) -> SchemedVersion {
        SchemedVersion::parse(text, scheme).unwrap()
    }

    #[test]
    fn test_deserialize_checks_text_against_scheme() {
        let valid = r#"{"scheme":"semver","version":{"text":"1.2.3","port_version":2}}"#;
        let parsed: SchemedVersion = serde_json::from_str(valid).unwrap();
        assert_eq!(parsed, sv("1.2.3#2", VersionScheme::Semver));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), valid);

        for invalid in [
            r#"{"scheme":"semver","version":{"text":"1.2","port_version":0}}"#,
            r#"{"scheme":"date","version":{"text":"2024-13-01","port_version":0}}"#,
            r#"{"scheme":"string","version":{"text":"","port_version":0}}"#,
        ] {
            let err = serde_json::from_str::<SchemedVersion>(invalid).unwrap_err();
            assert!(err.to_string().contains("version"), "{invalid}: {err}");
        }
    }

    #[test]
    fn test_parse_with_port_version() {
        let v = Version::parse("1.2.3#4", VersionScheme::Semver).unwrap();
        assert_eq!(v.text(), "1.2.3");
        assert_eq!(v.port_version(), 4);
        assert_eq!(v.to_string(), "1.2.3#4");
    }

    #[test]
    fn test_parse_zero_port_version_is_not_displayed() {
        let v = Version::parse("1.2.3#0", VersionScheme::Semver).unwrap();
        assert_eq!(v.to_string(), "1.2.3");
    }

    #[test]
    fn test_parse_rejects_bad_port_version() {
        assert!(Version::parse("1.2.3#", VersionScheme::Semver).is_err());
        assert!(Version::parse("1.2.3#-1", VersionScheme::Semver).is_err());
        assert!(Version::parse("1.2.3#x", VersionScheme::Semver).is_err());
    }

    #[test]
    fn test_semver_is_strict() {
        assert!(Version::parse("1.2", VersionScheme::Semver).is_err());
        assert!(Version::parse("01.2.3", VersionScheme::Semver).is_err());
        assert!(Version::parse("1.2.3-rc.1+build.5", VersionScheme::Semver).is_ok());
    }

    #[test]
    fn test_semver_numeric_precedence() {
        let a = sv("1.2.9", VersionScheme::Semver);
        let b = sv("1.2.10", VersionScheme::Semver);
        assert_eq!(compare(&a, &b).unwrap(), Ordering::Less);
    }

    #[test]
    fn test_semver_prerelease_below_release() {
        let a = sv("1.0.0-alpha", VersionScheme::Semver);
        let b = sv("1.0.0", VersionScheme::Semver);
        assert_eq!(compare(&a, &b).unwrap(), Ordering::Less);
        assert_eq!(compare(&b, &a).unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_semver_ignores_build_metadata() {
        let a = sv("1.0.0+a", VersionScheme::Semver);
        let b = sv("1.0.0+b", VersionScheme::Semver);
        assert_eq!(compare(&a, &b).unwrap(), Ordering::Equal);
    }

    #[test]
    fn test_port_version_breaks_ties() {
        let a = sv("1.2.0", VersionScheme::Semver);
        let b = sv("1.2.0#1", VersionScheme::Semver);
        assert_eq!(compare(&a, &b).unwrap(), Ordering::Less);
    }

    #[test]
    fn test_port_version_only_after_text() {
        let a = sv("1.2.0#9", VersionScheme::Semver);
        let b = sv("1.3.0", VersionScheme::Semver);
        assert_eq!(compare(&a, &b).unwrap(), Ordering::Less);
    }

    #[test]
    fn test_mismatched_schemes_fail() {
        let a = sv("1.2.0", VersionScheme::Semver);
        let b = sv("1.2.0", VersionScheme::Relaxed);
        assert!(matches!(compare(&a, &b), Err(Error::SchemeMismatch { .. })));
    }

    #[test]
    fn test_string_scheme_identity_only() {
        let a = sv("vista", VersionScheme::String);
        let b = sv("xp", VersionScheme::String);
        assert_eq!(compare(&a, &a).unwrap(), Ordering::Equal);
        assert!(matches!(
            compare(&a, &b),
            Err(Error::IncomparableVersions { .. })
        ));
    }

    #[test]
    fn test_string_scheme_port_version() {
        let a = sv("vista", VersionScheme::String);
        let b = sv("vista#2", VersionScheme::String);
        assert_eq!(compare(&a, &b).unwrap(), Ordering::Less);
    }

    #[test]
    fn test_string_scheme_rejects_empty() {
        assert!(Version::parse("", VersionScheme::String).is_err());
    }

    #[test]
    fn test_round_trip_all_schemes() {
        let cases = [
            ("1.2.3-rc.1#2", VersionScheme::Semver),
            ("2024-01-31.4.1", VersionScheme::Date),
            ("v1_2.3-beta.2#7", VersionScheme::Relaxed),
            ("some text", VersionScheme::String),
        ];
        for (text, scheme) in cases {
            let parsed = Version::parse(text, scheme).unwrap();
            let again = Version::parse(&parsed.to_string(), scheme).unwrap();
            assert_eq!(parsed, again, "round trip of {text}");
        }
    }

    #[test]
    fn test_scheme_from_str() {
        assert_eq!("date".parse::<VersionScheme>().unwrap(), VersionScheme::Date);
        assert!("calver".parse::<VersionScheme>().is_err());
    }
}
