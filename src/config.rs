// src/config.rs

//! TOML configuration of a resolution run
//!
//! ```toml
//! [resolver]
//! default-triplet = "x64-linux"
//! host-triplet = "x64-linux"
//! install = ["zlib", "curl[ssl]:arm64-osx"]
//!
//! [overrides]
//! fmt = "9.1.0"
//!
//! [remove]
//! purge = true
//! ```

use crate::package::{FullPackageSpec, Triplet};
use crate::remove::RemoveOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Triplet used when neither the file nor a request names one
pub const DEFAULT_TRIPLET: &str = "x64-linux";

/// Errors from loading or validating a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid triplet: {0}")]
    InvalidTriplet(String),

    #[error("Invalid install entry: {0}")]
    InvalidInstall(String),

    #[error("Invalid override: {0}")]
    InvalidOverride(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub resolver: ResolverSection,

    /// Port name -> version text that wins over every other constraint
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,

    #[serde(default)]
    pub remove: RemoveOptions,
}

/// `[resolver]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolverSection {
    #[serde(default = "default_triplet")]
    pub default_triplet: String,

    /// Defaults to the default triplet
    #[serde(default)]
    pub host_triplet: Option<String>,

    /// Package specs to install
    #[serde(default)]
    pub install: Vec<String>,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            default_triplet: default_triplet(),
            host_triplet: None,
            install: Vec::new(),
        }
    }
}

fn default_triplet() -> String {
    DEFAULT_TRIPLET.to_string()
}

impl ResolverConfig {
    /// Check triplets, install specs and overrides
    pub fn validate(&self) -> ConfigResult<()> {
        self.default_triplet()?;
        self.host_triplet()?;
        self.requests()?;

        for (port, version) in &self.overrides {
            if version.trim().is_empty() {
                return Err(ConfigError::InvalidOverride(format!(
                    "Empty override version for port '{port}'"
                )));
            }
        }
        Ok(())
    }

    pub fn default_triplet(&self) -> ConfigResult<Triplet> {
        Triplet::new(self.resolver.default_triplet.as_str())
            .map_err(|e| ConfigError::InvalidTriplet(e.to_string()))
    }

    pub fn host_triplet(&self) -> ConfigResult<Triplet> {
        match &self.resolver.host_triplet {
            Some(host) => Triplet::new(host.as_str())
                .map_err(|e| ConfigError::InvalidTriplet(e.to_string())),
            None => self.default_triplet(),
        }
    }

    /// Install entries as package specs, defaulting the triplet
    pub fn requests(&self) -> ConfigResult<Vec<FullPackageSpec>> {
        let triplet = self.default_triplet()?;
        self.resolver
            .install
            .iter()
            .map(|entry| {
                FullPackageSpec::parse(entry, &triplet)
                    .map_err(|e| ConfigError::InvalidInstall(e.to_string()))
            })
            .collect()
    }

    pub fn remove_options(&self) -> RemoveOptions {
        self.remove
    }
}

/// Parse and validate a configuration file
pub fn parse_config_file(path: &Path) -> ConfigResult<ResolverConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse and validate configuration text
pub fn parse_config_str(content: &str) -> ConfigResult<ResolverConfig> {
    let config: ResolverConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}
