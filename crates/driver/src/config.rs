// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

//! TOML-backed configuration, validated the way the original's
//! `Config._validate_section` walk did: every missing required key is
//! named by its full dotted path rather than failing on the first
//! deserialize error.

use crate::ConfigError;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PayloadConfig {
    #[serde(default)]
    pub bindir: String,
    #[serde(default)]
    pub scratch_root: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HarvesterConfig {
    #[serde(default)]
    pub endpoint: String,
    /// `"file"` or `"mock"` — which adapter implementation to wire up.
    #[serde(default = "default_harvester_kind")]
    pub kind: String,
}

fn default_harvester_kind() -> String {
    "file".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ClusterConfig {
    #[serde(default = "default_n_workers")]
    pub n_workers: u32,
}

fn default_n_workers() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResourcesConfig {
    #[serde(default)]
    pub core_per_node: u32,
    /// Fixed port for the worker HTTP shim. `None`/absent falls back to an
    /// OS-assigned ephemeral port (see the open-question note in
    /// DESIGN.md).
    #[serde(default)]
    pub worker_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub payload: PayloadConfig,
    #[serde(default)]
    pub harvester: HarvesterConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

const KNOWN_SECTIONS: &[&str] = &["payload", "harvester", "cluster", "resources", "logging"];

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config = Self::parse_unvalidated(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and reject unknown sections without validating required
    /// keys — lets a caller (the CLI) apply `--section-key` overrides
    /// before the missing-key walk runs, mirroring the original's
    /// parse-then-override-then-validate order (spec §6).
    pub fn parse_unvalidated(raw: &str) -> Result<Self, ConfigError> {
        let value: toml::Value = raw.parse()?;
        if let Some(table) = value.as_table() {
            for key in table.keys() {
                if !KNOWN_SECTIONS.contains(&key.as_str()) {
                    return Err(ConfigError::UnknownSection(key.clone()));
                }
            }
        }
        value.try_into().map_err(ConfigError::Parse)
    }

    /// Walk every required key, naming the first missing one by its full
    /// dotted path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.payload.bindir.is_empty() {
            return Err(ConfigError::MissingKey("payload.bindir".into()));
        }
        if self.payload.scratch_root.is_empty() {
            return Err(ConfigError::MissingKey("payload.scratch_root".into()));
        }
        if self.harvester.endpoint.is_empty() && self.harvester.kind == "file" {
            return Err(ConfigError::MissingKey("harvester.endpoint".into()));
        }
        if self.cluster.n_workers == 0 {
            return Err(ConfigError::MissingKey("cluster.n_workers".into()));
        }
        Ok(())
    }
}
