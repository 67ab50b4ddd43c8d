// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

use thiserror::Error;

/// Configuration load/validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config as TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required config key: {0}")]
    MissingKey(String),

    #[error("unknown config section: {0}")]
    UnknownSection(String),
}

/// Failures surfaced by the Driver's control loop.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("harvester upstream unavailable: {0}")]
    HarvesterUnavailable(String),

    #[error(transparent)]
    Worker(#[from] raythena_worker::WorkerError),

    #[error("an internal invariant was violated: {0}")]
    InternalInvariant(String),
}
