// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

use thiserror::Error;

/// Failures reaching across the Harvester boundary.
#[derive(Debug, Error)]
pub enum HarvesterError {
    #[error("harvester endpoint unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("malformed message from harvester: {0}")]
    Protocol(String),

    #[error("drop-box io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("drop-box message was not valid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
