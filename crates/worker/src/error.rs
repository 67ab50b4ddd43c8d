// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

use thiserror::Error;

/// Failures owning or driving one worker actor.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to bind local shim listener: {0}")]
    ShimBind(#[source] std::io::Error),

    #[error("failed to spawn payload process: {0}")]
    PayloadSpawn(#[source] std::io::Error),

    #[error("failed to prepare workdir {path}: {source}")]
    WorkdirSetup {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker crashed: {0}")]
    WorkerCrash(String),

    #[error("driver channel closed")]
    ChannelClosed,
}
