// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! raythena-harvester: the boundary between this dispatcher and the
//! external workload-management system ("Harvester").
//!
//! A [`HarvesterAdapter`] owns three bounded channels — requests in, jobs
//! out, ranges out — and runs as its own task translating whatever wire
//! format the real Harvester speaks into [`raythena_wire`] DTOs. Two
//! implementations ship here: [`MockAdapter`] for tests and
//! [`FileMessengerAdapter`] for the filesystem-drop-box protocol variant.

mod error;
mod file_messenger;
mod mock;

pub use error::HarvesterError;
pub use file_messenger::FileMessengerAdapter;
pub use mock::MockAdapter;

use async_trait::async_trait;
use raythena_core::{EventRange, Job, PandaId};
use raythena_wire::RangeRequestEntry;
use tokio::sync::mpsc;

/// One outstanding request for more event ranges, as queued by the Driver.
#[derive(Debug, Clone)]
pub struct RangeRequest {
    pub panda_id: PandaId,
    pub entry: RangeRequestEntry,
}

/// A reply to a [`RangeRequest`]: the ranges fetched, possibly empty to
/// signal exhaustion.
#[derive(Debug, Clone)]
pub struct RangeReply {
    pub panda_id: PandaId,
    pub ranges: Vec<EventRange>,
}

/// Channel handles the Driver uses to talk to a running adapter task.
pub struct HarvesterHandle {
    pub job_requests: mpsc::Sender<()>,
    pub range_requests: mpsc::Sender<RangeRequest>,
    pub jobs: mpsc::Receiver<Vec<Job>>,
    pub ranges: mpsc::Receiver<RangeReply>,
}

/// Implemented by every concrete Harvester transport. `run` consumes the
/// adapter and spawns the task that owns it; the returned [`HarvesterHandle`]
/// is the Driver's only contact with it from then on (spec §4.5: "the
/// adapter runs on its own task/thread, communication only through the
/// three queues").
#[async_trait]
pub trait HarvesterAdapter: Send + 'static {
    /// Spawn the task that owns this adapter and start it running.
    fn run(self) -> HarvesterHandle;
}

pub(crate) const CHANNEL_CAPACITY: usize = 64;
