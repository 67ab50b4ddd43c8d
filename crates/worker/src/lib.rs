// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! raythena-worker: the per-node actor that pairs a payload subprocess
//! with a localhost HTTP shim translating its PanDA-flavored REST calls
//! into [`raythena_wire::WorkerMessage`]s for the Driver.

mod actor;
mod buffer;
mod command;
mod error;
mod router;
mod shim;
mod state;

pub use actor::WorkerActor;
pub use command::PayloadCommandBuilder;
pub use error::WorkerError;
pub use shim::{serve_shim, ShimHandle};
pub use state::WorkerState;

use raythena_core::WorkerId;
use raythena_wire::WorkerMessage;
use tokio::sync::mpsc;

/// The channel pair a `WorkerActor` and the Driver use to exchange
/// messages: `up` carries requests/updates from the worker, `down` carries
/// the Driver's replies.
pub struct WorkerChannels {
    pub up_tx: mpsc::Sender<WorkerMessage>,
    pub down_rx: mpsc::Receiver<WorkerMessage>,
}

/// Identity parameters for one worker actor instance.
#[derive(Debug, Clone)]
pub struct WorkerIdentity {
    pub worker_id: WorkerId,
}
