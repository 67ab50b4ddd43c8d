// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! raythena-bookkeeper: the authoritative in-memory registry of jobs,
//! event ranges, and worker ownership.
//!
//! Single-threaded by contract: every method here is synchronous and
//! expects to be called from one owning task (the Driver's control loop —
//! see `raythena-driver`). Nothing in this crate spawns a task or takes a
//! lock; concurrency safety comes entirely from having exactly one owner.

mod bookkeeper;
mod event_range_queue;
mod panda_job_queue;
mod worker_assignment;

pub use bookkeeper::BookKeeper;
pub use event_range_queue::EventRangeQueue;
pub use panda_job_queue::PandaJobQueue;
pub use worker_assignment::WorkerAssignment;
