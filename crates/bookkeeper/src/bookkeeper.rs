// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

//! The top-level registry composing job admission, range tracking, and
//! worker ownership into the single object the Driver drives.

use crate::panda_job_queue::PandaJobQueue;
use crate::worker_assignment::WorkerAssignment;
use raythena_core::{EventRange, Job, PandaId, WorkerId};
use std::collections::HashMap;
use tracing::{debug, info};

/// Owns every job, every event range, and every worker's current
/// assignment. One instance lives for the lifetime of a driver run and is
/// never shared — see `raythena-driver` for the owning task.
#[derive(Debug, Default)]
pub struct BookKeeper {
    jobs: PandaJobQueue,
    workers: HashMap<WorkerId, WorkerAssignment>,
}

impl BookKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_worker(&mut self, worker_id: WorkerId) {
        self.workers.entry(worker_id).or_insert_with(WorkerAssignment::new);
    }

    pub fn job(&self, panda_id: &PandaId) -> Option<&Job> {
        self.jobs.get(panda_id)
    }

    /// Admit newly-fetched jobs from Harvester.
    pub fn add_jobs(&mut self, jobs: Vec<Job>) {
        info!(count = jobs.len(), "admitting jobs");
        self.jobs.add_jobs(jobs);
    }

    /// Admit event ranges fetched for one job, or flag exhaustion on an
    /// empty reply.
    pub fn add_event_ranges(&mut self, panda_id: &PandaId, ranges: Vec<EventRange>) {
        debug!(panda_id = %panda_id, count = ranges.len(), "admitting event ranges");
        self.jobs.process_event_ranges_reply(panda_id, ranges);
    }

    pub fn has_jobs_ready(&self) -> bool {
        self.jobs.has_jobs_ready()
    }

    /// Earliest-admitted job with ranges ready to dispatch, if any.
    pub fn jobid_next_job_to_process(&self) -> Option<PandaId> {
        self.jobs.jobid_next_job_to_process().map(|(id, _)| id)
    }

    /// Bind `worker_id` to `panda_id` as its current job. Spec §4.2: "If
    /// the worker was already bound to a different job, the old
    /// assignment is released first" — any ranges still owned from that
    /// prior job are returned to its `Available` bucket before rebinding,
    /// mirroring `process_actor_end`.
    pub fn assign_job_to_actor(&mut self, worker_id: &WorkerId, panda_id: PandaId) {
        {
            let assignment = self.workers.entry(worker_id.clone()).or_insert_with(WorkerAssignment::new);
            let prior = assignment.current_job().cloned();
            if prior.as_ref().is_some_and(|prior| *prior != panda_id) {
                let owned = assignment.take_owned();
                let prior = prior.expect("checked above");
                if let Some(queue) = self.jobs.get_eventranges_mut(&prior) {
                    for id in owned {
                        queue.release_to_available(&id);
                    }
                }
                info!(worker_id = %worker_id, panda_id = %prior, "released prior job's ranges on reassignment");
            }
        }
        let assignment = self.workers.entry(worker_id.clone()).or_insert_with(WorkerAssignment::new);
        assignment.set_current_job(panda_id);
    }

    /// Pull up to `n` ranges for the job currently assigned to `worker_id`,
    /// transferring ownership to that worker. Returns an empty vec if the
    /// worker has no current job or the job has none available (P6: never
    /// blocks).
    pub fn fetch_event_ranges(&mut self, worker_id: &WorkerId, n: usize) -> Vec<EventRange> {
        let Some(assignment) = self.workers.get_mut(worker_id) else { return Vec::new() };
        let Some(panda_id) = assignment.current_job().cloned() else { return Vec::new() };
        let Some(queue) = self.jobs.get_eventranges_mut(&panda_id) else { return Vec::new() };
        let taken = queue.take_available(n);
        assignment.add_owned(taken.iter().map(|r| r.event_range_id.clone()));
        taken
    }

    /// Apply a batch of range-status updates reported by `worker_id`,
    /// against the job it currently owns. Ranges that become `Done` or
    /// `Failed` are removed from `worker_id`'s owned set (invariant R2);
    /// ranges reported `Running` remain owned.
    pub fn process_event_ranges_update(
        &mut self,
        worker_id: &WorkerId,
        panda_id: &PandaId,
        updates: &[raythena_wire::RangeUpdateEntry],
    ) {
        let Some(queue) = self.jobs.get_eventranges_mut(panda_id) else {
            debug!(panda_id = %panda_id, "update for unknown job ignored");
            return;
        };
        let mut released = Vec::new();
        for entry in updates {
            if let Some(new_status) = queue.apply_update(entry) {
                if new_status.is_terminal() {
                    released.push(raythena_core::EventRangeId::new(entry.event_range_id.clone()));
                }
            }
        }
        if released.is_empty() {
            return;
        }
        let Some(assignment) = self.workers.get_mut(worker_id) else { return };
        for id in &released {
            assignment.remove_owned(id);
        }
    }

    /// Release every range still owned by a terminating worker back to its
    /// job's `Available` bucket, then clear the worker's assignment
    /// (spec §4.2 `process_actor_end`, invariant P4).
    pub fn process_actor_end(&mut self, worker_id: &WorkerId) {
        let Some(assignment) = self.workers.get_mut(worker_id) else { return };
        let panda_id = assignment.current_job().cloned();
        let owned = assignment.take_owned();
        assignment.clear_current_job();
        let Some(panda_id) = panda_id else { return };
        let Some(queue) = self.jobs.get_eventranges_mut(&panda_id) else { return };
        for id in owned {
            queue.release_to_available(&id);
        }
        info!(worker_id = %worker_id, panda_id = %panda_id, "released orphaned ranges on worker end");
    }

    pub fn n_ready(&self, panda_id: &PandaId) -> usize {
        self.jobs.n_ready(panda_id)
    }

    pub fn is_flagged_no_more_events(&self, panda_id: &PandaId) -> bool {
        self.jobs.is_flagged_no_more_events(panda_id)
    }

    pub fn get_nranges(&self) -> usize {
        self.jobs.get_nranges()
    }

    /// Admitted `PandaID`s in insertion order — used by the Driver to
    /// drive bootstrap range prefetch and the steady-state watermark
    /// check (spec §4.4).
    pub fn panda_ids(&self) -> impl Iterator<Item = &PandaId> {
        self.jobs.panda_ids()
    }

    /// Ranges currently owned by `worker_id` — test/scenario introspection
    /// only, not used by the Driver's dispatch logic itself.
    #[cfg(any(test, feature = "test-support"))]
    pub fn owned_ranges(&self, worker_id: &WorkerId) -> Vec<raythena_core::EventRangeId> {
        self.workers.get(worker_id).map(|a| a.owned_ranges().cloned().collect()).unwrap_or_default()
    }
}
