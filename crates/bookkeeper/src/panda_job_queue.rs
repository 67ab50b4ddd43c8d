// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

//! Admitted-job registry, keyed by `PandaID`, preserving insertion order.

use crate::event_range_queue::EventRangeQueue;
use indexmap::IndexMap;
use raythena_core::{EventRange, Job, PandaId};
use tracing::debug;

/// The collection of admitted jobs plus each job's range queue.
///
/// Insertion order is preserved (`IndexMap`) so
/// [`jobid_next_job_to_process`](Self::jobid_next_job_to_process) can
/// apply the earliest-admitted-first policy spec §4.2 requires.
#[derive(Debug, Default)]
pub struct PandaJobQueue {
    jobs: IndexMap<PandaId, Job>,
    ranges: IndexMap<PandaId, EventRangeQueue>,
}

impl PandaJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, panda_id: &PandaId) -> Option<&Job> {
        self.jobs.get(panda_id)
    }

    pub fn contains(&self, panda_id: &PandaId) -> bool {
        self.jobs.contains_key(panda_id)
    }

    /// Admit a batch of jobs. Duplicate `PandaID`s are ignored — the
    /// first admission wins, insertion order is otherwise preserved.
    pub fn add_jobs(&mut self, jobs: Vec<Job>) {
        for job in jobs {
            let panda_id = job.panda_id.clone();
            if self.jobs.contains_key(&panda_id) {
                debug!(panda_id = %panda_id, "ignoring duplicate job admission");
                continue;
            }
            self.jobs.insert(panda_id.clone(), job);
            self.ranges.insert(panda_id, EventRangeQueue::new());
        }
    }

    pub fn get_eventranges(&self, panda_id: &PandaId) -> Option<&EventRangeQueue> {
        self.ranges.get(panda_id)
    }

    pub fn get_eventranges_mut(&mut self, panda_id: &PandaId) -> Option<&mut EventRangeQueue> {
        self.ranges.get_mut(panda_id)
    }

    /// Apply one `PandaID -> [range, ...]` entry from a Harvester reply.
    /// An empty list for a known job flags `no_more_events` (spec §4.2).
    pub fn process_event_ranges_reply(&mut self, panda_id: &PandaId, ranges: Vec<EventRange>) {
        let Some(queue) = self.ranges.get_mut(panda_id) else {
            debug!(panda_id = %panda_id, "ignoring range reply for unknown job");
            return;
        };
        if ranges.is_empty() {
            queue.flag_no_more_events();
        } else {
            queue.add_ranges(ranges);
        }
    }

    /// True iff any admitted job has at least one `Available` range.
    pub fn has_jobs_ready(&self) -> bool {
        self.ranges.values().any(|q| q.n_available() > 0)
    }

    /// Earliest-admitted job with a non-empty `Available` bucket, or
    /// `None` if nothing is ready (spec §4.2 selection policy).
    pub fn jobid_next_job_to_process(&self) -> Option<(PandaId, usize)> {
        self.jobs.keys().find_map(|panda_id| {
            let n = self.ranges.get(panda_id).map(EventRangeQueue::n_available).unwrap_or(0);
            (n > 0).then(|| (panda_id.clone(), n))
        })
    }

    pub fn n_ready(&self, panda_id: &PandaId) -> usize {
        self.ranges.get(panda_id).map(EventRangeQueue::n_available).unwrap_or(0)
    }

    pub fn is_flagged_no_more_events(&self, panda_id: &PandaId) -> bool {
        self.ranges.get(panda_id).map(EventRangeQueue::is_flagged_no_more_events).unwrap_or(false)
    }

    pub fn get_nranges(&self) -> usize {
        self.ranges.values().map(EventRangeQueue::n_available).sum()
    }

    /// Iterate admitted `PandaID`s in insertion order.
    pub fn panda_ids(&self) -> impl Iterator<Item = &PandaId> {
        self.jobs.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raythena_core::JobBuilder;

    #[test]
    fn add_jobs_dedups_by_first_write_wins() {
        let mut q = PandaJobQueue::new();
        q.add_jobs(vec![JobBuilder::new("1").task_id("a").build()]);
        q.add_jobs(vec![JobBuilder::new("1").task_id("b").build()]);
        assert_eq!(q.len(), 1);
        assert_eq!(q.get(&PandaId::new("1")).unwrap().task_id, "a");
    }

    #[test]
    fn jobid_next_job_to_process_honors_insertion_order() {
        let mut q = PandaJobQueue::new();
        q.add_jobs(vec![JobBuilder::new("1").build(), JobBuilder::new("2").build()]);
        q.process_event_ranges_reply(
            &PandaId::new("2"),
            vec![raythena_core::EventRange::new("r1", "pfn", 0, 1)],
        );
        q.process_event_ranges_reply(
            &PandaId::new("1"),
            vec![raythena_core::EventRange::new("r2", "pfn", 0, 1)],
        );
        let (next, n) = q.jobid_next_job_to_process().unwrap();
        assert_eq!(next, PandaId::new("1"));
        assert_eq!(n, 1);
    }

    #[test]
    fn empty_reply_flags_no_more_events() {
        let mut q = PandaJobQueue::new();
        q.add_jobs(vec![JobBuilder::new("1").build()]);
        assert!(!q.is_flagged_no_more_events(&PandaId::new("1")));
        q.process_event_ranges_reply(&PandaId::new("1"), vec![]);
        assert!(q.is_flagged_no_more_events(&PandaId::new("1")));
    }
}
