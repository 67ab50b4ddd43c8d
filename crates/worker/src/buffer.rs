// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

//! Shared state between a `WorkerActor` and its local HTTP shim: the
//! currently assigned job and the local range buffer the shim serves
//! `getEventRanges` calls from directly, without round-tripping to the
//! Driver per HTTP request (spec §3 `WorkerActor state`, §4.3).

use parking_lot::Mutex;
use raythena_core::{EventRange, Job};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// The actor's view of "the job currently being processed" plus the
/// ordered list of ranges still to hand to the payload.
#[derive(Default)]
pub struct ActorState {
    job: Mutex<Option<Job>>,
    ranges: Mutex<VecDeque<EventRange>>,
    no_more_ranges: AtomicBool,
}

impl ActorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_job(&self, job: Job) {
        *self.job.lock() = Some(job);
    }

    pub fn current_job(&self) -> Option<Job> {
        self.job.lock().clone()
    }

    /// Reset the range buffer for a fresh job round.
    pub fn start_new_round(&self) {
        self.ranges.lock().clear();
        self.no_more_ranges.store(false, Ordering::Relaxed);
    }

    pub fn push_ranges(&self, ranges: Vec<EventRange>) {
        self.ranges.lock().extend(ranges);
    }

    /// Pop up to `n` ranges off the front of the buffer, retaining the
    /// full remainder (spec §9 resolves the original's `ranges[n+1:]`
    /// off-by-one as a bug: this keeps `ranges[n:]`).
    pub fn take(&self, n: usize) -> Vec<EventRange> {
        let mut guard = self.ranges.lock();
        let take_n = n.min(guard.len());
        guard.drain(..take_n).collect()
    }

    pub fn len(&self) -> usize {
        self.ranges.lock().len()
    }

    pub fn mark_no_more_ranges(&self) {
        self.no_more_ranges.store(true, Ordering::Relaxed);
    }

    pub fn is_no_more_ranges(&self) -> bool {
        self.no_more_ranges.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raythena_core::EventRange;

    fn sample(n: usize) -> Vec<EventRange> {
        (0..n).map(|i| EventRange::new(format!("r{i}"), format!("pfn{i}"), 0, 1)).collect()
    }

    #[test]
    fn worker_buffer_keeps_full_remainder() {
        let state = ActorState::new();
        state.push_ranges(sample(5));
        let taken = state.take(2);
        assert_eq!(taken.len(), 2);
        // The original's `ranges[n+1:]` bug would drop r2, leaving 2 behind
        // instead of 3. This reimplementation must keep all of `ranges[n:]`.
        assert_eq!(state.len(), 3);
        let rest = state.take(10);
        assert_eq!(rest.len(), 3);
        assert_eq!(rest[0].event_range_id.as_str(), "r2");
    }

    #[test]
    fn take_never_exceeds_available() {
        let state = ActorState::new();
        state.push_ranges(sample(2));
        assert_eq!(state.take(10).len(), 2);
        assert!(state.take(10).is_empty());
    }

    #[test]
    fn start_new_round_clears_buffer_and_flag() {
        let state = ActorState::new();
        state.push_ranges(sample(3));
        state.mark_no_more_ranges();
        state.start_new_round();
        assert_eq!(state.len(), 0);
        assert!(!state.is_no_more_ranges());
    }
}
