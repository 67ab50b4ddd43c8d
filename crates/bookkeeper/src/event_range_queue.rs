// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

//! Per-job bucket of event ranges, one instance per admitted [`Job`](raythena_core::Job).

use raythena_core::{EventRange, EventRangeId, RangeStatus};
use raythena_wire::RangeUpdateEntry;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::warn;

/// Holds one job's ranges in the five lifecycle buckets described by
/// spec §3 (Available, Assigned, Running, Done, Failed), plus the
/// `no_more_events` terminal flag set when Harvester signals exhaustion.
///
/// Invariant R1 (each range in exactly one bucket) and R3 (bucket sizes
/// sum to the total ever admitted) are maintained by construction: every
/// mutating method below moves a range's id out of its current bucket set
/// before inserting it into the new one.
#[derive(Debug, Default)]
pub struct EventRangeQueue {
    ranges: HashMap<EventRangeId, EventRange>,
    available: VecDeque<EventRangeId>,
    assigned: HashSet<EventRangeId>,
    running: HashSet<EventRangeId>,
    done: HashSet<EventRangeId>,
    failed: HashSet<EventRangeId>,
    no_more_events: bool,
}

impl EventRangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly-admitted ranges to the `Available` bucket in the order
    /// given, which becomes their fetch order (spec: "insertion order
    /// within the job").
    pub fn add_ranges(&mut self, ranges: Vec<EventRange>) {
        for mut range in ranges {
            range.status = RangeStatus::Available;
            self.available.push_back(range.event_range_id.clone());
            self.ranges.insert(range.event_range_id.clone(), range);
        }
    }

    /// Flag that Harvester will not send any more ranges for this job.
    pub fn flag_no_more_events(&mut self) {
        self.no_more_events = true;
    }

    pub fn is_flagged_no_more_events(&self) -> bool {
        self.no_more_events
    }

    /// Number of ranges currently `Available`.
    pub fn n_available(&self) -> usize {
        self.available.len()
    }

    /// Total ranges ever admitted for this job (R3's right-hand side).
    pub fn total_admitted(&self) -> usize {
        self.ranges.len()
    }

    /// Pop up to `n` ranges off the front of `Available`, transitioning
    /// them to `Assigned`. Returns fewer than `n` (down to zero) if fewer
    /// are available — never panics, never blocks (P6).
    pub fn take_available(&mut self, n: usize) -> Vec<EventRange> {
        let mut taken = Vec::with_capacity(n.min(self.available.len()));
        for _ in 0..n {
            let Some(id) = self.available.pop_front() else { break };
            self.assigned.insert(id.clone());
            if let Some(range) = self.ranges.get_mut(&id) {
                range.status = RangeStatus::Assigned;
                taken.push(range.clone());
            }
        }
        taken
    }

    /// Apply one upstream-reported range transition.
    ///
    /// Malformed updates (unknown range id, or a transition the range's
    /// current state cannot legally make) are logged at `warn` and
    /// discarded — they never propagate as an error (spec §4.2, §7
    /// ProtocolError). Returns the range's new status on success, so a
    /// caller (the BookKeeper) can tell whether to release the range from
    /// its owning worker's owned set — `running` updates keep the range
    /// owned, `done`/`failed` do not (spec §4.2).
    pub fn apply_update(&mut self, entry: &RangeUpdateEntry) -> Option<RangeStatus> {
        let id = EventRangeId::new(entry.event_range_id.clone());
        let Some(new_status) = RangeStatus::from_upstream(&entry.event_status) else {
            warn!(event_range_id = %id, status = %entry.event_status, "discarding update with unknown eventStatus");
            return None;
        };
        let Some(range) = self.ranges.get_mut(&id) else {
            warn!(event_range_id = %id, "discarding update for unknown event range");
            return None;
        };
        if !is_legal_transition(range.status, new_status) {
            warn!(event_range_id = %id, from = ?range.status, to = ?new_status, "discarding illegal range transition");
            return None;
        }
        self.move_bucket(&id, range.status, new_status);
        range.status = new_status;
        Some(new_status)
    }

    /// Reset a range owned by a terminated worker back to `Available`
    /// (spec §4.2 `process_actor_end`, invariant P4).
    pub fn release_to_available(&mut self, id: &EventRangeId) {
        let Some(range) = self.ranges.get_mut(id) else { return };
        let from = range.status;
        if from == RangeStatus::Available {
            return;
        }
        self.move_bucket(id, from, RangeStatus::Available);
        // Released ranges are retried first.
        self.available.push_front(id.clone());
        range.status = RangeStatus::Available;
    }

    fn move_bucket(&mut self, id: &EventRangeId, from: RangeStatus, to: RangeStatus) {
        match from {
            RangeStatus::Available => {
                self.available.retain(|x| x != id);
            }
            RangeStatus::Assigned => {
                self.assigned.remove(id);
            }
            RangeStatus::Running => {
                self.running.remove(id);
            }
            RangeStatus::Done => {
                self.done.remove(id);
            }
            RangeStatus::Failed => {
                self.failed.remove(id);
            }
        }
        match to {
            RangeStatus::Available => self.available.push_back(id.clone()),
            RangeStatus::Assigned => {
                self.assigned.insert(id.clone());
            }
            RangeStatus::Running => {
                self.running.insert(id.clone());
            }
            RangeStatus::Done => {
                self.done.insert(id.clone());
            }
            RangeStatus::Failed => {
                self.failed.insert(id.clone());
            }
        }
    }

    /// Number of ranges currently `Done` (used by tests and by
    /// `n_ready`-adjacent observability).
    #[cfg(test)]
    pub fn nranges_done(&self) -> usize {
        self.done.len()
    }

    /// Sanity check for invariant R1/R3: every admitted range is in
    /// exactly one bucket and bucket sizes sum to the total.
    #[cfg(test)]
    pub fn check_invariants(&self) -> bool {
        self.available.len() + self.assigned.len() + self.running.len() + self.done.len() + self.failed.len()
            == self.ranges.len()
    }
}

fn is_legal_transition(from: RangeStatus, to: RangeStatus) -> bool {
    use RangeStatus::*;
    matches!(
        (from, to),
        (Assigned, Running) | (Assigned, Done) | (Assigned, Failed) | (Running, Done) | (Running, Failed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use raythena_core::EventRange;

    fn sample_ranges(n: usize) -> Vec<EventRange> {
        (0..n).map(|i| EventRange::new(format!("r{i}"), format!("pfn{i}"), 0, 1)).collect()
    }

    #[test]
    fn take_available_respects_fifo_order() {
        let mut q = EventRangeQueue::new();
        q.add_ranges(sample_ranges(3));
        let taken = q.take_available(2);
        assert_eq!(taken[0].event_range_id, EventRangeId::new("r0"));
        assert_eq!(taken[1].event_range_id, EventRangeId::new("r1"));
        assert_eq!(q.n_available(), 1);
    }

    #[test]
    fn take_available_caps_at_remaining_count() {
        let mut q = EventRangeQueue::new();
        q.add_ranges(sample_ranges(2));
        let taken = q.take_available(10);
        assert_eq!(taken.len(), 2);
        assert_eq!(q.n_available(), 0);
    }

    #[test]
    fn apply_update_moves_assigned_to_done() {
        let mut q = EventRangeQueue::new();
        q.add_ranges(sample_ranges(1));
        q.take_available(1);
        q.apply_update(&RangeUpdateEntry { event_range_id: "r0".into(), event_status: "finished".into() });
        assert_eq!(q.nranges_done(), 1);
        assert!(q.check_invariants());
    }

    #[test]
    fn apply_update_keeps_running_ranges_owned() {
        let mut q = EventRangeQueue::new();
        q.add_ranges(sample_ranges(1));
        q.take_available(1);
        q.apply_update(&RangeUpdateEntry { event_range_id: "r0".into(), event_status: "running".into() });
        assert!(q.check_invariants());
        assert_eq!(q.n_available(), 0);
    }

    #[test]
    fn apply_update_discards_unknown_range_id() {
        let mut q = EventRangeQueue::new();
        q.add_ranges(sample_ranges(1));
        q.apply_update(&RangeUpdateEntry { event_range_id: "ghost".into(), event_status: "finished".into() });
        assert!(q.check_invariants());
        assert_eq!(q.n_available(), 1);
    }

    #[test]
    fn apply_update_discards_illegal_transition() {
        let mut q = EventRangeQueue::new();
        q.add_ranges(sample_ranges(1));
        // r0 is still Available; Done is not reachable from Available.
        q.apply_update(&RangeUpdateEntry { event_range_id: "r0".into(), event_status: "finished".into() });
        assert_eq!(q.n_available(), 1);
        assert!(q.check_invariants());
    }

    #[test]
    fn release_to_available_restores_count() {
        let mut q = EventRangeQueue::new();
        q.add_ranges(sample_ranges(3));
        q.take_available(3);
        assert_eq!(q.n_available(), 0);
        for i in 0..3 {
            q.release_to_available(&EventRangeId::new(format!("r{i}")));
        }
        assert_eq!(q.n_available(), 3);
        assert!(q.check_invariants());
    }

    #[test]
    fn flag_no_more_events_is_observable() {
        let mut q = EventRangeQueue::new();
        assert!(!q.is_flagged_no_more_events());
        q.flag_no_more_events();
        assert!(q.is_flagged_no_more_events());
    }
}
