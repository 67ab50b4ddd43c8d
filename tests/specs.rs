// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

#![allow(clippy::unwrap_used)]

//! End-to-end scenario tests (spec §8) driving `BookKeeper` directly — no
//! real subprocess or HTTP round trip needed at this level.

use raythena_bookkeeper::BookKeeper;
use raythena_core::{EventRange, JobBuilder, PandaId, WorkerId};
use raythena_wire::RangeUpdateEntry;
use std::collections::HashSet;

fn ranges(prefix: &str, n: usize) -> Vec<EventRange> {
    (0..n).map(|i| EventRange::new(format!("{prefix}-{i}"), format!("pfn-{prefix}-{i}"), 0, 1)).collect()
}

fn mark_done(bk: &mut BookKeeper, worker: &WorkerId, panda_id: &PandaId, fetched: &[EventRange]) {
    let updates: Vec<RangeUpdateEntry> = fetched
        .iter()
        .map(|r| RangeUpdateEntry { event_range_id: r.event_range_id.as_str().to_string(), event_status: "finished".into() })
        .collect();
    bk.process_event_ranges_update(worker, panda_id, &updates);
}

#[test]
fn scenario_1_single_job_single_worker_happy_path() {
    let mut bk = BookKeeper::new();
    let panda_id = PandaId::new("J1");
    let worker = WorkerId::new("w0");

    bk.add_jobs(vec![JobBuilder::new("J1").build()]);
    bk.add_event_ranges(&panda_id, ranges("r", 10));

    bk.assign_job_to_actor(&worker, panda_id.clone());
    let fetched = bk.fetch_event_ranges(&worker, 10);
    assert_eq!(fetched.len(), 10);

    mark_done(&mut bk, &worker, &panda_id, &fetched);
    bk.process_actor_end(&worker);

    assert_eq!(bk.n_ready(&panda_id), 0);
    assert_eq!(bk.owned_ranges(&worker).len(), 0);
}

#[test]
fn scenario_2_orphan_reclaim() {
    let mut bk = BookKeeper::new();
    let panda_id = PandaId::new("J1");
    let worker_a = WorkerId::new("wA");
    let worker_b = WorkerId::new("wB");

    bk.add_jobs(vec![JobBuilder::new("J1").build()]);
    bk.add_event_ranges(&panda_id, ranges("r", 10));

    bk.assign_job_to_actor(&worker_a, panda_id.clone());
    let fetched = bk.fetch_event_ranges(&worker_a, 10);
    assert_eq!(fetched.len(), 10);

    bk.process_actor_end(&worker_a);
    assert_eq!(bk.n_ready(&panda_id), 10);

    bk.assign_job_to_actor(&worker_b, panda_id.clone());
    let reclaimed = bk.fetch_event_ranges(&worker_b, 10);
    assert_eq!(reclaimed.len(), 10);
}

#[test]
fn scenario_3_prefetch_exhaustion() {
    let mut bk = BookKeeper::new();
    let panda_id = PandaId::new("J1");
    let worker = WorkerId::new("w0");

    bk.add_jobs(vec![JobBuilder::new("J1").build()]);
    bk.add_event_ranges(&panda_id, ranges("r", 5));
    bk.add_event_ranges(&panda_id, vec![]);
    assert!(bk.is_flagged_no_more_events(&panda_id));

    bk.assign_job_to_actor(&worker, panda_id.clone());
    let fetched = bk.fetch_event_ranges(&worker, 5);
    assert_eq!(fetched.len(), 5);

    let next = bk.fetch_event_ranges(&worker, 5);
    assert!(next.is_empty());
    assert!(bk.is_flagged_no_more_events(&panda_id));
}

#[test]
fn scenario_4_job_rotation() {
    let mut bk = BookKeeper::new();
    let j1 = PandaId::new("J1");
    let j2 = PandaId::new("J2");
    let worker = WorkerId::new("w0");

    bk.add_jobs(vec![JobBuilder::new("J1").build(), JobBuilder::new("J2").build()]);
    bk.add_event_ranges(&j1, ranges("a", 3));
    bk.add_event_ranges(&j2, ranges("b", 3));

    let first = bk.jobid_next_job_to_process().unwrap();
    assert_eq!(first, j1);
    bk.assign_job_to_actor(&worker, first.clone());
    let fetched = bk.fetch_event_ranges(&worker, 3);
    assert_eq!(fetched.len(), 3);
    mark_done(&mut bk, &worker, &first, &fetched);

    let second = bk.jobid_next_job_to_process().unwrap();
    assert_eq!(second, j2);
    assert_ne!(first, second);
    bk.assign_job_to_actor(&worker, second.clone());
    let rotated = bk.fetch_event_ranges(&worker, 3);
    assert_eq!(rotated.len(), 3);
}

#[test]
fn scenario_5_multi_worker_fan_out() {
    let mut bk = BookKeeper::new();
    let panda_id = PandaId::new("J1");
    bk.add_jobs(vec![JobBuilder::new("J1").build()]);
    bk.add_event_ranges(&panda_id, ranges("r", 100));

    let workers: Vec<WorkerId> = (0..10).map(|i| WorkerId::new(format!("w{i}"))).collect();
    let mut seen = HashSet::new();
    for worker in &workers {
        bk.assign_job_to_actor(worker, panda_id.clone());
        let fetched = bk.fetch_event_ranges(worker, 10);
        assert_eq!(fetched.len(), 10);
        for r in fetched {
            assert!(seen.insert(r.event_range_id), "range handed out to two workers");
        }
    }

    assert_eq!(seen.len(), 100);
    assert_eq!(bk.n_ready(&panda_id), 0);
}

#[test]
fn scenario_6_malformed_update_ignored() {
    let mut bk = BookKeeper::new();
    let panda_id = PandaId::new("J1");
    let worker = WorkerId::new("w0");
    bk.add_jobs(vec![JobBuilder::new("J1").build()]);
    bk.add_event_ranges(&panda_id, ranges("r", 3));
    bk.assign_job_to_actor(&worker, panda_id.clone());
    bk.fetch_event_ranges(&worker, 3);

    bk.process_event_ranges_update(
        &worker,
        &panda_id,
        &[RangeUpdateEntry { event_range_id: "ghost".into(), event_status: "finished".into() }],
    );

    assert_eq!(bk.owned_ranges(&worker).len(), 3);
}

#[test]
fn p1_job_count_matches_unique_panda_ids() {
    let mut bk = BookKeeper::new();
    bk.add_jobs(vec![JobBuilder::new("1").build(), JobBuilder::new("2").build(), JobBuilder::new("1").build()]);
    assert_eq!(bk.panda_ids().count(), 2);
}

#[test]
fn p3_no_two_workers_share_an_owned_range() {
    let mut bk = BookKeeper::new();
    let panda_id = PandaId::new("1");
    bk.add_jobs(vec![JobBuilder::new("1").build()]);
    bk.add_event_ranges(&panda_id, ranges("r", 4));

    let w1 = WorkerId::new("w1");
    let w2 = WorkerId::new("w2");
    bk.assign_job_to_actor(&w1, panda_id.clone());
    bk.assign_job_to_actor(&w2, panda_id.clone());
    let fetched1: HashSet<_> = bk.fetch_event_ranges(&w1, 2).into_iter().map(|r| r.event_range_id).collect();
    let fetched2: HashSet<_> = bk.fetch_event_ranges(&w2, 2).into_iter().map(|r| r.event_range_id).collect();

    assert!(fetched1.is_disjoint(&fetched2));
}

#[test]
fn p4_process_actor_end_preserves_total_range_count() {
    let mut bk = BookKeeper::new();
    let panda_id = PandaId::new("1");
    let worker = WorkerId::new("w0");
    bk.add_jobs(vec![JobBuilder::new("1").build()]);
    bk.add_event_ranges(&panda_id, ranges("r", 6));

    bk.assign_job_to_actor(&worker, panda_id.clone());
    bk.fetch_event_ranges(&worker, 4);
    assert_eq!(bk.get_nranges(), 2);

    bk.process_actor_end(&worker);
    assert_eq!(bk.get_nranges(), 6);
    assert_eq!(bk.owned_ranges(&worker).len(), 0);
}

#[test]
fn p5_empty_range_reply_flags_exhaustion_and_future_fetches_are_empty() {
    let mut bk = BookKeeper::new();
    let panda_id = PandaId::new("1");
    let worker = WorkerId::new("w0");
    bk.add_jobs(vec![JobBuilder::new("1").build()]);
    bk.add_event_ranges(&panda_id, vec![]);

    assert!(bk.is_flagged_no_more_events(&panda_id));
    bk.assign_job_to_actor(&worker, panda_id.clone());
    assert!(bk.fetch_event_ranges(&worker, 10).is_empty());
}

#[test]
fn p6_fetch_event_ranges_never_exceeds_available_or_requested() {
    let mut bk = BookKeeper::new();
    let panda_id = PandaId::new("1");
    let worker = WorkerId::new("w0");
    bk.add_jobs(vec![JobBuilder::new("1").build()]);
    bk.add_event_ranges(&panda_id, ranges("r", 3));
    bk.assign_job_to_actor(&worker, panda_id.clone());

    let fetched = bk.fetch_event_ranges(&worker, 10);
    assert_eq!(fetched.len(), 3);
    assert!(bk.fetch_event_ranges(&worker, 5).is_empty());
}

#[test]
fn p7_reassignment_after_completion_picks_a_different_job() {
    let mut bk = BookKeeper::new();
    let j1 = PandaId::new("1");
    let j2 = PandaId::new("2");
    let worker = WorkerId::new("w0");
    bk.add_jobs(vec![JobBuilder::new("1").build(), JobBuilder::new("2").build()]);
    bk.add_event_ranges(&j1, ranges("a", 1));
    bk.add_event_ranges(&j2, ranges("b", 1));

    bk.assign_job_to_actor(&worker, j1.clone());
    let fetched = bk.fetch_event_ranges(&worker, 1);
    mark_done(&mut bk, &worker, &j1, &fetched);

    let next = bk.jobid_next_job_to_process().unwrap();
    assert_ne!(next, j1);
    assert_eq!(next, j2);
}
