// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

//! In-process fixture-backed adapter used by tests and the scenario suite.

use crate::{HarvesterHandle, RangeReply, CHANNEL_CAPACITY};
use raythena_core::{EventRange, Job, PandaId};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

/// Replies from a fixed, in-memory fixture rather than a real Harvester.
///
/// The job list is handed out once, on the first `getJob` request; every
/// request after that receives an empty batch (mirroring the real
/// Harvester's "no more jobs" signal). Ranges are served from a
/// per-job queue of pre-built batches, each `fetch_event_ranges` request
/// draining one batch; once a job's batches are exhausted, replies are
/// empty, flagging exhaustion to the caller.
#[derive(Debug, Default)]
pub struct MockAdapter {
    jobs: Vec<Job>,
    range_batches: HashMap<PandaId, Vec<Vec<EventRange>>>,
}

impl MockAdapter {
    pub fn new(jobs: Vec<Job>) -> Self {
        Self { jobs, range_batches: HashMap::new() }
    }

    /// Queue one batch of ranges to be handed out for `panda_id` on the
    /// next matching range request.
    pub fn with_range_batch(mut self, panda_id: PandaId, ranges: Vec<EventRange>) -> Self {
        self.range_batches.entry(panda_id).or_default().push(ranges);
        self
    }
}

#[async_trait::async_trait]
impl crate::HarvesterAdapter for MockAdapter {
    fn run(self) -> HarvesterHandle {
        let (job_req_tx, mut job_req_rx) = mpsc::channel::<()>(CHANNEL_CAPACITY);
        let (range_req_tx, mut range_req_rx) = mpsc::channel::<crate::RangeRequest>(CHANNEL_CAPACITY);
        let (jobs_tx, jobs_rx) = mpsc::channel::<Vec<Job>>(CHANNEL_CAPACITY);
        let (ranges_tx, ranges_rx) = mpsc::channel::<RangeReply>(CHANNEL_CAPACITY);

        let mut jobs = self.jobs;
        let mut range_batches = self.range_batches;

        tokio::spawn(async move {
            let mut jobs_sent = false;
            loop {
                tokio::select! {
                    req = job_req_rx.recv() => {
                        let Some(()) = req else { break };
                        let batch = if jobs_sent { Vec::new() } else { std::mem::take(&mut jobs) };
                        jobs_sent = true;
                        debug!(count = batch.len(), "mock harvester serving job batch");
                        if jobs_tx.send(batch).await.is_err() {
                            break;
                        }
                    }
                    req = range_req_rx.recv() => {
                        let Some(req) = req else { break };
                        let ranges = range_batches
                            .get_mut(&req.panda_id)
                            .and_then(|batches| (!batches.is_empty()).then(|| batches.remove(0)))
                            .unwrap_or_default();
                        debug!(panda_id = %req.panda_id, count = ranges.len(), "mock harvester serving range batch");
                        if ranges_tx.send(RangeReply { panda_id: req.panda_id, ranges }).await.is_err() {
                            break;
                        }
                    }
                    else => break,
                }
            }
        });

        HarvesterHandle {
            job_requests: job_req_tx,
            range_requests: range_req_tx,
            jobs: jobs_rx,
            ranges: ranges_rx,
        }
    }
}
