// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

//! The control loop that fans event ranges out to worker actors and
//! routes their results back through the Harvester boundary (spec §4.4,
//! component C4).

use crate::{Config, DriverError};
use raythena_bookkeeper::BookKeeper;
use raythena_core::{Job, PandaId, WorkerId};
use raythena_harvester::{HarvesterAdapter, HarvesterHandle, RangeReply, RangeRequest};
use raythena_wire::{RangeRequestEntry, WorkerMessage, WorkerMessageKind};
use raythena_worker::{PayloadCommandBuilder, WorkerActor, WorkerChannels, WorkerIdentity};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const UP_CHANNEL_CAPACITY: usize = 256;
const DOWN_CHANNEL_CAPACITY: usize = 16;
/// Ranges requested per job at bootstrap (spec §4.4: "a range request
/// sized at 100 × njobs" — read here as 100 ranges per admitted job).
const BOOTSTRAP_RANGES_PER_JOB: u32 = 100;
/// Ranges requested per job once the prefetch watermark trips.
const PREFETCH_BATCH_SIZE: u32 = 50;

/// Handles the caller keeps after [`Driver::bootstrap`] to drive shutdown:
/// the cancellation token that tells every worker (and the control loop
/// itself) to stop, and the join handles for worker tasks so a caller can
/// await them after [`Driver::run`] returns.
pub struct DriverHandles {
    pub cancel: CancellationToken,
    pub workers: Vec<JoinHandle<Result<(), raythena_worker::WorkerError>>>,
}

/// Owns the single BookKeeper instance and every live worker's channel
/// endpoints. Nothing outside this struct's control loop mutates the
/// BookKeeper (spec §4.4/§9 single-threadedness).
pub struct Driver {
    bookkeeper: BookKeeper,
    harvester: HarvesterHandle,
    up_rx: mpsc::Receiver<WorkerMessage>,
    down_tx: HashMap<WorkerId, mpsc::Sender<WorkerMessage>>,
    n_workers: u32,
    core_per_node: u32,
    cancel: CancellationToken,
}

impl Driver {
    /// Pull the initial job batch from Harvester, admit it into a fresh
    /// `BookKeeper`, kick off bootstrap range prefetch, and spawn one
    /// worker actor per configured slot. Returns the running `Driver`
    /// together with the handles needed to cancel and join it.
    pub async fn bootstrap(config: &Config, adapter: impl HarvesterAdapter) -> Result<(Self, DriverHandles), DriverError> {
        let mut harvester = adapter.run();

        harvester
            .job_requests
            .send(())
            .await
            .map_err(|_| DriverError::HarvesterUnavailable("request channel closed before first send".into()))?;
        let jobs: Vec<Job> = harvester
            .jobs
            .recv()
            .await
            .ok_or_else(|| DriverError::HarvesterUnavailable("jobs channel closed".into()))?;
        if jobs.is_empty() {
            error!("harvester returned no jobs at startup");
            return Err(DriverError::HarvesterUnavailable("initial job batch was empty".into()));
        }

        let mut bookkeeper = BookKeeper::new();
        bookkeeper.add_jobs(jobs);

        for panda_id in bookkeeper.panda_ids().cloned().collect::<Vec<_>>() {
            request_ranges(&mut harvester, &bookkeeper, &panda_id, BOOTSTRAP_RANGES_PER_JOB).await;
        }

        let cancel = CancellationToken::new();
        let (up_tx, up_rx) = mpsc::channel(UP_CHANNEL_CAPACITY);
        let mut down_tx = HashMap::new();
        let mut worker_tasks = Vec::new();

        let n_workers = config.cluster.n_workers;
        // A fixed shim port only makes sense when a single worker owns the
        // node; with several in-process workers sharing one machine (this
        // simulation's only deployment shape — see DESIGN.md), every
        // worker but the first would fail to bind it, so only honor the
        // configured port for a single-worker run.
        let preferred_port = if n_workers == 1 { config.resources.worker_port } else { None };

        for i in 0..n_workers {
            let worker_id = WorkerId::new(format!("worker-{i}"));
            let (worker_down_tx, worker_down_rx) = mpsc::channel(DOWN_CHANNEL_CAPACITY);
            let channels = WorkerChannels { up_tx: up_tx.clone(), down_rx: worker_down_rx };
            let command_builder = PayloadCommandBuilder::new(config.payload.bindir.clone(), config.payload.scratch_root.clone());
            let identity = WorkerIdentity { worker_id: worker_id.clone() };
            let actor =
                WorkerActor::new(identity, command_builder, preferred_port, config.resources.core_per_node, channels, cancel.clone());

            bookkeeper.register_worker(worker_id.clone());
            down_tx.insert(worker_id, worker_down_tx);
            worker_tasks.push(tokio::spawn(actor.run()));
        }
        drop(up_tx);

        let driver =
            Driver { bookkeeper, harvester, up_rx, down_tx, n_workers, core_per_node: config.resources.core_per_node, cancel: cancel.clone() };
        Ok((driver, DriverHandles { cancel, workers: worker_tasks }))
    }

    /// Run the control loop until every worker has terminated or an
    /// external stop signal cancels the token passed to `bootstrap`
    /// (spec §4.4 steps 1-4, §5 shutdown).
    pub async fn run(mut self) -> Result<(), DriverError> {
        loop {
            if self.down_tx.is_empty() {
                info!("all workers terminated, control loop exiting");
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("stop signal observed, control loop exiting");
                    return Ok(());
                }
                msg = self.up_rx.recv() => {
                    match msg {
                        Some(msg) => self.dispatch(msg).await?,
                        None => {
                            warn!("worker inbox closed with workers still registered");
                            return Ok(());
                        }
                    }
                }
                reply = self.harvester.ranges.recv() => {
                    match reply {
                        Some(reply) => self.apply_range_reply(reply),
                        None => warn!("harvester ranges channel closed"),
                    }
                }
            }
        }
    }

    async fn dispatch(&mut self, msg: WorkerMessage) -> Result<(), DriverError> {
        let worker_id = msg.worker_id.clone();
        match msg.kind {
            WorkerMessageKind::Idle => {}
            WorkerMessageKind::RequestNewJob => {
                let reply = match self.bookkeeper.jobid_next_job_to_process() {
                    Some(panda_id) => {
                        self.bookkeeper.assign_job_to_actor(&worker_id, panda_id.clone());
                        match self.bookkeeper.job(&panda_id) {
                            Some(job) => WorkerMessageKind::ReplyOkJob(job.clone()),
                            None => driver_abort(format!(
                                "job {panda_id} selected by jobid_next_job_to_process but missing from registry"
                            )),
                        }
                    }
                    None => WorkerMessageKind::ReplyNoMoreJobs,
                };
                self.reply(&worker_id, reply).await;
            }
            WorkerMessageKind::RequestEventRanges(request) => {
                let Some((panda_id, entry)) = request.first().map(|(id, e)| (id.clone(), e.clone())) else {
                    warn!(worker_id = %worker_id, "range request carried no job entries");
                    self.reply(&worker_id, WorkerMessageKind::ReplyNoMoreEventRanges).await;
                    return Ok(());
                };
                let ranges = self.bookkeeper.fetch_event_ranges(&worker_id, entry.n_ranges as usize);
                let reply = if ranges.is_empty() && self.bookkeeper.is_flagged_no_more_events(&panda_id) {
                    WorkerMessageKind::ReplyNoMoreEventRanges
                } else {
                    WorkerMessageKind::ReplyOkRanges(ranges)
                };
                self.reply(&worker_id, reply).await;
                self.maybe_prefetch(&panda_id).await;
            }
            WorkerMessageKind::UpdateJob(update) => {
                info!(worker_id = %worker_id, panda_id = %update.panda_id, "job update received (no upstream forwarding yet)");
            }
            WorkerMessageKind::UpdateEventRanges(update) => {
                self.bookkeeper.process_event_ranges_update(&worker_id, &update.panda_id, &update.ranges);
                self.maybe_prefetch(&update.panda_id).await;
            }
            WorkerMessageKind::ProcessDone(code) => {
                debug!(worker_id = %worker_id, exit_code = code, "worker reported process exit");
                self.bookkeeper.process_actor_end(&worker_id);
                self.down_tx.remove(&worker_id);
            }
            reply @ (WorkerMessageKind::ReplyOkJob(_)
            | WorkerMessageKind::ReplyOkRanges(_)
            | WorkerMessageKind::ReplyNoMoreJobs
            | WorkerMessageKind::ReplyNoMoreEventRanges) => {
                warn!(worker_id = %worker_id, ?reply, "driver received a reply-only message kind, ignoring");
            }
        }
        Ok(())
    }

    async fn reply(&self, worker_id: &WorkerId, kind: WorkerMessageKind) {
        let Some(tx) = self.down_tx.get(worker_id) else {
            warn!(worker_id = %worker_id, "no reply channel for worker, dropping reply");
            return;
        };
        if tx.send(WorkerMessage::new(worker_id.clone(), kind)).await.is_err() {
            warn!(worker_id = %worker_id, "worker reply channel closed while replying");
        }
    }

    /// Spec §4.4 prefetch policy: once a job's `Available` bucket falls
    /// below `corepernode * nworkers`, ask Harvester for more.
    async fn maybe_prefetch(&mut self, panda_id: &PandaId) {
        if self.bookkeeper.is_flagged_no_more_events(panda_id) {
            return;
        }
        let low_watermark = (self.core_per_node * self.n_workers.max(1)) as usize;
        if self.bookkeeper.n_ready(panda_id) < low_watermark {
            request_ranges(&mut self.harvester, &self.bookkeeper, panda_id, PREFETCH_BATCH_SIZE).await;
        }
    }

    fn apply_range_reply(&mut self, reply: RangeReply) {
        debug!(panda_id = %reply.panda_id, count = reply.ranges.len(), "range reply admitted");
        self.bookkeeper.add_event_ranges(&reply.panda_id, reply.ranges);
    }
}

/// An `InternalInvariant` violation means the in-memory registry can no
/// longer be trusted to avoid double-dispatching ranges; log and exit
/// rather than unwind (spec §7).
fn driver_abort(msg: impl std::fmt::Display) -> ! {
    error!(%msg, "internal invariant violated, aborting");
    std::process::exit(70); // EX_SOFTWARE
}

async fn request_ranges(harvester: &mut HarvesterHandle, bookkeeper: &BookKeeper, panda_id: &PandaId, n_ranges: u32) {
    let Some(job) = bookkeeper.job(panda_id) else { return };
    let entry = RangeRequestEntry { n_ranges, task_id: job.task_id.clone(), jobset_id: job.jobset_id.clone() };
    if harvester.range_requests.send(RangeRequest { panda_id: panda_id.clone(), entry }).await.is_err() {
        warn!(panda_id = %panda_id, "harvester range request channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterConfig, HarvesterConfig, LoggingConfig, PayloadConfig, ResourcesConfig};
    use raythena_core::JobBuilder;
    use raythena_harvester::MockAdapter;
    use std::time::Duration;

    fn test_config(n_workers: u32) -> Config {
        Config {
            payload: PayloadConfig { bindir: "/bin/true".into(), scratch_root: std::env::temp_dir().to_string_lossy().into_owned() },
            harvester: HarvesterConfig { endpoint: String::new(), kind: "mock".into() },
            cluster: ClusterConfig { n_workers },
            resources: ResourcesConfig { core_per_node: 4, worker_port: None },
            logging: LoggingConfig { level: "info".into() },
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_when_harvester_has_no_jobs() {
        let config = test_config(1);
        let adapter = MockAdapter::new(vec![]);
        let err = Driver::bootstrap(&config, adapter).await.unwrap_err();
        assert!(matches!(err, DriverError::HarvesterUnavailable(_)));
    }

    #[tokio::test]
    async fn bootstrap_admits_jobs_and_spawns_workers() {
        let config = test_config(2);
        let adapter = MockAdapter::new(vec![JobBuilder::new("4321").build()]);
        let (driver, handles) = Driver::bootstrap(&config, adapter).await.unwrap();
        assert_eq!(driver.bookkeeper.panda_ids().count(), 1);
        assert_eq!(handles.workers.len(), 2);
        handles.cancel.cancel();
        for worker in handles.workers {
            tokio::time::timeout(Duration::from_secs(1), worker).await.unwrap().unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn run_exits_once_cancelled() {
        let config = test_config(1);
        let adapter = MockAdapter::new(vec![JobBuilder::new("4321").build()]);
        let (driver, handles) = Driver::bootstrap(&config, adapter).await.unwrap();
        handles.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), driver.run()).await.unwrap().unwrap();
        for worker in handles.workers {
            tokio::time::timeout(Duration::from_secs(1), worker).await.unwrap().unwrap().unwrap();
        }
    }
}
