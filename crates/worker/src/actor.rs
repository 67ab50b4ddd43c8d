// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

//! `WorkerActor`: the per-node state machine that owns one payload
//! subprocess end to end (spec §4.3, component C3).
//!
//! Three concurrent pieces share one worker's lifetime: the main loop
//! below (job bootstrap, payload spawn/wait, `ProcessDone` reporting), a
//! background range-supply task (the low/high-watermark prefetch policy),
//! and the local HTTP shim (`crate::shim`) that the payload subprocess
//! actually talks to. All three share `ActorState` and a `ReplyRouter`
//! over the single channel pair to the Driver.

use crate::buffer::ActorState;
use crate::router::ReplyRouter;
use crate::{PayloadCommandBuilder, WorkerChannels, WorkerError, WorkerIdentity, WorkerState};
use raythena_wire::{EventRangeRequestDto, WorkerMessage, WorkerMessageKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Idle sleep when the range buffer is above the low watermark (spec
/// §4.3 Running: "emits IDLE and sleeps 1s").
const IDLE_SLEEP: Duration = Duration::from_secs(1);

/// One worker actor: identity, the command builder that materialises the
/// payload's command line, and the channel pair to the Driver.
pub struct WorkerActor {
    identity: WorkerIdentity,
    command_builder: PayloadCommandBuilder,
    preferred_port: Option<u16>,
    core_per_node: u32,
    channels: WorkerChannels,
    cancel: CancellationToken,
}

/// Advance `current` to `next`, logging (not failing) an illegal jump —
/// the state machine is driven entirely by this module, so a violation
/// here is a local bug, not a condition the Driver needs to hear about.
fn transition(current: WorkerState, next: WorkerState) -> WorkerState {
    if !current.can_transition_to(next) {
        warn!(?current, ?next, "illegal worker state transition taken anyway");
    }
    next
}

impl WorkerActor {
    pub fn new(
        identity: WorkerIdentity,
        command_builder: PayloadCommandBuilder,
        preferred_port: Option<u16>,
        core_per_node: u32,
        channels: WorkerChannels,
        cancel: CancellationToken,
    ) -> Self {
        Self { identity, command_builder, preferred_port, core_per_node, channels, cancel }
    }

    async fn send(&self, kind: WorkerMessageKind) -> Result<(), WorkerError> {
        self.channels
            .up_tx
            .send(WorkerMessage::new(self.identity.worker_id.clone(), kind))
            .await
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Drive the actor to completion: start the shim, then loop requesting
    /// a job, spawning and waiting on the payload, and requesting the next
    /// job once the previous one drains — until the Driver reports no more
    /// jobs or an external cancellation arrives (spec §5 Cancellation).
    pub async fn run(mut self) -> Result<(), WorkerError> {
        let actor_state = Arc::new(ActorState::new());
        let router = Arc::new(ReplyRouter::new());

        let shim = crate::shim::serve_shim(
            self.identity.worker_id.clone(),
            self.preferred_port,
            self.channels.up_tx.clone(),
            actor_state.clone(),
        )
        .await?;

        // A single task owns the `down` receiver and fans replies out to
        // whichever of {job request, range request} is currently waiting
        // (spec §5: replies are observed in issue order, and a worker has
        // at most one of each outstanding at a time).
        let router_for_dispatch = router.clone();
        let mut down_rx = self.channels.down_rx;
        let dispatch_task: JoinHandle<()> = tokio::spawn(async move {
            while let Some(msg) = down_rx.recv().await {
                router_for_dispatch.dispatch(msg.kind);
            }
        });

        let mut state = WorkerState::Created;
        state = transition(state, WorkerState::Idle);

        let mut job_round: u32 = 0;
        let result = loop {
            if self.cancel.is_cancelled() {
                break Ok(());
            }

            state = transition(state, WorkerState::AwaitingJob);
            let reply = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Ok(()),
                reply = router.request_job(&self.channels.up_tx, &self.identity.worker_id) => reply?,
            };

            match reply {
                WorkerMessageKind::ReplyOkJob(job) => {
                    state = transition(state, WorkerState::Running);
                    job_round += 1;
                    actor_state.start_new_round();
                    actor_state.set_job(job.clone());

                    let supply = tokio::spawn(supply_loop(
                        self.identity.worker_id.clone(),
                        self.channels.up_tx.clone(),
                        router.clone(),
                        actor_state.clone(),
                        job.panda_id.clone(),
                        job.task_id.clone(),
                        job.jobset_id.clone(),
                        self.core_per_node,
                        self.cancel.clone(),
                    ));

                    let workdir = self.command_builder.prepare_workdir(&self.identity.worker_id, &job, job_round)?;
                    let mut command = self.command_builder.build(&workdir, shim.addr);
                    let mut child = command.spawn().map_err(WorkerError::PayloadSpawn)?;
                    info!(worker_id = %self.identity.worker_id, panda_id = %job.panda_id, "payload spawned");

                    let exit = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            let _ = child.start_kill();
                            let _ = child.wait().await;
                            supply.abort();
                            state = transition(state, WorkerState::Draining);
                            self.send(WorkerMessageKind::ProcessDone(-1)).await?;
                            state = transition(state, WorkerState::Terminated);
                            break Ok(());
                        }
                        status = child.wait() => status,
                    };
                    supply.abort();
                    let code = match exit {
                        Ok(status) => status.code().unwrap_or(-1),
                        Err(err) => {
                            warn!(error = %err, "failed to observe payload exit status");
                            -1
                        }
                    };
                    state = transition(state, WorkerState::Draining);
                    self.send(WorkerMessageKind::ProcessDone(code)).await?;
                    state = transition(state, WorkerState::Terminated);
                    break Ok(());
                }
                WorkerMessageKind::ReplyNoMoreJobs => {
                    state = transition(state, WorkerState::Terminated);
                    break Ok(());
                }
                other => {
                    warn!(?other, "unexpected reply kind while awaiting a job assignment");
                }
            }
        };

        shim.task.abort();
        dispatch_task.abort();
        let _ = state; // final value only meaningful for diagnostics/tests
        result
    }
}

/// Background range-supply loop for one job round: top up the local
/// buffer whenever it falls below the low watermark (`core_per_node`),
/// requesting up to the high watermark (`core_per_node * 2`); otherwise
/// report `IDLE` and sleep (spec §4.3 Running state).
#[allow(clippy::too_many_arguments)]
async fn supply_loop(
    worker_id: raythena_core::WorkerId,
    up_tx: mpsc::Sender<WorkerMessage>,
    router: Arc<ReplyRouter>,
    state: Arc<ActorState>,
    panda_id: raythena_core::PandaId,
    task_id: String,
    jobset_id: String,
    core_per_node: u32,
    cancel: CancellationToken,
) {
    let low_watermark = core_per_node.max(1) as usize;
    let high_watermark = core_per_node.max(1) * 2;

    loop {
        if cancel.is_cancelled() || state.is_no_more_ranges() {
            return;
        }

        if state.len() < low_watermark {
            let request = EventRangeRequestDto::single(panda_id.clone(), high_watermark, task_id.clone(), jobset_id.clone());
            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                reply = router.request_ranges(&up_tx, &worker_id, request) => reply,
            };
            match reply {
                Ok(WorkerMessageKind::ReplyOkRanges(ranges)) => state.push_ranges(ranges),
                Ok(WorkerMessageKind::ReplyNoMoreEventRanges) => state.mark_no_more_ranges(),
                Ok(other) => warn!(?other, "unexpected reply kind for a range request"),
                Err(_) => return,
            }
        } else {
            if up_tx.send(WorkerMessage::new(worker_id.clone(), WorkerMessageKind::Idle)).await.is_err() {
                return;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(IDLE_SLEEP) => {}
            }
        }
    }
}
