// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

//! Routes the Driver's replies on a worker's single `down` channel back to
//! whichever in-flight request is waiting on it. One worker only ever has
//! at most one outstanding job request and one outstanding range request
//! at a time, so a pair of one-shot slots is enough — no correlation ids
//! needed (spec §5: "Per worker, Driver replies are observed ... in the
//! order they were issued").

use crate::WorkerError;
use parking_lot::Mutex;
use raythena_core::WorkerId;
use raythena_wire::{WorkerMessage, WorkerMessageKind};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

#[derive(Default)]
pub struct ReplyRouter {
    pending_job: Mutex<Option<oneshot::Sender<WorkerMessageKind>>>,
    pending_ranges: Mutex<Option<oneshot::Sender<WorkerMessageKind>>>,
}

impl ReplyRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `RequestNewJob` and wait for the matching `ReplyOkJob` /
    /// `ReplyNoMoreJobs`.
    pub async fn request_job(
        &self,
        up_tx: &mpsc::Sender<WorkerMessage>,
        worker_id: &WorkerId,
    ) -> Result<WorkerMessageKind, WorkerError> {
        let (tx, rx) = oneshot::channel();
        *self.pending_job.lock() = Some(tx);
        up_tx
            .send(WorkerMessage::new(worker_id.clone(), WorkerMessageKind::RequestNewJob))
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        rx.await.map_err(|_| WorkerError::ChannelClosed)
    }

    /// Send `RequestEventRanges` and wait for the matching `ReplyOkRanges`
    /// / `ReplyNoMoreEventRanges`.
    pub async fn request_ranges(
        &self,
        up_tx: &mpsc::Sender<WorkerMessage>,
        worker_id: &WorkerId,
        request: raythena_wire::EventRangeRequestDto,
    ) -> Result<WorkerMessageKind, WorkerError> {
        let (tx, rx) = oneshot::channel();
        *self.pending_ranges.lock() = Some(tx);
        up_tx
            .send(WorkerMessage::new(worker_id.clone(), WorkerMessageKind::RequestEventRanges(request)))
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        rx.await.map_err(|_| WorkerError::ChannelClosed)
    }

    /// Feed one reply received on the worker's `down` channel to whichever
    /// slot is waiting for it.
    pub fn dispatch(&self, kind: WorkerMessageKind) {
        match &kind {
            WorkerMessageKind::ReplyOkJob(_) | WorkerMessageKind::ReplyNoMoreJobs => complete(&self.pending_job, kind),
            WorkerMessageKind::ReplyOkRanges(_) | WorkerMessageKind::ReplyNoMoreEventRanges => {
                complete(&self.pending_ranges, kind)
            }
            other => warn!(?other, "reply router received a non-reply message kind, ignoring"),
        }
    }
}

fn complete(slot: &Mutex<Option<oneshot::Sender<WorkerMessageKind>>>, kind: WorkerMessageKind) {
    if let Some(tx) = slot.lock().take() {
        let _ = tx.send(kind);
    }
}
