// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

//! The local HTTP shim a payload subprocess talks to, standing in for the
//! real PanDA pilot REST API (spec §4.3, §6).
//!
//! `getJob` and `getEventRanges` are served directly from the actor's own
//! state (the currently assigned job, and the local range buffer a
//! background task keeps topped up) — no round trip to the Driver per HTTP
//! call. `updateJob`/`updateEventRanges` are fire-and-forget pass-throughs
//! to the Driver.

use crate::buffer::ActorState;
use crate::WorkerError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::Router;
use raythena_core::WorkerId;
use raythena_wire::{EventRangeUpdateDto, JobUpdateDto, WorkerMessage, WorkerMessageKind};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::warn;

/// A running shim: the address the payload should be told to call, plus
/// the task serving it.
pub struct ShimHandle {
    pub addr: SocketAddr,
    pub task: tokio::task::JoinHandle<()>,
}

struct ShimState {
    worker_id: WorkerId,
    to_driver: mpsc::Sender<WorkerMessage>,
    actor: Arc<ActorState>,
}

/// Bind the shim to an ephemeral local port (or `preferred_port` if given)
/// and start serving it against `actor`'s shared state.
pub async fn serve_shim(
    worker_id: WorkerId,
    preferred_port: Option<u16>,
    to_driver: mpsc::Sender<WorkerMessage>,
    actor: Arc<ActorState>,
) -> Result<ShimHandle, WorkerError> {
    let state = Arc::new(ShimState { worker_id, to_driver, actor });

    let router = Router::new()
        .route("/server/panda/getJob", post(get_job))
        .route("/server/panda/getEventRanges", post(get_event_ranges))
        .route("/server/panda/updateEventRanges", post(update_event_ranges))
        .route("/server/panda/updateJob", post(update_job))
        .route("/server/panda/getStatus", post(not_implemented))
        .route("/server/panda/getKeyPair", post(not_implemented))
        .route("/server/panda/updateJobsInBulk", post(not_implemented))
        .with_state(state);

    let bind_addr: SocketAddr = ([127, 0, 0, 1], preferred_port.unwrap_or(0)).into();
    let listener = TcpListener::bind(bind_addr).await.map_err(WorkerError::ShimBind)?;
    let addr = listener.local_addr().map_err(WorkerError::ShimBind)?;

    let task = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            warn!(error = %err, "shim server exited");
        }
    });

    Ok(ShimHandle { addr, task })
}

async fn get_job(State(state): State<Arc<ShimState>>) -> impl IntoResponse {
    match state.actor.current_job() {
        Some(job) => Json(job).into_response(),
        None => (StatusCode::OK, Json(serde_json::json!({}))).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct GetRangesRequest {
    #[serde(rename = "nRanges")]
    n_ranges: u32,
}

async fn get_event_ranges(State(state): State<Arc<ShimState>>, Json(req): Json<GetRangesRequest>) -> impl IntoResponse {
    let ranges = state.actor.take(req.n_ranges as usize);
    Json(ranges).into_response()
}

async fn update_event_ranges(State(state): State<Arc<ShimState>>, Json(body): Json<serde_json::Value>) -> impl IntoResponse {
    let Some(job) = state.actor.current_job() else {
        warn!("updateEventRanges called with no job assigned yet");
        return StatusCode::BAD_REQUEST;
    };
    match EventRangeUpdateDto::parse(job.panda_id, &body) {
        Ok(dto) => {
            let msg = WorkerMessage::new(state.worker_id.clone(), WorkerMessageKind::UpdateEventRanges(dto));
            let _ = state.to_driver.send(msg).await;
            StatusCode::OK
        }
        Err(err) => {
            warn!(error = %err, "discarding malformed updateEventRanges body");
            StatusCode::BAD_REQUEST
        }
    }
}

async fn update_job(State(state): State<Arc<ShimState>>, Json(body): Json<serde_json::Value>) -> impl IntoResponse {
    let panda_id = state.actor.current_job().map(|j| j.panda_id).unwrap_or_else(|| raythena_core::PandaId::new(""));
    let fields = body.as_object().cloned().unwrap_or_default().into_iter().collect();
    let dto = JobUpdateDto { panda_id, fields };
    let msg = WorkerMessage::new(state.worker_id.clone(), WorkerMessageKind::UpdateJob(dto));
    // Forwarded unconditionally; the payload gets a bare 200, no echo.
    let _ = state.to_driver.send(msg).await;
    StatusCode::OK
}

async fn not_implemented() -> impl IntoResponse {
    StatusCode::NOT_IMPLEMENTED
}
