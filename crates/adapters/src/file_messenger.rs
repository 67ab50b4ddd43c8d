// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

//! Filesystem drop-box Harvester transport: requests and replies are
//! exchanged as JSON files in a shared directory, for Harvester deployments
//! that speak this protocol instead of an HTTP/RPC endpoint.

use crate::{HarvesterError, HarvesterHandle, RangeReply, CHANNEL_CAPACITY};
use raythena_core::{EventRange, Job, PandaId};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
const DEFAULT_MAX_POLLS: u32 = 150; // ~30s at the default interval

/// Drop-box adapter: writes a request file, polls for the matching reply
/// file, deletes it once read.
///
/// File names are fixed by convention within `dir`:
/// - `request_jobs` / `reply_jobs.json`
/// - `request_ranges_<pandaId>.json` / `reply_ranges_<pandaId>.json`
#[derive(Debug, Clone)]
pub struct FileMessengerAdapter {
    dir: PathBuf,
    poll_interval: Duration,
    max_polls: u32,
}

impl FileMessengerAdapter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), poll_interval: DEFAULT_POLL_INTERVAL, max_polls: DEFAULT_MAX_POLLS }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }
}

fn reply_path_for_ranges(dir: &Path, panda_id: &PandaId) -> PathBuf {
    dir.join(format!("reply_ranges_{}.json", panda_id.as_str()))
}

fn request_path_for_ranges(dir: &Path, panda_id: &PandaId) -> PathBuf {
    dir.join(format!("request_ranges_{}.json", panda_id.as_str()))
}

async fn wait_for_reply<T: serde::de::DeserializeOwned + Send + 'static>(
    path: PathBuf,
    poll_interval: Duration,
    max_polls: u32,
) -> Result<T, HarvesterError> {
    for _ in 0..max_polls {
        let candidate = path.clone();
        let body = tokio::task::spawn_blocking(move || std::fs::read_to_string(&candidate))
            .await
            .map_err(|e| HarvesterError::Io(std::io::Error::other(e)))?;
        match body {
            Ok(contents) => {
                let parsed = serde_json::from_str(&contents)?;
                let cleanup = path.clone();
                let _ = tokio::task::spawn_blocking(move || std::fs::remove_file(&cleanup)).await;
                return Ok(parsed);
            }
            Err(_) => sleep(poll_interval).await,
        }
    }
    Err(HarvesterError::UpstreamUnavailable(format!("timed out waiting for {}", path.display())))
}

async fn write_request(path: PathBuf, body: String) -> Result<(), HarvesterError> {
    tokio::task::spawn_blocking(move || std::fs::write(&path, body))
        .await
        .map_err(|e| HarvesterError::Io(std::io::Error::other(e)))??;
    Ok(())
}

#[async_trait::async_trait]
impl crate::HarvesterAdapter for FileMessengerAdapter {
    fn run(self) -> HarvesterHandle {
        let (job_req_tx, mut job_req_rx) = mpsc::channel::<()>(CHANNEL_CAPACITY);
        let (range_req_tx, mut range_req_rx) = mpsc::channel::<crate::RangeRequest>(CHANNEL_CAPACITY);
        let (jobs_tx, jobs_rx) = mpsc::channel::<Vec<Job>>(CHANNEL_CAPACITY);
        let (ranges_tx, ranges_rx) = mpsc::channel::<RangeReply>(CHANNEL_CAPACITY);

        let dir = self.dir;
        let poll_interval = self.poll_interval;
        let max_polls = self.max_polls;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    req = job_req_rx.recv() => {
                        let Some(()) = req else { break };
                        let request_path = dir.join("request_jobs");
                        if write_request(request_path, String::new()).await.is_err() {
                            warn!("failed to write job request marker");
                            continue;
                        }
                        let reply_path = dir.join("reply_jobs.json");
                        match wait_for_reply::<Vec<Job>>(reply_path, poll_interval, max_polls).await {
                            Ok(jobs) => {
                                debug!(count = jobs.len(), "file messenger delivered jobs");
                                if jobs_tx.send(jobs).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => warn!(error = %err, "job request timed out"),
                        }
                    }
                    req = range_req_rx.recv() => {
                        let Some(req) = req else { break };
                        let request_path = request_path_for_ranges(&dir, &req.panda_id);
                        let Ok(body) = serde_json::to_string(&req.entry) else { continue };
                        if write_request(request_path, body).await.is_err() {
                            warn!(panda_id = %req.panda_id, "failed to write range request");
                            continue;
                        }
                        let reply_path = reply_path_for_ranges(&dir, &req.panda_id);
                        match wait_for_reply::<Vec<EventRange>>(reply_path, poll_interval, max_polls).await {
                            Ok(ranges) => {
                                debug!(panda_id = %req.panda_id, count = ranges.len(), "file messenger delivered ranges");
                                if ranges_tx.send(RangeReply { panda_id: req.panda_id, ranges }).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => warn!(panda_id = %req.panda_id, error = %err, "range request timed out"),
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
