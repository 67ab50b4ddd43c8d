// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

//! Wire DTOs: the JSON shapes the localhost HTTP shim and the Harvester
//! boundary actually exchange.

use raythena_core::PandaId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// One job's worth of range request parameters inside an
/// [`EventRangeRequestDto`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRequestEntry {
    #[serde(rename = "nRanges")]
    pub n_ranges: u32,
    #[serde(rename = "taskID")]
    pub task_id: String,
    #[serde(rename = "jobsetID")]
    pub jobset_id: String,
}

/// `PandaID -> {nRanges, taskID, jobsetID}` (spec §4.1).
///
/// A single request may name multiple jobs; per spec, a worker only ever
/// populates (and the Driver only ever reads) the first entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventRangeRequestDto {
    pub request: HashMap<PandaId, RangeRequestEntry>,
}

impl EventRangeRequestDto {
    pub fn single(panda_id: PandaId, n_ranges: u32, task_id: String, jobset_id: String) -> Self {
        let mut request = HashMap::new();
        request.insert(panda_id, RangeRequestEntry { n_ranges, task_id, jobset_id });
        Self { request }
    }

    /// The first (and per spec, only meaningfully used) entry.
    pub fn first(&self) -> Option<(&PandaId, &RangeRequestEntry)> {
        self.request.iter().next()
    }
}

/// One range's reported transition, as sent by the payload to
/// `updateEventRanges`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeUpdateEntry {
    #[serde(rename = "eventRangeID")]
    pub event_range_id: String,
    #[serde(rename = "eventStatus")]
    pub event_status: String,
}

/// A range-update payload as received on `/server/panda/updateEventRanges`.
///
/// The upstream schema nests the real content as a JSON-encoded string
/// under `eventRanges[0]` (spec §4.2); [`EventRangeUpdateDto::parse`]
/// unwraps that nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRangeUpdateDto {
    pub panda_id: PandaId,
    pub ranges: Vec<RangeUpdateEntry>,
}

#[derive(Debug, Error)]
pub enum DtoError {
    #[error("missing eventRanges[0] in update body")]
    MissingEventRanges,
    #[error("malformed eventRanges[0] json: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl EventRangeUpdateDto {
    /// Parse the raw `{"eventRanges": ["<json>"]}` body the upstream
    /// protocol uses, associating it with the job it was fetched against.
    pub fn parse(panda_id: PandaId, body: &serde_json::Value) -> Result<Self, DtoError> {
        let raw = body
            .get("eventRanges")
            .and_then(|v| v.get(0))
            .and_then(|v| v.as_str())
            .ok_or(DtoError::MissingEventRanges)?;
        let ranges: Vec<RangeUpdateEntry> = serde_json::from_str(raw)?;
        Ok(Self { panda_id, ranges })
    }
}

/// Arbitrary job-update body, forwarded to the Driver verbatim (spec §9:
/// "surface an UPDATE_JOB message unconditionally").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobUpdateDto {
    pub panda_id: PandaId,
    pub fields: HashMap<String, serde_json::Value>,
}
