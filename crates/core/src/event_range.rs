// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

//! EventRange: the smallest schedulable unit of work within a job.

use crate::ids::EventRangeId;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an [`EventRange`].
///
/// Transitions (enforced by `raythena-bookkeeper`, not here):
/// `Available -> Assigned` on fetch, `Assigned -> Running` on a
/// payload-reported start, `Assigned|Running -> Done|Failed` on a
/// payload-reported completion, and `Assigned|Running -> Available` when a
/// worker terminates without reporting completion.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeStatus {
    #[default]
    Available,
    Assigned,
    Running,
    Done,
    Failed,
}

impl RangeStatus {
    /// True once the range is done or failed — a `Done ∪ Failed` member.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RangeStatus::Done | RangeStatus::Failed)
    }

    /// Parse the upstream `eventStatus` string used in range updates.
    ///
    /// Unknown values return `None` so callers can discard the update
    /// rather than panicking on a malformed payload.
    pub fn from_upstream(raw: &str) -> Option<RangeStatus> {
        match raw {
            "running" => Some(RangeStatus::Running),
            "finished" | "done" => Some(RangeStatus::Done),
            "failed" => Some(RangeStatus::Failed),
            _ => None,
        }
    }
}

/// A unit of work belonging to one [`Job`](crate::Job).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRange {
    #[serde(rename = "eventRangeID")]
    pub event_range_id: EventRangeId,
    /// Opaque physical-file-name / offset payload, forwarded to the payload
    /// process verbatim; the dispatcher never interprets it.
    #[serde(rename = "PFN")]
    pub pfn: String,
    #[serde(rename = "startEvent")]
    pub start_event: u64,
    #[serde(rename = "lastEvent")]
    pub last_event: u64,
    #[serde(skip)]
    pub status: RangeStatus,
}

impl EventRange {
    pub fn new(id: impl Into<EventRangeId>, pfn: impl Into<String>, start: u64, last: u64) -> Self {
        Self {
            event_range_id: id.into(),
            pfn: pfn.into(),
            start_event: start,
            last_event: last,
            status: RangeStatus::Available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_covers_done_and_failed_only() {
        assert!(RangeStatus::Done.is_terminal());
        assert!(RangeStatus::Failed.is_terminal());
        assert!(!RangeStatus::Running.is_terminal());
        assert!(!RangeStatus::Available.is_terminal());
        assert!(!RangeStatus::Assigned.is_terminal());
    }

    #[test]
    fn from_upstream_rejects_unknown_status() {
        assert_eq!(RangeStatus::from_upstream("bogus"), None);
        assert_eq!(RangeStatus::from_upstream("finished"), Some(RangeStatus::Done));
    }
}
