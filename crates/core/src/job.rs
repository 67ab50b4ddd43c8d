// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

//! Job: an upstream-issued work specification, immutable once admitted.

use crate::ids::PandaId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A unit of upstream work handed out by Harvester.
///
/// Carries the fields the dispatch core reads directly plus an arbitrary
/// passthrough bag forwarded verbatim to the payload's `getJob` response.
/// Immutable once admitted into the [`PandaJobQueue`](crate) — nothing in
/// this workspace mutates a `Job` after `add_jobs` accepts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "PandaID")]
    pub panda_id: PandaId,
    #[serde(rename = "taskID")]
    pub task_id: String,
    #[serde(rename = "jobsetID")]
    pub jobset_id: String,
    #[serde(rename = "prodSourceLabel")]
    pub prod_source_label: String,
    /// Comma-separated list of input files, as the upstream schema sends it.
    #[serde(rename = "inFiles")]
    pub in_files: String,
    /// Arbitrary upstream fields not otherwise modeled, forwarded verbatim.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Job {
    /// Split `inFiles` into its component paths.
    pub fn input_files(&self) -> Vec<&str> {
        self.in_files.split(',').filter(|s| !s.is_empty()).collect()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub struct JobBuilder {
    panda_id: String,
    task_id: String,
    jobset_id: String,
    prod_source_label: String,
    in_files: String,
    extra: HashMap<String, serde_json::Value>,
}

#[cfg(any(test, feature = "test-support"))]
impl JobBuilder {
    pub fn new(panda_id: impl Into<String>) -> Self {
        Self {
            panda_id: panda_id.into(),
            task_id: "task-0".to_string(),
            jobset_id: "jobset-0".to_string(),
            prod_source_label: "managed".to_string(),
            in_files: String::new(),
            extra: HashMap::new(),
        }
    }

    pub fn task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }

    pub fn in_files(mut self, in_files: impl Into<String>) -> Self {
        self.in_files = in_files.into();
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn build(self) -> Job {
        Job {
            panda_id: PandaId::new(self.panda_id),
            task_id: self.task_id,
            jobset_id: self.jobset_id,
            prod_source_label: self.prod_source_label,
            in_files: self.in_files,
            extra: self.extra,
        }
    }
}
