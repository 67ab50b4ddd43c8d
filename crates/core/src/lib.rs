// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! raythena-core: shared data model for the event-range dispatcher.
//!
//! Defines the entities described by the dispatch core: [`Job`],
//! [`EventRange`] and its lifecycle, and the identifiers used to key them.
//! Every other crate in the workspace depends on this one; it depends on
//! nothing but `serde`.

pub mod event_range;
pub mod ids;
pub mod job;

pub use event_range::{EventRange, RangeStatus};
pub use ids::{EventRangeId, PandaId, WorkerId};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobBuilder;
pub use job::Job;
