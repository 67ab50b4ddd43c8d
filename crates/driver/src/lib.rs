// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! raythena-driver: the control loop that fans event ranges out to worker
//! actors and routes results back to Harvester (spec §4.4, component C4).

mod config;
mod driver;
mod error;

pub use config::Config;
pub use driver::{Driver, DriverHandles};
pub use error::{ConfigError, DriverError};
