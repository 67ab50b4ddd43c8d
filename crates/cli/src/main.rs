// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! `raythena-driver`: process entrypoint wiring CLI flags, config, and the
//! Harvester adapter into a running [`raythena_driver::Driver`] (spec §6).

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use raythena_driver::{Config, Driver};
use raythena_harvester::FileMessengerAdapter;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Single-command flags-only CLI (spec.md §6: no subcommands). Overrides
/// are applied to the parsed TOML before validation, mirroring the
/// original's parse-then-override-then-validate order.
#[derive(Parser, Debug)]
#[command(name = "raythena-driver", about = "Event-range dispatcher driver")]
struct CliArgs {
    /// Path to the TOML config file.
    #[arg(long, default_value = "raythena.toml")]
    config: PathBuf,

    #[arg(long = "payload-bindir")]
    payload_bindir: Option<String>,

    #[arg(long = "payload-scratch-root")]
    payload_scratch_root: Option<String>,

    #[arg(long = "harvester-endpoint")]
    harvester_endpoint: Option<String>,

    #[arg(long = "harvester-kind")]
    harvester_kind: Option<String>,

    #[arg(long = "cluster-n-workers")]
    cluster_n_workers: Option<u32>,

    #[arg(long = "resources-core-per-node")]
    resources_core_per_node: Option<u32>,

    #[arg(long = "resources-worker-port")]
    resources_worker_port: Option<u16>,

    #[arg(long = "log-level")]
    log_level: Option<String>,
}

impl CliArgs {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(v) = &self.payload_bindir {
            config.payload.bindir = v.clone();
        }
        if let Some(v) = &self.payload_scratch_root {
            config.payload.scratch_root = v.clone();
        }
        if let Some(v) = &self.harvester_endpoint {
            config.harvester.endpoint = v.clone();
        }
        if let Some(v) = &self.harvester_kind {
            config.harvester.kind = v.clone();
        }
        if let Some(v) = self.cluster_n_workers {
            config.cluster.n_workers = v;
        }
        if let Some(v) = self.resources_core_per_node {
            config.resources.core_per_node = v;
        }
        if let Some(v) = self.resources_worker_port {
            config.resources.worker_port = Some(v);
        }
        if let Some(v) = &self.log_level {
            config.logging.level = v.clone();
        }
    }
}

fn load_config(args: &CliArgs) -> Result<Config> {
    let raw = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading config file {}", args.config.display()))?;
    let mut config = Config::parse_unvalidated(&raw).context("parsing config")?;
    args.apply_overrides(&mut config);
    config.validate().context("validating config")?;
    Ok(config)
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging.level);

    if let Err(err) = run(config).await {
        error!(error = %err, "driver exited with an error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(config: Config) -> Result<()> {
    if config.harvester.kind != "file" {
        return Err(anyhow!(
            "unsupported harvester.kind {:?}: only \"file\" is wired to a real Harvester transport",
            config.harvester.kind
        ));
    }
    let adapter = FileMessengerAdapter::new(config.harvester.endpoint.clone());
    let (driver, handles) = Driver::bootstrap(&config, adapter).await.context("bootstrapping driver")?;

    let cancel = handles.cancel.clone();
    let shutdown = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            cancel.cancel();
        }
    });

    driver.run().await?;
    shutdown.abort();

    for worker in handles.workers {
        if let Err(err) = worker.await.context("joining worker task")? {
            error!(error = %err, "worker actor exited with an error");
        }
    }

    Ok(())
}
