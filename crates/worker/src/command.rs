// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Raythena Contributors

//! Builds the payload subprocess command: workdir layout, input symlinks,
//! environment, and the flags telling the payload where the local shim
//! listens (spec §4.3 build-command derivation).

use crate::WorkerError;
use raythena_core::{Job, WorkerId};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Derives the `tokio::process::Command` used to launch one payload run.
#[derive(Debug, Clone)]
pub struct PayloadCommandBuilder {
    bindir: PathBuf,
    scratch_root: PathBuf,
}

impl PayloadCommandBuilder {
    pub fn new(bindir: impl Into<PathBuf>, scratch_root: impl Into<PathBuf>) -> Self {
        Self { bindir: bindir.into(), scratch_root: scratch_root.into() }
    }

    /// Prepare `<scratch_root>/<worker_id>_<pid>`, symlinking each of the
    /// job's input files into it, and return the workdir path.
    pub fn prepare_workdir(&self, worker_id: &WorkerId, job: &Job, pid: u32) -> Result<PathBuf, WorkerError> {
        let workdir = self.scratch_root.join(format!("{}_{}", worker_id.as_str(), pid));
        std::fs::create_dir_all(&workdir).map_err(|source| WorkerError::WorkdirSetup {
            path: workdir.display().to_string(),
            source,
        })?;
        for input in job.input_files() {
            let source = Path::new(input);
            let Some(name) = source.file_name() else { continue };
            let link = workdir.join(name);
            if link.exists() {
                continue;
            }
            symlink(source, &link).map_err(|source| WorkerError::WorkdirSetup {
                path: link.display().to_string(),
                source,
            })?;
        }
        Ok(workdir)
    }

    /// Build the payload's `Command`, wired to call back into `shim_addr`.
    pub fn build(&self, workdir: &Path, shim_addr: SocketAddr) -> Command {
        let mut cmd = Command::new(&self.bindir);
        cmd.current_dir(workdir)
            .arg("--pilotpars")
            .arg(format!("--url=http://{}", shim_addr.ip()))
            .arg(format!("--port={}", shim_addr.port()))
            .env("PILOT_HTTP_URL", format!("http://{shim_addr}"))
            .kill_on_drop(true);
        cmd
    }
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(not(unix))]
fn symlink(original: &Path, link: &Path) -> std::io::Result<()> {
    std::fs::copy(original, link).map(|_| ())
}
