use std::time::Duration;

use tracing::{debug, warn};

use crate::backup::resolve::ResolvedVolume;
use crate::backup::rsync::{transfer_succeeded, TransferCommand};
use crate::error::Result;
use crate::runtime::{ContainerRuntime, WorkerSpec};
use crate::types::WorkerKind;
use crate::util::command::run_captured;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub succeeded: bool,
    pub diagnostic: String,
}

impl WorkerReport {
    fn from_exit(code: i32, detail: &str) -> Self {
        let detail = detail.trim();
        let diagnostic = if detail.is_empty() {
            format!("exit code {}", code)
        } else {
            format!("exit code {}: {}", code, detail)
        };
        Self {
            succeeded: transfer_succeeded(code),
            diagnostic,
        }
    }

    fn timed_out(timeout: Duration) -> Self {
        Self {
            succeeded: false,
            diagnostic: format!("timed out after {}s", timeout.as_secs()),
        }
    }
}

/// Runs one volume transfer and blocks until it finishes.
pub struct Executor<'a> {
    runtime: &'a dyn ContainerRuntime,
    image: &'a str,
    timeout: Option<Duration>,
}

impl<'a> Executor<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, image: &'a str, timeout: Option<Duration>) -> Self {
        Self {
            runtime,
            image,
            timeout,
        }
    }

    /// `Err` means the worker could not be launched at all; a worker that ran
    /// and failed is an `Ok` report with `succeeded == false`.
    pub fn execute(&self, resolved: &ResolvedVolume, command: &TransferCommand) -> Result<WorkerReport> {
        match resolved.worker {
            WorkerKind::Container => self.run_in_container(resolved, command),
            WorkerKind::Direct => self.run_on_host(command),
        }
    }

    fn run_in_container(&self, resolved: &ResolvedVolume, command: &TransferCommand) -> Result<WorkerReport> {
        let spec = WorkerSpec {
            image: self.image.to_string(),
            mounts: resolved.mounts.clone(),
            remove: true,
            command: command.to_vec(),
        };
        let id = self.runtime.container_create(&spec)?;
        debug!(volume = %resolved.name, container = %id, "worker created");
        // `--rm` only fires once the worker exits; a worker that never got
        // that far has to be removed by hand.
        let waited = self
            .runtime
            .container_start(&id)
            .and_then(|()| self.runtime.container_wait(&id, self.timeout));
        let exit = match waited {
            Ok(exit) => exit,
            Err(err) => {
                if let Err(rm_err) = self.runtime.container_remove(&id) {
                    warn!(container = %id, error = %rm_err, "could not remove worker");
                }
                return Err(err);
            }
        };
        match exit {
            Some(code) => Ok(WorkerReport::from_exit(code, "")),
            None => {
                if let Err(err) = self.runtime.container_stop(&id) {
                    warn!(container = %id, error = %err, "could not stop timed out worker");
                }
                Ok(WorkerReport::timed_out(self.timeout.unwrap_or_default()))
            }
        }
    }

    fn run_on_host(&self, command: &TransferCommand) -> Result<WorkerReport> {
        let mut cmd = command.to_command();
        let output = run_captured(&mut cmd, self.timeout)?;
        if output.timed_out {
            return Ok(WorkerReport::timed_out(self.timeout.unwrap_or_default()));
        }
        Ok(WorkerReport::from_exit(output.code, &output.stderr))
    }
}
