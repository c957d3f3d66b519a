use std::io::{self, Write};

use tracing::{debug, error, info};

use crate::backup::lifecycle::{Lifecycle, PauseTracker};
use crate::backup::precheck::check_paths;
use crate::backup::resolve::resolve_volume;
use crate::backup::rsync::build_transfer_command;
use crate::backup::worker::Executor;
use crate::config::model::{ContainerEntry, Settings, VolumeEntry};
use crate::error::{Result, VolvaultError};
use crate::runtime::ContainerRuntime;
use crate::types::{Mode, RunMode, WorkerKind};

pub mod lifecycle;
pub mod precheck;
pub mod resolve;
pub mod rsync;
pub mod worker;

/// Result of one volume within one cycle. Only used for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeOutcome {
    pub container: String,
    pub volume: String,
    pub attempted: bool,
    pub succeeded: bool,
    pub skip_reason: Option<String>,
    /// Worker diagnostic for an attempted transfer that failed.
    pub diagnostic: Option<String>,
}

impl VolumeOutcome {
    fn skipped(container: &str, volume: &str, reason: String) -> Self {
        Self {
            container: container.to_string(),
            volume: volume.to_string(),
            attempted: false,
            succeeded: false,
            skip_reason: Some(reason),
            diagnostic: None,
        }
    }

    fn succeeded(container: &str, volume: &str) -> Self {
        Self {
            container: container.to_string(),
            volume: volume.to_string(),
            attempted: true,
            succeeded: true,
            skip_reason: None,
            diagnostic: None,
        }
    }

    fn failed(container: &str, volume: &str, diagnostic: String) -> Self {
        Self {
            container: container.to_string(),
            volume: volume.to_string(),
            attempted: true,
            succeeded: false,
            skip_reason: None,
            diagnostic: Some(diagnostic),
        }
    }
}

/// Succeeded/failed/skipped counts over a set of volume outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl<'a> FromIterator<&'a VolumeOutcome> for Tally {
    fn from_iter<I: IntoIterator<Item = &'a VolumeOutcome>>(iter: I) -> Self {
        let mut tally = Tally::default();
        for outcome in iter {
            if !outcome.attempted {
                tally.skipped += 1;
            } else if outcome.succeeded {
                tally.succeeded += 1;
            } else {
                tally.failed += 1;
            }
        }
        tally
    }
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub outcomes: Vec<VolumeOutcome>,
}

impl CycleReport {
    pub fn tally(&self) -> Tally {
        self.outcomes.iter().collect()
    }

    pub fn container_tally(&self, container: &str) -> Tally {
        self.outcomes.iter().filter(|o| o.container == container).collect()
    }

    pub fn succeeded(&self) -> usize {
        self.tally().succeeded
    }

    pub fn failed(&self) -> usize {
        self.tally().failed
    }

    pub fn skipped(&self) -> usize {
        self.tally().skipped
    }
}

/// One pass over every configured container and volume.
pub struct CycleRunner<'a> {
    settings: &'a Settings,
    containers: &'a [ContainerEntry],
    runtime: &'a dyn ContainerRuntime,
    tracker: PauseTracker,
    run_mode: RunMode,
}

impl<'a> CycleRunner<'a> {
    pub fn new(
        settings: &'a Settings,
        containers: &'a [ContainerEntry],
        runtime: &'a dyn ContainerRuntime,
        tracker: PauseTracker,
        run_mode: RunMode,
    ) -> Self {
        Self {
            settings,
            containers,
            runtime,
            tracker,
            run_mode,
        }
    }

    pub fn run_cycle(&self) -> CycleReport {
        let mode = self.settings.mode;
        let lifecycle = Lifecycle::new(self.runtime, self.tracker.clone(), self.run_mode);
        let executor = Executor::new(
            self.runtime,
            &self.settings.image_name,
            self.settings.transfer_timeout,
        );
        let mut report = CycleReport::default();

        for container in self.containers {
            info!(container = %container.name, mode = mode.as_str(), "start {} of container", mode.as_str());
            let outcomes = lifecycle.bracket(container, || {
                container
                    .volumes
                    .iter()
                    .map(|volume| self.run_volume(&executor, container, volume, mode))
                    .collect::<Vec<_>>()
            });
            let tally: Tally = outcomes.iter().collect();
            info!(
                container = %container.name,
                succeeded = tally.succeeded,
                failed = tally.failed,
                skipped = tally.skipped,
                "container finished"
            );
            report.outcomes.extend(outcomes);
        }

        let tally = report.tally();
        info!(
            mode = mode.as_str(),
            succeeded = tally.succeeded,
            failed = tally.failed,
            skipped = tally.skipped,
            "cycle finished"
        );
        report
    }

    fn run_volume(
        &self,
        executor: &Executor<'_>,
        container: &ContainerEntry,
        volume: &VolumeEntry,
        mode: Mode,
    ) -> VolumeOutcome {
        let resolved = match resolve_volume(volume, &self.settings.ssh_certs_folder) {
            Ok(resolved) => resolved,
            Err(err) => {
                error!(container = %container.name, volume = %volume.name, error = %err, "cannot resolve volume");
                return VolumeOutcome::skipped(&container.name, &volume.name, err.to_string());
            }
        };

        if let Err(err) = check_paths(&resolved, mode, self.run_mode) {
            error!(container = %container.name, volume = %volume.name, error = %err, "could not run {}", mode.as_str());
            return VolumeOutcome::skipped(&container.name, &volume.name, err.to_string());
        }

        let command = build_transfer_command(
            &resolved.source,
            &resolved.destination,
            resolved.secure_channel,
            mode,
        );

        if self.run_mode.dry_run {
            println!(
                "dry-run: {}/{} ({} worker): {}",
                container.name,
                volume.name,
                resolved.worker.as_str(),
                command
            );
            return VolumeOutcome::skipped(&container.name, &volume.name, "dry run".to_string());
        }

        match executor.execute(&resolved, &command) {
            Ok(report) if report.succeeded => {
                debug!(container = %container.name, volume = %volume.name, diagnostic = %report.diagnostic, "worker exited");
                info!(container = %container.name, volume = %volume.name, "transfer finished");
                VolumeOutcome::succeeded(&container.name, &volume.name)
            }
            Ok(report) => {
                let err = VolvaultError::Transfer(report.diagnostic.clone());
                error!(container = %container.name, volume = %volume.name, error = %err, "transfer failed");
                VolumeOutcome::failed(&container.name, &volume.name, report.diagnostic)
            }
            Err(err) => {
                error!(container = %container.name, volume = %volume.name, error = %err, "worker failed to run");
                VolumeOutcome::failed(&container.name, &volume.name, err.to_string())
            }
        }
    }
}

/// Print every container and volume with the command a cycle would run.
pub fn print_plan(settings: &Settings, containers: &[ContainerEntry]) -> Result<()> {
    let stdout = io::stdout();
    write_plan(&mut stdout.lock(), settings, containers)
}

pub fn write_plan<W: Write>(out: &mut W, settings: &Settings, containers: &[ContainerEntry]) -> Result<()> {
    writeln!(out, "mode: {}", settings.mode.as_str())?;
    writeln!(out, "time to run: {}", settings.time_to_run)?;
    for container in containers {
        writeln!(out, "container: {}", container.name)?;
        writeln!(out, "  pause: {}", container.need_to_pause)?;
        for volume in &container.volumes {
            let resolved = resolve_volume(volume, &settings.ssh_certs_folder)?;
            let command = build_transfer_command(
                &resolved.source,
                &resolved.destination,
                resolved.secure_channel,
                settings.mode,
            );
            writeln!(
                out,
                "  volume: {} ({}, {} worker)",
                volume.name,
                volume.kind.as_str(),
                resolved.worker.as_str()
            )?;
            for mount in &resolved.mounts {
                writeln!(out, "    mount: {}", mount)?;
            }
            writeln!(out, "    command: {}", command)?;
        }
    }
    Ok(())
}

/// Whether any volume needs the worker image.
pub fn needs_worker_image(containers: &[ContainerEntry]) -> bool {
    containers
        .iter()
        .flat_map(|c| c.volumes.iter())
        .any(|v| v.worker == WorkerKind::Container)
}
