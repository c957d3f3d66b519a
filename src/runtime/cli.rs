use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, VolvaultError};
use crate::runtime::{ContainerRuntime, WorkerSpec};
use crate::util::command::{describe_command, run_captured, CommandOutput};

/// Drives the runtime through its command line client, optionally pointed at
/// a specific API socket.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    binary: String,
    socket: Option<PathBuf>,
}

impl CliRuntime {
    pub fn new(binary: impl Into<String>, socket: Option<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            socket,
        }
    }

    fn is_docker(&self) -> bool {
        Path::new(&self.binary)
            .file_name()
            .map(|name| name == "docker")
            .unwrap_or(false)
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(socket) = &self.socket {
            let url = format!("unix://{}", socket.display());
            if self.is_docker() {
                cmd.arg("-H").arg(url);
            } else {
                cmd.arg("--url").arg(url);
            }
        }
        cmd
    }

    pub(crate) fn create_command(&self, spec: &WorkerSpec) -> Command {
        let mut cmd = self.base_command();
        cmd.arg("create");
        if spec.remove {
            cmd.arg("--rm");
        }
        for mount in &spec.mounts {
            cmd.arg("-v").arg(mount.to_string());
        }
        cmd.arg(&spec.image);
        for arg in &spec.command {
            cmd.arg(arg);
        }
        cmd
    }

    fn run(&self, mut cmd: Command, timeout: Option<Duration>) -> Result<CommandOutput> {
        let described = describe_command(&cmd);
        debug!(command = %described, "runtime call");
        let output = run_captured(&mut cmd, timeout)?;
        if output.timed_out {
            return Ok(output);
        }
        if output.code != 0 {
            return Err(VolvaultError::Runtime(format!(
                "{} failed with exit code {}: {}",
                described,
                output.code,
                output.stderr.trim()
            )));
        }
        Ok(output)
    }

    fn simple(&self, args: &[&str]) -> Result<()> {
        let mut cmd = self.base_command();
        cmd.args(args);
        self.run(cmd, None).map(|_| ())
    }
}

impl ContainerRuntime for CliRuntime {
    fn image_exists(&self, name: &str) -> Result<bool> {
        let mut cmd = self.base_command();
        cmd.arg("image").arg("inspect").arg(name);
        let output = run_captured(&mut cmd, None)?;
        Ok(output.code == 0)
    }

    fn image_build(&self, tag: &str, build_source: &Path) -> Result<()> {
        let mut cmd = self.base_command();
        cmd.arg("build").arg("-t").arg(tag);
        if build_source.is_file() {
            let context = build_source.parent().unwrap_or_else(|| Path::new("."));
            cmd.arg("-f").arg(build_source).arg(context);
        } else {
            cmd.arg(build_source);
        }
        self.run(cmd, None).map(|_| ())
    }

    fn container_create(&self, spec: &WorkerSpec) -> Result<String> {
        let output = self.run(self.create_command(spec), None)?;
        let id = output.stdout.trim().lines().last().unwrap_or("").trim().to_string();
        if id.is_empty() {
            return Err(VolvaultError::Runtime(
                "create returned no container id".to_string(),
            ));
        }
        Ok(id)
    }

    fn container_start(&self, id: &str) -> Result<()> {
        self.simple(&["start", id])
    }

    fn container_wait(&self, id: &str, timeout: Option<Duration>) -> Result<Option<i32>> {
        let mut cmd = self.base_command();
        cmd.arg("wait").arg(id);
        let output = self.run(cmd, timeout)?;
        if output.timed_out {
            return Ok(None);
        }
        let code = output
            .stdout
            .trim()
            .lines()
            .last()
            .and_then(|line| line.trim().parse::<i32>().ok())
            .ok_or_else(|| {
                VolvaultError::Runtime(format!(
                    "wait {}: unexpected output {:?}",
                    id,
                    output.stdout.trim()
                ))
            })?;
        Ok(Some(code))
    }

    fn container_stop(&self, id: &str) -> Result<()> {
        self.simple(&["stop", id])
    }

    fn container_remove(&self, id: &str) -> Result<()> {
        self.simple(&["rm", "-f", id])
    }

    fn container_pause(&self, name: &str) -> Result<()> {
        self.simple(&["pause", name])
    }

    fn container_unpause(&self, name: &str) -> Result<()> {
        self.simple(&["unpause", name])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MountSpec;

    fn spec() -> WorkerSpec {
        WorkerSpec {
            image: "volvault-rsync".to_string(),
            mounts: vec![
                MountSpec::volume("cache", "/volumes/cache"),
                MountSpec::bind("/backups", "/destination/"),
            ],
            remove: true,
            command: vec!["rsync".to_string(), "-rlptD".to_string()],
        }
    }

    #[test]
    fn create_command_for_podman_socket() {
        let runtime = CliRuntime::new("podman", Some(PathBuf::from("/run/podman/podman.sock")));
        let cmd = runtime.create_command(&spec());
        assert_eq!(
            describe_command(&cmd),
            "podman --url unix:///run/podman/podman.sock create --rm -v cache:/volumes/cache \
             -v /backups:/destination/:rw,rbind volvault-rsync rsync -rlptD"
        );
    }

    #[test]
    fn create_command_for_docker_uses_host_flag() {
        let runtime = CliRuntime::new("/usr/bin/docker", Some(PathBuf::from("/var/run/docker.sock")));
        let cmd = runtime.create_command(&spec());
        assert!(describe_command(&cmd).starts_with("/usr/bin/docker -H unix:///var/run/docker.sock create --rm"));
    }

    #[test]
    fn no_socket_means_default_connection() {
        let runtime = CliRuntime::new("podman", None);
        let mut worker = spec();
        worker.remove = false;
        worker.mounts.clear();
        let cmd = runtime.create_command(&worker);
        assert_eq!(describe_command(&cmd), "podman create volvault-rsync rsync -rlptD");
    }

    #[test]
    fn failing_client_reports_runtime_error() {
        let runtime = CliRuntime::new("false", None);
        let err = runtime.container_pause("web").expect_err("must fail");
        assert!(matches!(err, VolvaultError::Runtime(_)));
        assert!(!runtime.image_exists("anything").expect("inspect"));
    }
}
