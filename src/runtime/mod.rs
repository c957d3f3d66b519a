//! Container-runtime collaborator.
//!
//! The engine only talks to [`ContainerRuntime`]; [`cli::CliRuntime`] is the
//! production implementation driving the `podman` (or `docker`) binary.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

pub mod cli;

/// A mount attached to a transient worker container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountSpec {
    /// Runtime-managed named volume.
    Volume { destination: String, name: String },
    /// Host path, mounted read-write with recursive bind semantics.
    Bind {
        destination: String,
        source: PathBuf,
        options: Vec<String>,
    },
}

impl MountSpec {
    pub fn volume(name: &str, destination: impl Into<String>) -> Self {
        MountSpec::Volume {
            destination: destination.into(),
            name: name.to_string(),
        }
    }

    pub fn bind(source: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        MountSpec::Bind {
            destination: destination.into(),
            source: source.into(),
            options: vec!["rw".to_string(), "rbind".to_string()],
        }
    }

    pub fn destination(&self) -> &str {
        match self {
            MountSpec::Volume { destination, .. } | MountSpec::Bind { destination, .. } => {
                destination
            }
        }
    }
}

/// Renders the `-v` argument form: `name:dest` or `source:dest[:options]`.
impl fmt::Display for MountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountSpec::Volume { destination, name } => write!(f, "{}:{}", name, destination),
            MountSpec::Bind {
                destination,
                source,
                options,
            } => {
                write!(f, "{}:{}", source.display(), destination)?;
                if !options.is_empty() {
                    write!(f, ":{}", options.join(","))?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub image: String,
    pub mounts: Vec<MountSpec>,
    pub remove: bool,
    pub command: Vec<String>,
}

pub trait ContainerRuntime {
    fn image_exists(&self, name: &str) -> Result<bool>;
    fn image_build(&self, tag: &str, build_source: &Path) -> Result<()>;
    /// Returns the new container id.
    fn container_create(&self, spec: &WorkerSpec) -> Result<String>;
    fn container_start(&self, id: &str) -> Result<()>;
    /// Blocks until the container exits and returns its exit code, or `None`
    /// when `timeout` expired first.
    fn container_wait(&self, id: &str, timeout: Option<Duration>) -> Result<Option<i32>>;
    fn container_stop(&self, id: &str) -> Result<()>;
    /// Force-remove a worker in any state, including one that never started.
    fn container_remove(&self, id: &str) -> Result<()>;
    fn container_pause(&self, name: &str) -> Result<()>;
    fn container_unpause(&self, name: &str) -> Result<()>;
}

/// Build the worker image unless it is already present.
pub fn prepare_image(
    runtime: &dyn ContainerRuntime,
    image: &str,
    build_source: Option<&Path>,
) -> Result<()> {
    tracing::info!(image, "checking for backup image");
    if runtime.image_exists(image)? {
        return Ok(());
    }
    let Some(source) = build_source else {
        return Err(crate::error::ConfigError::Invalid(format!(
            "backup image {} does not exist and backup.image_build_source is not set",
            image
        ))
        .into());
    };
    tracing::info!(image, source = %source.display(), "backup image missing, building");
    runtime.image_build(image, source)
}


#[cfg(test)]
mod tests {
    use super::fake::RecordingRuntime;
    use super::*;

    #[test]
    fn existing_image_is_not_rebuilt() {
        let runtime = RecordingRuntime::default();
        runtime.images.borrow_mut().insert("volvault-rsync".to_string());
        prepare_image(&runtime, "volvault-rsync", Some(Path::new("/build"))).expect("prepare");
        assert_eq!(runtime.calls(), vec!["image_exists volvault-rsync"]);
    }

    #[test]
    fn missing_image_is_built_from_source() {
        let runtime = RecordingRuntime::default();
        prepare_image(&runtime, "volvault-rsync", Some(Path::new("/build"))).expect("prepare");
        assert_eq!(
            runtime.calls(),
            vec!["image_exists volvault-rsync", "image_build volvault-rsync /build"]
        );
    }

    #[test]
    fn missing_image_without_source_is_a_config_error() {
        let runtime = RecordingRuntime::default();
        let err = prepare_image(&runtime, "volvault-rsync", None).expect_err("must fail");
        assert!(err.to_string().contains("image_build_source"));
    }

    #[test]
    fn bind_mounts_are_recursive_and_writable() {
        let mount = MountSpec::bind("/srv/data", "/volumes/data");
        assert_eq!(mount.destination(), "/volumes/data");
        match mount {
            MountSpec::Bind { options, .. } => assert_eq!(options, vec!["rw", "rbind"]),
            MountSpec::Volume { .. } => panic!("expected bind"),
        }
    }

    #[test]
    fn mounts_render_as_volume_arguments() {
        assert_eq!(MountSpec::volume("cache", "/volumes/cache").to_string(), "cache:/volumes/cache");
        assert_eq!(
            MountSpec::bind("/srv/data", "/volumes/data").to_string(),
            "/srv/data:/volumes/data:rw,rbind"
        );
        let plain = MountSpec::Bind {
            destination: "/root/.ssh".to_string(),
            source: PathBuf::from("/etc/volvault/ssh"),
            options: Vec::new(),
        };
        assert_eq!(plain.to_string(), "/etc/volvault/ssh:/root/.ssh");
    }
}
