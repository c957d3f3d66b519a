use std::path::{Path, PathBuf};

use crate::config::model::VolumeEntry;
use crate::error::{ConfigError, Result};
use crate::runtime::MountSpec;
use crate::types::{VolumeKind, WorkerKind};
use crate::util::paths::with_trailing_slash;

pub const VOLUME_ROOT: &str = "/volumes";
pub const DESTINATION_MOUNT: &str = "/destination/";
pub const SSH_MOUNT: &str = "/root/.ssh";

/// Everything needed to move one volume: worker mounts, the two transfer
/// endpoints as seen by the worker, and the host paths to check beforehand.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVolume {
    pub name: String,
    pub worker: WorkerKind,
    pub mounts: Vec<MountSpec>,
    /// Where the live data is, from the worker's point of view.
    pub source: String,
    /// Where the backup copy is, from the worker's point of view.
    pub destination: String,
    pub secure_channel: bool,
    pub host_source: Option<PathBuf>,
    pub local_destination_root: Option<PathBuf>,
}

pub fn volume_mount_point(name: &str) -> String {
    format!("{}/{}", VOLUME_ROOT, name)
}

pub fn resolve_volume(entry: &VolumeEntry, ssh_certs_folder: &Path) -> Result<ResolvedVolume> {
    match entry.worker {
        WorkerKind::Container => resolve_for_container(entry, ssh_certs_folder),
        WorkerKind::Direct => resolve_for_host(entry),
    }
}

fn bind_source(entry: &VolumeEntry) -> Result<PathBuf> {
    match &entry.source {
        Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
        _ => Err(ConfigError::Invalid(format!(
            "volume {}: bind mount has no source path",
            entry.name
        ))
        .into()),
    }
}

fn resolve_for_container(entry: &VolumeEntry, ssh_certs_folder: &Path) -> Result<ResolvedVolume> {
    let mount_point = volume_mount_point(&entry.name);
    let mut mounts = Vec::new();
    let mut host_source = None;
    match entry.kind {
        VolumeKind::Named => mounts.push(MountSpec::volume(&entry.name, mount_point.clone())),
        VolumeKind::Bind => {
            let source = bind_source(entry)?;
            mounts.push(MountSpec::bind(source.clone(), mount_point.clone()));
            host_source = Some(source);
        }
    }

    let (destination, local_destination_root) = if entry.secure_channel {
        mounts.push(MountSpec::bind(ssh_certs_folder, SSH_MOUNT));
        let remote = format!("{}/{}/", entry.destination.trim_end_matches('/'), entry.name);
        (remote, None)
    } else {
        mounts.push(MountSpec::bind(entry.destination.as_str(), DESTINATION_MOUNT));
        let local = format!("{}{}/{}/", DESTINATION_MOUNT, entry.name, entry.name);
        (local, Some(PathBuf::from(&entry.destination)))
    };

    Ok(ResolvedVolume {
        name: entry.name.clone(),
        worker: WorkerKind::Container,
        mounts,
        source: with_trailing_slash(&mount_point),
        destination,
        secure_channel: entry.secure_channel,
        host_source,
        local_destination_root,
    })
}

fn resolve_for_host(entry: &VolumeEntry) -> Result<ResolvedVolume> {
    if entry.kind == VolumeKind::Named {
        return Err(ConfigError::Invalid(format!(
            "volume {}: named volumes need a container worker",
            entry.name
        ))
        .into());
    }
    let source = bind_source(entry)?;
    Ok(ResolvedVolume {
        name: entry.name.clone(),
        worker: WorkerKind::Direct,
        mounts: Vec::new(),
        source: with_trailing_slash(&source.to_string_lossy()),
        destination: with_trailing_slash(&entry.destination),
        secure_channel: entry.secure_channel,
        host_source: Some(source),
        local_destination_root: if entry.secure_channel {
            None
        } else {
            Some(PathBuf::from(&entry.destination))
        },
    })
}
