use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ContainerConfig, ContainerEntry, Settings, VolumeConfig, VolumeEntry};
use crate::error::{ConfigError, Result, VolvaultError};
use crate::types::{VolumeKind, WorkerKind};
use crate::util::paths::is_safe_name;

/// Destination policy applied to legacy `type/name/path` entries, which carry none of their own.
#[derive(Debug, Clone)]
pub struct ManifestDefaults {
    pub destination: String,
    pub remote: bool,
}

impl From<&Settings> for ManifestDefaults {
    fn from(settings: &Settings) -> Self {
        Self {
            destination: settings.destination.clone(),
            remote: settings.destination_remote,
        }
    }
}

pub fn load_manifest(path: &Path, defaults: &ManifestDefaults) -> Result<Vec<ContainerEntry>> {
    let contents = fs::read_to_string(path)
        .map_err(|e| VolvaultError::message(format!("open manifest {}: {}", path.display(), e)))?;
    parse_manifest(&contents, defaults)
}

pub fn parse_manifest(contents: &str, defaults: &ManifestDefaults) -> Result<Vec<ContainerEntry>> {
    let raw: Vec<ContainerConfig> =
        serde_json::from_str(contents).map_err(|e| ConfigError::Manifest(e.to_string()))?;

    let mut containers = Vec::new();
    let mut names = HashSet::new();
    for container in raw {
        let name = container.container_name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::Invalid("container_name is required".to_string()).into());
        }
        if !names.insert(name.clone()) {
            return Err(ConfigError::Invalid(format!("duplicate container {}", name)).into());
        }
        let mut volumes = Vec::new();
        let mut volume_names = HashSet::new();
        for volume in container.volumes {
            let entry = normalize_volume(volume, defaults)
                .map_err(|e| ConfigError::Invalid(format!("container {}: {}", name, e)))?;
            if !volume_names.insert(entry.name.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "container {}: duplicate volume {}",
                    name, entry.name
                ))
                .into());
            }
            volumes.push(entry);
        }
        containers.push(ContainerEntry {
            name,
            need_to_pause: container.need_to_pause,
            volumes,
        });
    }
    Ok(containers)
}

fn normalize_volume(volume: VolumeConfig, defaults: &ManifestDefaults) -> std::result::Result<VolumeEntry, String> {
    match volume {
        VolumeConfig::Legacy { kind, name, path } => {
            check_volume_name(&name)?;
            let kind = VolumeKind::parse(&kind).map_err(|e| format!("volume {}: {}", name, e))?;
            let source = match kind {
                VolumeKind::Bind => {
                    let path = path
                        .filter(|p| !p.trim().is_empty())
                        .ok_or_else(|| format!("volume {}: bind mount has no path", name))?;
                    Some(PathBuf::from(path.trim()))
                }
                VolumeKind::Named => None,
            };
            Ok(VolumeEntry {
                kind,
                name,
                source,
                destination: defaults.destination.clone(),
                secure_channel: defaults.remote,
                worker: WorkerKind::Container,
            })
        }
        VolumeConfig::Explicit {
            name,
            backup_source,
            backup_destination,
            remote_destination,
        } => {
            check_volume_name(&name)?;
            if backup_source.trim().is_empty() {
                return Err(format!("volume {}: backup_source is empty", name));
            }
            if backup_destination.trim().is_empty() {
                return Err(format!("volume {}: backup_destination is empty", name));
            }
            Ok(VolumeEntry {
                kind: VolumeKind::Bind,
                name,
                source: Some(PathBuf::from(backup_source.trim())),
                destination: backup_destination.trim().to_string(),
                secure_channel: remote_destination.map(|v| v.as_flag()).unwrap_or(false),
                worker: WorkerKind::Direct,
            })
        }
    }
}

fn check_volume_name(name: &str) -> std::result::Result<(), String> {
    if !is_safe_name(name) {
        return Err(format!(
            "volume {} name must use only letters, digits, '.', '-', '_'",
            name
        ));
    }
    Ok(())
}
