use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{parse_bool_str, Mode, TriggerTime, VolumeKind, WorkerKind};

/// Settings values may be written as YAML scalars of any type (`restore: "false"`,
/// `restore: false`, `transfer_timeout: 600`).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(u64),
    Text(String),
}

impl Scalar {
    pub fn as_flag(&self) -> bool {
        match self {
            Scalar::Bool(value) => *value,
            Scalar::Number(value) => *value == 1,
            Scalar::Text(value) => parse_bool_str(value),
        }
    }

    pub fn as_seconds(&self) -> Result<u64, String> {
        match self {
            Scalar::Number(value) => Ok(*value),
            Scalar::Text(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("invalid number of seconds {}", value)),
            Scalar::Bool(value) => Err(format!("invalid number of seconds {}", value)),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SettingsFile {
    #[serde(default)]
    pub backup: BackupSection,
    #[serde(default)]
    pub ssh: SshSection,
    #[serde(default)]
    pub socket: SocketSection,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct BackupSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_build_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_remote: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_run: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_timeout: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_file: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SshSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certs_folder: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SocketSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
}

/// Immutable process-wide settings, built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: Mode,
    pub manifest_path: PathBuf,
    pub image_name: String,
    pub image_build_source: Option<PathBuf>,
    pub destination: String,
    pub destination_remote: bool,
    pub ssh_certs_folder: PathBuf,
    pub socket_path: Option<PathBuf>,
    pub runtime_binary: String,
    pub time_to_run: TriggerTime,
    pub transfer_timeout: Option<Duration>,
    pub lock_file: PathBuf,
}

impl Settings {
    /// Restore and `now` both mean a single cycle followed by exit.
    pub fn runs_once(&self) -> bool {
        self.mode.is_restore() || self.time_to_run == TriggerTime::Now
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContainerConfig {
    pub container_name: String,
    #[serde(default)]
    pub need_to_pause: bool,
    #[serde(default)]
    pub volumes: Vec<VolumeConfig>,
}

/// The two manifest volume shapes. An entry carrying `backup_source` or
/// `backup_destination` is `Explicit`; anything else must be `Legacy`.
#[derive(Debug, Deserialize, Clone)]
#[serde(try_from = "RawVolume")]
pub enum VolumeConfig {
    Explicit {
        name: String,
        backup_source: String,
        backup_destination: String,
        remote_destination: Option<Scalar>,
    },
    Legacy {
        kind: String,
        name: String,
        path: Option<String>,
    },
}

/// Union of both shapes' keys, so a malformed entry can be reported by the
/// key it lacks.
#[derive(Debug, Deserialize)]
struct RawVolume {
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    path: Option<String>,
    backup_source: Option<String>,
    backup_destination: Option<String>,
    remote_destination: Option<Scalar>,
}

impl TryFrom<RawVolume> for VolumeConfig {
    type Error = String;

    fn try_from(raw: RawVolume) -> Result<Self, Self::Error> {
        let label = raw.name.clone().unwrap_or_else(|| "<unnamed>".to_string());
        let missing = |key: &str| format!("volume {}: missing {}", label, key);
        let name = raw.name.clone().ok_or_else(|| "volume entry: missing name".to_string())?;
        if raw.backup_source.is_some() || raw.backup_destination.is_some() {
            return Ok(VolumeConfig::Explicit {
                name,
                backup_source: raw.backup_source.ok_or_else(|| missing("backup_source"))?,
                backup_destination: raw
                    .backup_destination
                    .ok_or_else(|| missing("backup_destination"))?,
                remote_destination: raw.remote_destination,
            });
        }
        Ok(VolumeConfig::Legacy {
            kind: raw.kind.ok_or_else(|| missing("type"))?,
            name,
            path: raw.path,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerEntry {
    pub name: String,
    pub need_to_pause: bool,
    pub volumes: Vec<VolumeEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeEntry {
    pub kind: VolumeKind,
    pub name: String,
    /// Host path of a bind mount. Always `None` for named volumes.
    pub source: Option<PathBuf>,
    pub destination: String,
    pub secure_channel: bool,
    pub worker: WorkerKind,
}
