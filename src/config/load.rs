use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::model::{Scalar, Settings, SettingsFile};
use crate::error::{ConfigError, Result, VolvaultError};
use crate::types::{Mode, TriggerTime};

const DEFAULT_IMAGE_NAME: &str = "volvault-rsync";
const DEFAULT_CERTS_FOLDER: &str = "/root/.ssh";
const DEFAULT_RUNTIME: &str = "podman";
const DEFAULT_LOCK_FILE: &str = "/var/run/volvault.pid";

pub fn load_settings(path: &Path) -> Result<Settings> {
    let mut contents = String::new();
    File::open(path)
        .map_err(|e| VolvaultError::message(format!("open config {}: {}", path.display(), e)))?
        .read_to_string(&mut contents)
        .map_err(VolvaultError::Io)?;
    let mut file: SettingsFile =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
    apply_env_overrides(&mut file, |key| std::env::var(key).ok());
    parse_runtime(file)
}

/// Overlay `<SECTION>_<KEY>` environment variables (e.g. `BACKUP_TIME_TO_RUN`)
/// on top of the values read from the file.
pub fn apply_env_overrides<F>(file: &mut SettingsFile, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let text = |key: &str, slot: &mut Option<String>| {
        if let Some(value) = lookup(key) {
            *slot = Some(value);
        }
    };
    text("BACKUP_CONFIG_FILE_PATH", &mut file.backup.config_file_path);
    text("BACKUP_IMAGE_NAME", &mut file.backup.image_name);
    text("BACKUP_IMAGE_BUILD_SOURCE", &mut file.backup.image_build_source);
    text("BACKUP_DESTINATION", &mut file.backup.destination);
    text("BACKUP_TIME_TO_RUN", &mut file.backup.time_to_run);
    text("BACKUP_LOCK_FILE", &mut file.backup.lock_file);
    text("SSH_CERTS_FOLDER", &mut file.ssh.certs_folder);
    text("SOCKET_PATH", &mut file.socket.path);
    text("SOCKET_RUNTIME", &mut file.socket.runtime);

    let scalar = |key: &str, slot: &mut Option<Scalar>| {
        if let Some(value) = lookup(key) {
            *slot = Some(Scalar::Text(value));
        }
    };
    scalar("BACKUP_RESTORE", &mut file.backup.restore);
    scalar("BACKUP_DESTINATION_REMOTE", &mut file.backup.destination_remote);
    scalar("BACKUP_TRANSFER_TIMEOUT", &mut file.backup.transfer_timeout);
}

pub fn parse_runtime(file: SettingsFile) -> Result<Settings> {
    let backup = file.backup;
    let required = |value: Option<String>, key: &str| -> Result<String> {
        match value {
            Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
            _ => Err(ConfigError::Invalid(format!("backup.{} is required", key)).into()),
        }
    };

    let manifest_path = PathBuf::from(required(backup.config_file_path, "config_file_path")?);
    let destination = required(backup.destination, "destination")?;
    let time_to_run = required(backup.time_to_run, "time_to_run")?
        .parse::<TriggerTime>()
        .map_err(|e| ConfigError::Invalid(format!("backup.time_to_run: {}", e)))?;

    let transfer_timeout = match backup.transfer_timeout {
        Some(value) => {
            let secs = value
                .as_seconds()
                .map_err(|e| ConfigError::Invalid(format!("backup.transfer_timeout: {}", e)))?;
            if secs == 0 {
                None
            } else {
                Some(Duration::from_secs(secs))
            }
        }
        None => None,
    };

    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    Ok(Settings {
        mode: Mode::from_restore_flag(backup.restore.map(|v| v.as_flag()).unwrap_or(false)),
        manifest_path,
        image_name: non_empty(backup.image_name).unwrap_or_else(|| DEFAULT_IMAGE_NAME.to_string()),
        image_build_source: non_empty(backup.image_build_source).map(PathBuf::from),
        destination,
        destination_remote: backup
            .destination_remote
            .map(|v| v.as_flag())
            .unwrap_or(false),
        ssh_certs_folder: PathBuf::from(
            non_empty(file.ssh.certs_folder).unwrap_or_else(|| DEFAULT_CERTS_FOLDER.to_string()),
        ),
        socket_path: non_empty(file.socket.path).map(PathBuf::from),
        runtime_binary: non_empty(file.socket.runtime).unwrap_or_else(|| DEFAULT_RUNTIME.to_string()),
        time_to_run,
        transfer_timeout,
        lock_file: PathBuf::from(
            non_empty(backup.lock_file).unwrap_or_else(|| DEFAULT_LOCK_FILE.to_string()),
        ),
    })
}
