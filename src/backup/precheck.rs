use std::fs;

use tracing::{info, warn};

use crate::backup::resolve::ResolvedVolume;
use crate::error::PreconditionError;
use crate::types::{Mode, RunMode};

/// Validate the host paths a transfer is about to touch.
///
/// A missing local destination root skips the volume. A missing bind source
/// skips the volume on backup and is created (with parents) on restore.
/// Remote destinations are left to rsync and ssh.
pub fn check_paths(
    resolved: &ResolvedVolume,
    mode: Mode,
    run_mode: RunMode,
) -> Result<(), PreconditionError> {
    if let Some(root) = &resolved.local_destination_root {
        if !root.is_dir() {
            return Err(PreconditionError::DestinationMissing(
                root.display().to_string(),
            ));
        }
    }

    let Some(source) = &resolved.host_source else {
        return Ok(());
    };
    if source.is_dir() {
        return Ok(());
    }
    if !mode.is_restore() {
        return Err(PreconditionError::SourceMissing(source.display().to_string()));
    }

    warn!(volume = %resolved.name, path = %source.display(), "folder does not exist");
    if run_mode.dry_run {
        println!("dry-run: mkdir -p {}", source.display());
        return Ok(());
    }
    fs::create_dir_all(source).map_err(|e| PreconditionError::CreateFailed {
        path: source.display().to_string(),
        reason: e.to_string(),
    })?;
    info!(volume = %resolved.name, path = %source.display(), "created folder");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::types::WorkerKind;

    fn resolved(source: Option<PathBuf>, root: Option<PathBuf>) -> ResolvedVolume {
        ResolvedVolume {
            name: "data".to_string(),
            worker: WorkerKind::Container,
            mounts: Vec::new(),
            source: "/volumes/data/".to_string(),
            destination: "/destination/data/data/".to_string(),
            secure_channel: root.is_none(),
            host_source: source,
            local_destination_root: root,
        }
    }

    #[test]
    fn missing_destination_root_skips_volume() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let vol = resolved(None, Some(tmp.path().join("backups")));
        let err = check_paths(&vol, Mode::Backup, RunMode::default()).expect_err("skip");
        assert!(matches!(err, PreconditionError::DestinationMissing(_)));
        assert!(err.to_string().contains("backups"));
    }

    #[test]
    fn missing_source_on_backup_skips_volume() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let source = tmp.path().join("srv").join("data");
        let vol = resolved(Some(source.clone()), Some(tmp.path().to_path_buf()));
        let err = check_paths(&vol, Mode::Backup, RunMode::default()).expect_err("skip");
        assert!(matches!(err, PreconditionError::SourceMissing(_)));
        assert!(!source.exists());
    }

    #[test]
    fn missing_source_on_restore_is_created_with_parents() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let source = tmp.path().join("srv").join("data");
        let vol = resolved(Some(source.clone()), Some(tmp.path().to_path_buf()));
        check_paths(&vol, Mode::Restore, RunMode::default()).expect("created");
        assert!(source.is_dir());
        check_paths(&vol, Mode::Restore, RunMode::default()).expect("idempotent");
    }

    #[test]
    fn restore_creation_failure_is_reported() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let blocker = tmp.path().join("file");
        fs::write(&blocker, b"x").expect("write");
        let vol = resolved(Some(blocker.join("data")), None);
        let err = check_paths(&vol, Mode::Restore, RunMode::default()).expect_err("fail");
        assert!(matches!(err, PreconditionError::CreateFailed { .. }));
    }

    #[test]
    fn dry_run_restore_does_not_create() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let source = tmp.path().join("data");
        let vol = resolved(Some(source.clone()), None);
        let run_mode = RunMode { dry_run: true, verbose: false };
        check_paths(&vol, Mode::Restore, run_mode).expect("ok");
        assert!(!source.exists());
    }

    #[test]
    fn remote_destination_is_not_checked() {
        let vol = resolved(None, None);
        check_paths(&vol, Mode::Backup, RunMode::default()).expect("ok");
    }
}
