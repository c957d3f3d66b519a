//! Process-wide pid lock: one volvault instance drives cycles on a host at a
//! time. The lock lives for the whole process, not for a single cycle, and is
//! released either by [`LockGuard`] on a normal return or by the signal
//! handler through [`release_lock`].

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use tracing::{debug, warn};

use crate::error::{Result, VolvaultError};

const ATTEMPTS: usize = 3;

#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        release_lock(&self.path);
    }
}

/// Who the pid file currently names.
#[derive(Debug, PartialEq, Eq)]
enum Holder {
    /// File vanished between our create attempt and the read.
    Gone,
    Live(u32),
    /// Dead pid, or contents that are not a pid at all.
    Stale(Option<u32>),
}

pub fn acquire_process_lock(path: &Path) -> Result<LockGuard> {
    let pid = process::id();
    let failed = |e: io::Error| VolvaultError::message(format!("failed to lock {}: {}", path.display(), e));
    for _ in 0..ATTEMPTS {
        match create_pid_file(path, pid) {
            Ok(()) => {
                debug!(lock = %path.display(), pid, "process lock taken");
                return Ok(LockGuard {
                    path: path.to_path_buf(),
                });
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(failed(err)),
        }
        match holder(path).map_err(failed)? {
            Holder::Gone => continue,
            Holder::Live(other) => {
                return Err(VolvaultError::message(format!(
                    "another volvault (pid {}) is already running (lock {})",
                    other,
                    path.display()
                )))
            }
            Holder::Stale(other) => {
                warn!(lock = %path.display(), stale_pid = ?other, "taking over stale process lock");
                match fs::remove_file(path) {
                    Ok(()) => {}
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => return Err(failed(err)),
                }
            }
        }
    }
    Err(VolvaultError::message(format!(
        "could not take lock {} after {} attempts",
        path.display(),
        ATTEMPTS
    )))
}

/// Remove the pid file if it names this process. Never fails; a lock that
/// cannot be removed is only logged.
pub fn release_lock(path: &Path) {
    match fs::read_to_string(path) {
        Ok(text) if text.trim() == process::id().to_string() => {
            if let Err(err) = fs::remove_file(path) {
                warn!(lock = %path.display(), error = %err, "could not release process lock");
            }
        }
        _ => {}
    }
}

fn create_pid_file(path: &Path, pid: u32) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    writeln!(file, "{}", pid)
}

fn holder(path: &Path) -> io::Result<Holder> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Holder::Gone),
        Err(err) => return Err(err),
    };
    Ok(match text.trim().parse::<u32>() {
        Ok(pid) if is_running(pid) => Holder::Live(pid),
        Ok(pid) => Holder::Stale(Some(pid)),
        Err(_) => Holder::Stale(None),
    })
}

fn is_running(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}
