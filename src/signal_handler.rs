use std::path::PathBuf;
use std::thread;

use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use tracing::{error, warn};

use crate::backup::lifecycle::{lock_tracker, resume_all, PauseTracker};
use crate::runtime::ContainerRuntime;
use crate::util::lock::release_lock;

/// On SIGINT/SIGTERM, resume every container the running cycle paused,
/// release the process lock, then exit. Destructors do not run on this path.
pub fn signal_handler<R>(paused: &PauseTracker, runtime: R, lock_file: Option<PathBuf>)
where
    R: ContainerRuntime + Send + 'static,
{
    let paused = paused.clone();
    thread::spawn(move || {
        let mut signals = match Signals::new([SIGINT, SIGTERM]) {
            Ok(signals) => signals,
            Err(err) => {
                error!(error = %err, "signal handler setup failed");
                return;
            }
        };
        if let Some(signal) = signals.forever().next() {
            // held until exit so the cycle cannot pause anything else
            let mut set = lock_tracker(&paused);
            warn!(signal, paused = set.len(), "interrupted, resuming paused containers");
            resume_all(&mut set, &runtime);
            if let Some(path) = &lock_file {
                release_lock(path);
            }
            std::process::exit(1);
        }
    });
}
