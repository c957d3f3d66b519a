use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{error, info, warn};

use crate::config::model::ContainerEntry;
use crate::error::LifecycleError;
use crate::runtime::ContainerRuntime;
use crate::types::RunMode;

/// Names of containers currently paused by this process. Shared with the
/// signal handler so an interrupted cycle can still resume them.
///
/// The lock is held across every pause and unpause call, so the signal
/// handler never observes a container mid-transition.
pub type PauseTracker = Arc<Mutex<HashSet<String>>>;

pub(crate) fn lock_tracker(tracker: &PauseTracker) -> MutexGuard<'_, HashSet<String>> {
    tracker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Unpauses its container when dropped.
pub struct PauseGuard<'a> {
    runtime: &'a dyn ContainerRuntime,
    tracker: PauseTracker,
    name: String,
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        let mut paused = lock_tracker(&self.tracker);
        // drained by the signal handler, which resumes it itself
        if !paused.contains(&self.name) {
            return;
        }
        match self.runtime.container_unpause(&self.name) {
            Ok(()) => {
                info!(container = %self.name, "container resumed");
                paused.remove(&self.name);
            }
            Err(err) => {
                let err = LifecycleError::Unpause(format!("{}: {}", self.name, err));
                error!(container = %self.name, error = %err, "container left paused");
            }
        }
    }
}

/// Resume and forget every tracked container, in name order. Returns how many
/// were resumed. Exit paths keep `paused` locked afterwards so no new pause
/// can start behind them.
pub(crate) fn resume_all(paused: &mut HashSet<String>, runtime: &dyn ContainerRuntime) -> usize {
    let mut names: Vec<String> = paused.drain().collect();
    names.sort();
    let mut resumed = 0;
    for name in names {
        match runtime.container_unpause(&name) {
            Ok(()) => resumed += 1,
            Err(err) => {
                let err = LifecycleError::Unpause(format!("{}: {}", name, err));
                error!(container = %name, error = %err, "could not resume container");
            }
        }
    }
    resumed
}

pub struct Lifecycle<'a> {
    runtime: &'a dyn ContainerRuntime,
    tracker: PauseTracker,
    run_mode: RunMode,
}

impl<'a> Lifecycle<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, tracker: PauseTracker, run_mode: RunMode) -> Self {
        Self {
            runtime,
            tracker,
            run_mode,
        }
    }

    /// Run `transfer` with `container` paused if it asks for it. A successful
    /// pause is always paired with an unpause, whatever `transfer` does.
    pub fn bracket<R>(&self, container: &ContainerEntry, transfer: impl FnOnce() -> R) -> R {
        if !container.need_to_pause {
            return transfer();
        }
        if self.run_mode.dry_run {
            println!("dry-run: pause {}", container.name);
            let result = transfer();
            println!("dry-run: unpause {}", container.name);
            return result;
        }
        let _guard = self.pause(&container.name);
        transfer()
    }

    fn pause(&self, name: &str) -> Option<PauseGuard<'a>> {
        let mut paused = lock_tracker(&self.tracker);
        paused.insert(name.to_string());
        match self.runtime.container_pause(name) {
            Ok(()) => {
                info!(container = %name, "container paused");
                Some(PauseGuard {
                    runtime: self.runtime,
                    tracker: self.tracker.clone(),
                    name: name.to_string(),
                })
            }
            Err(err) => {
                paused.remove(name);
                let err = LifecycleError::Pause(format!("{}: {}", name, err));
                error!(container = %name, error = %err, "could not pause container");
                warn!(container = %name, "transferring without pause");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::RecordingRuntime;

    fn container(need_to_pause: bool) -> ContainerEntry {
        ContainerEntry {
            name: "web".to_string(),
            need_to_pause,
            volumes: Vec::new(),
        }
    }

    #[test]
    fn pause_and_unpause_bracket_the_transfer() {
        let runtime = RecordingRuntime::default();
        let tracker = PauseTracker::default();
        let lifecycle = Lifecycle::new(&runtime, tracker.clone(), RunMode::default());
        let seen = lifecycle.bracket(&container(true), || {
            runtime.calls.borrow_mut().push("transfer".to_string());
            tracker.lock().expect("lock").contains("web")
        });
        assert!(seen, "container tracked while paused");
        assert_eq!(runtime.calls(), vec!["pause web", "transfer", "unpause web"]);
        assert!(tracker.lock().expect("lock").is_empty());
    }

    #[test]
    fn no_pause_requested_runs_live() {
        let runtime = RecordingRuntime::default();
        let lifecycle = Lifecycle::new(&runtime, PauseTracker::default(), RunMode::default());
        let value = lifecycle.bracket(&container(false), || 7);
        assert_eq!(value, 7);
        assert!(runtime.calls().is_empty());
    }

    #[test]
    fn failed_pause_skips_unpause_but_still_transfers() {
        let runtime = RecordingRuntime {
            fail_pause: true,
            ..Default::default()
        };
        let tracker = PauseTracker::default();
        let lifecycle = Lifecycle::new(&runtime, tracker.clone(), RunMode::default());
        let tracked = lifecycle.bracket(&container(true), || tracker.lock().expect("lock").contains("web"));
        assert!(!tracked, "failed pause is not tracked");
        assert_eq!(runtime.calls(), vec!["pause web"]);
    }

    #[test]
    fn container_resumed_by_signal_path_is_not_resumed_twice() {
        let runtime = RecordingRuntime::default();
        let tracker = PauseTracker::default();
        let lifecycle = Lifecycle::new(&runtime, tracker.clone(), RunMode::default());
        lifecycle.bracket(&container(true), || {
            tracker.lock().expect("lock").clear();
        });
        assert_eq!(runtime.calls(), vec!["pause web"]);
    }

    #[test]
    fn resume_all_drains_the_tracker_in_order() {
        let runtime = RecordingRuntime::default();
        let mut paused: HashSet<String> = ["web", "db"].iter().map(|s| s.to_string()).collect();
        assert_eq!(resume_all(&mut paused, &runtime), 2);
        assert!(paused.is_empty());
        assert_eq!(runtime.calls(), vec!["unpause db", "unpause web"]);
    }

    #[test]
    fn failed_unpause_keeps_container_tracked() {
        let runtime = RecordingRuntime {
            fail_unpause: true,
            ..Default::default()
        };
        let tracker = PauseTracker::default();
        let lifecycle = Lifecycle::new(&runtime, tracker.clone(), RunMode::default());
        lifecycle.bracket(&container(true), || ());
        assert_eq!(runtime.calls(), vec!["pause web", "unpause web"]);
        assert!(tracker.lock().expect("lock").contains("web"));
    }

    #[test]
    fn dry_run_never_touches_the_runtime() {
        let runtime = RecordingRuntime::default();
        let run_mode = RunMode { dry_run: true, verbose: false };
        let lifecycle = Lifecycle::new(&runtime, PauseTracker::default(), run_mode);
        lifecycle.bracket(&container(true), || ());
        assert!(runtime.calls().is_empty());
    }
}
