use std::thread;
use std::time::Duration;

use chrono::{Local, NaiveTime};
use tracing::info;

use crate::types::TriggerTime;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub trait Clock {
    fn now(&self) -> NaiveTime;
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveTime {
        Local::now().time()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// `Armed` waits for the trigger minute; `Fired` has already run a cycle for
/// the current matching minute and re-arms once the clock leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Armed,
    Fired,
}

pub struct Scheduler<C: Clock> {
    trigger: TriggerTime,
    state: TriggerState,
    clock: C,
    poll_interval: Duration,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(trigger: TriggerTime, clock: C) -> Self {
        Self {
            trigger,
            state: TriggerState::Armed,
            clock,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Feed one clock reading; returns true when a cycle must start now.
    pub fn observe(&mut self, time: NaiveTime) -> bool {
        let matching = self.trigger.matches(time);
        match (self.state, matching) {
            (TriggerState::Armed, true) => {
                self.state = TriggerState::Fired;
                true
            }
            (TriggerState::Fired, false) => {
                self.state = TriggerState::Armed;
                false
            }
            _ => false,
        }
    }

    /// Poll until `stop` returns true, running `cycle` synchronously on each
    /// trigger. Nothing else happens while a cycle runs.
    pub fn run_until<F, S>(&mut self, mut cycle: F, mut stop: S)
    where
        F: FnMut(),
        S: FnMut() -> bool,
    {
        info!(time_to_run = %self.trigger, "waiting for scheduled time");
        while !stop() {
            if self.observe(self.clock.now()) {
                info!(time_to_run = %self.trigger, "scheduled time reached");
                cycle();
            }
            self.clock.sleep(self.poll_interval);
        }
    }

    pub fn run_forever<F: FnMut()>(&mut self, cycle: F) {
        self.run_until(cycle, || false);
    }
}
