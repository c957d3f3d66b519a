pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod runtime;
pub mod schedule;
pub mod signal_handler;
pub mod types;
pub mod util;

pub use backup::{CycleReport, CycleRunner, Tally, VolumeOutcome};
pub use config::model::{ContainerEntry, Settings, VolumeEntry};
pub use error::{Result, VolvaultError};
