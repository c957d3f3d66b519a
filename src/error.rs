use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolvaultError {
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Config(ConfigError),
    #[error("{0}")]
    Precondition(PreconditionError),
    #[error("{0}")]
    Lifecycle(LifecycleError),
    #[error("transfer {0}")]
    Transfer(String),
    #[error("runtime {0}")]
    Runtime(String),
    #[error("{0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse config: {0}")]
    Parse(String),
    #[error("parse manifest: {0}")]
    Manifest(String),
    #[error("{0}")]
    Invalid(String),
}

/// A path check that makes a single volume unusable for this cycle.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("backup folder {0} does not exist")]
    DestinationMissing(String),
    #[error("source folder {0} does not exist")]
    SourceMissing(String),
    #[error("could not create folder {path}: {reason}")]
    CreateFailed { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("pause {0}")]
    Pause(String),
    #[error("unpause {0}")]
    Unpause(String),
}

pub type Result<T> = std::result::Result<T, VolvaultError>;

impl VolvaultError {
    pub fn message(msg: impl Into<String>) -> Self {
        VolvaultError::Message(msg.into())
    }
}

impl From<ConfigError> for VolvaultError {
    fn from(err: ConfigError) -> Self {
        VolvaultError::Config(err)
    }
}

impl From<PreconditionError> for VolvaultError {
    fn from(err: PreconditionError) -> Self {
        VolvaultError::Precondition(err)
    }
}

impl From<LifecycleError> for VolvaultError {
    fn from(err: LifecycleError) -> Self {
        VolvaultError::Lifecycle(err)
    }
}
