use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Source path {path} is invalid: {reason}")]
    SourceInvalid { path: String, reason: String },

    #[error("Import job {job_id} is already running")]
    AlreadyRunning { job_id: String },

    #[error("No import job is running")]
    NoActiveJob,

    #[error("Import cancelled")]
    Cancelled,

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Invalid job ID: {0}")]
    InvalidJobId(String),

    #[error("Invalid import phase: {0}")]
    InvalidPhase(String),

    #[error("An upload batch is already in progress")]
    UploadBusy,

    #[error("A download is already in progress")]
    DownloadBusy,

    #[error("Upload service '{0}' is not registered")]
    ServiceNotRegistered(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Pipeline runner has stopped")]
    RunnerStopped,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, ImportError>;
