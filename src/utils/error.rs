use std::fmt;
use thiserror::Error;

/// How a remote (or local) command invocation went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// The transport program could not be started at all.
    Spawn,
    /// The command exited with a non-zero status (`None` when killed by a signal).
    NonZeroExit(Option<u32>),
    /// The command exited cleanly but wrote to its diagnostic stream.
    Diagnostics,
    /// The remote script finished without saying which branch it took.
    NoReport,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::Spawn => write!(f, "could not start"),
            TransportFailure::NonZeroExit(Some(code)) => write!(f, "exit status {}", code),
            TransportFailure::NonZeroExit(None) => write!(f, "terminated abnormally"),
            TransportFailure::Diagnostics => write!(f, "diagnostic output"),
            TransportFailure::NoReport => write!(f, "no report"),
        }
    }
}

#[derive(Error, Debug)]
pub enum RiptError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },
    #[error("[{host}] {kind}: {detail}")]
    Transport {
        host: String,
        kind: TransportFailure,
        detail: String,
    },
    #[error("invalid input: {0}")]
    Input(String),
    #[error("record store error: {0}")]
    Store(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logger setup failed: {0}")]
    Logger(#[from] log::SetLoggerError),
}

impl RiptError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        RiptError::Validation {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }

    pub fn transport(host: &str, kind: TransportFailure, detail: impl Into<String>) -> Self {
        RiptError::Transport {
            host: host.to_owned(),
            kind,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RiptError>;
