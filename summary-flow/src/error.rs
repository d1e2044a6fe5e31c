use std::path::PathBuf;

use thiserror::Error;

use crate::task::Phase;

/// Failures raised by a generation backend. Every variant means no text exists
/// for the current request, so none of them is ever degraded locally.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("generation backend unavailable: {0}")]
    Unavailable(String),

    #[error("image reference {path} could not be read: {source}")]
    ImageUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("generation backend returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    #[error("no document has been submitted for this session")]
    NoActiveDocument,

    #[error("no task registered for phase {0}")]
    TaskNotFound(Phase),

    #[error("flow exceeded {0} steps without terminating")]
    StepLimitExceeded(usize),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("phase {phase} ran without {missing}")]
    MissingState {
        phase: Phase,
        missing: &'static str,
    },

    #[error("flow ended without producing a reply")]
    NoReply,
}

impl FlowError {
    /// True when the failure came from the generation backend rather than the caller.
    pub fn is_backend(&self) -> bool {
        matches!(self, FlowError::Backend(_))
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
