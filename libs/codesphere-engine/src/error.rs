use codesphere_common::types::UnsupportedLanguage;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the judging harness itself.
///
/// A misbehaving submission is never an `EngineError`: crashes, timeouts and
/// OOM kills are ordinary `Outcome`s. These variants cover bad caller input
/// and infrastructure faults only.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    UnsupportedLanguage(#[from] UnsupportedLanguage),

    #[error("{what} exceeds maximum size of {limit} bytes")]
    InputTooLarge { what: &'static str, limit: usize },

    #[error("workspace I/O failed at {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("sandbox unavailable: {0}")]
    SandboxUnavailable(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub(crate) fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Workspace {
            path: path.into(),
            source,
        }
    }

    /// True when the caller sent something we refuse to run.
    ///
    /// Everything else is a harness fault and must not leak details to the caller.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::UnsupportedLanguage(_) | EngineError::InputTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
