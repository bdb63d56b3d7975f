//! Error taxonomy for the document service.
//!
//! Library components return [`DocentError`] at their boundaries so callers
//! can tell a dead model service from a broken vector index or an unreadable
//! file. The CLI and server glue wrap these in `anyhow` as usual.

use std::path::PathBuf;

/// Errors surfaced by the core components.
#[derive(Debug, thiserror::Error)]
pub enum DocentError {
    /// The model service never reported the required model.
    #[error("model service unavailable: {model} not ready after {attempts} attempts")]
    ServiceUnavailable { model: String, attempts: u32 },

    /// The vector index could not be reached or rejected the operation.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    /// No loader exists for the file's extension.
    #[error("unsupported file format: {extension:?} ({path})")]
    UnsupportedFormat { extension: String, path: PathBuf },

    /// A loader failed to read or decode a supported file.
    #[error("failed to extract {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// The reasoning engine produced text that is neither an action nor a final answer.
    #[error("could not parse reasoning output: {0}")]
    Parsing(String),

    /// A call to the embedding or reasoning model failed.
    #[error("model call failed: {0}")]
    Model(String),

    /// Query work was requested before the readiness flag was set.
    #[error("agent is not ready yet")]
    AgentNotReady,
}

impl DocentError {
    pub(crate) fn extraction(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        DocentError::Extraction {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<sqlx::Error> for DocentError {
    fn from(err: sqlx::Error) -> Self {
        DocentError::StoreUnavailable(err.to_string())
    }
}

pub type Result<T, E = DocentError> = std::result::Result<T, E>;
