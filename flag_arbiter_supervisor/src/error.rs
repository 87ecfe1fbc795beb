use std::path::PathBuf;

use flag_arbiter_core::GraphError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("no flag document path configured")]
    NoDocumentPath,
}

impl SupervisorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SupervisorError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = SupervisorError> = std::result::Result<T, E>;
