//! Boundary error kinds surfaced by the import workflow.
//!
//! Command handlers work in `anyhow::Result` and attach context; the variants here
//! exist so callers (the sample server in particular) can tell a validation problem
//! from a backend failure without string matching.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    /// Rejected locally before any request was made.
    #[error("{0}")]
    Validation(String),
    #[error("request to import backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("import backend returned {status}: {body}")]
    Backend { status: u16, body: String },
    #[error("unexpected response from import backend: {0}")]
    MalformedResponse(String),
    #[error("sample path '{0}' resolves outside the sample directory")]
    InvalidSamplePath(String),
    #[error("sample file '{0}' not found")]
    SampleNotFound(String),
}

impl ImportError {
    pub fn validation(message: impl Into<String>) -> Self {
        ImportError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ImportError::Validation(_))
    }
}
