//! Error types and exit codes for shannon-insight

use std::process::ExitCode;
use thiserror::Error;

/// Main error type for shannon-insight operations
#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Analysis root not found: {path}")]
    RootNotFound { path: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Scan produced no analyzable files under {path}")]
    EmptyScan { path: String },

    #[error("Git error: {message}")]
    Git { message: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Snapshot serialization failed: {message}")]
    Snapshot { message: String },

    #[error("Quality gate failed: {reason}")]
    GateFailed { reason: String },

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InsightError {
    /// Convert error to the process exit code contract:
    /// - 0: success
    /// - 2: analysis error
    /// - 3: quality-gate failure
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::GateFailed { .. } => ExitCode::from(3),
            _ => ExitCode::from(2),
        }
    }
}

impl From<rusqlite::Error> for InsightError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Persistence { message: e.to_string() }
    }
}

/// Result type alias for shannon-insight operations
pub type Result<T> = std::result::Result<T, InsightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_failure_maps_to_exit_3() {
        let err = InsightError::GateFailed { reason: "health 0.4 < 0.6".to_string() };
        assert_eq!(err.exit_code(), ExitCode::from(3));
    }

    #[test]
    fn analysis_errors_map_to_exit_2() {
        let err = InsightError::EmptyScan { path: "/tmp/none".to_string() };
        assert_eq!(err.exit_code(), ExitCode::from(2));
    }
}
