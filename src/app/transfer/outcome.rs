//! Transfer result record
//!
//! Every terminal state (installed, skipped, failed) produces the same shape,
//! so callers inspect a value rather than handle errors.

use std::path::PathBuf;

use serde::Serialize;

use crate::app::models::ProgressState;
use crate::errors::AppError;

/// Terminal record of one transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    /// Whether the artifact is in place
    pub success: bool,
    /// Installed file or extracted directory, `None` on failure
    pub path: Option<PathBuf>,
    /// Human-readable summary
    pub message: String,
    /// True when nothing had to be downloaded
    pub skipped: bool,
    /// Final progress snapshot
    pub progress: ProgressState,
    /// Error category for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl TransferOutcome {
    pub fn completed(path: PathBuf, message: impl Into<String>, progress: ProgressState) -> Self {
        Self {
            success: true,
            path: Some(path),
            message: message.into(),
            skipped: false,
            progress,
            error_kind: None,
        }
    }

    pub fn skipped(path: PathBuf, message: impl Into<String>, progress: ProgressState) -> Self {
        Self {
            success: true,
            path: Some(path),
            message: message.into(),
            skipped: true,
            progress,
            error_kind: None,
        }
    }

    pub fn failed(error: &AppError, progress: ProgressState) -> Self {
        Self {
            success: false,
            path: None,
            message: error.to_string(),
            skipped: false,
            progress,
            error_kind: Some(error.category().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PreflightError;

    #[test]
    fn test_failed_outcome_carries_category() {
        let error = AppError::from(PreflightError::InsufficientSpace {
            required: 11,
            available: 3,
        });
        let outcome = TransferOutcome::failed(&error, ProgressState::new("f", "/d/f"));

        assert!(!outcome.success);
        assert!(outcome.path.is_none());
        assert_eq!(outcome.error_kind.as_deref(), Some("preflight"));
        assert!(outcome.message.contains("Insufficient disk space"));
    }

    #[test]
    fn test_outcome_serializes() {
        let outcome = TransferOutcome::skipped(
            PathBuf::from("/d/f"),
            "File already exists",
            ProgressState::new("f", "/d/f"),
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["skipped"], true);
        assert_eq!(json["progress"]["status"], "pending");
        assert!(json.get("error_kind").is_none());
    }
}
