//! Error types for the governance pipeline.

use ccgov_state::{ApprovalStatus, RequestId, StateError, SuiteId, SuiteStatus};
use thiserror::Error;

use crate::admin::AdminError;

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors surfaced by every pipeline component.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Duplicate version, pending request, vote, or tag.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Operation blocked until the named approval request reaches quorum.
    #[error("approval request {request_id} is not approved (status: {status})")]
    ApprovalRequired {
        request_id: RequestId,
        status: ApprovalStatus,
    },

    /// Commit blocked by the test gate. `suite_id` is `None` when the gate is
    /// mandatory and no suite has been run yet.
    #[error("{}", tests_not_passed(.suite_id, .failed_cases, .status))]
    TestsNotPassed {
        suite_id: Option<SuiteId>,
        failed_cases: u32,
        status: Option<SuiteStatus>,
    },

    #[error("rollback unsafe: {0}")]
    RollbackUnsafe(String),

    #[error("external operation failed: {0}")]
    ExternalOperationFailed(#[from] AdminError),

    #[error(transparent)]
    State(#[from] StateError),
}

fn tests_not_passed(
    suite_id: &Option<SuiteId>,
    failed_cases: &u32,
    status: &Option<SuiteStatus>,
) -> String {
    match (suite_id, status) {
        (Some(id), Some(status)) => format!(
            "tests not passed: test suite {id} is {status}, failed tests: {failed_cases}"
        ),
        (Some(id), None) => format!("tests not passed: test suite {id}, failed tests: {failed_cases}"),
        (None, _) => "tests not passed: no test suite has been run".to_string(),
    }
}

impl PipelineError {
    /// Stable snake_case label for logs and exit reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Conflict(_) => "conflict",
            PipelineError::NotFound(_) => "not_found",
            PipelineError::Validation(_) => "validation",
            PipelineError::ApprovalRequired { .. } => "approval_required",
            PipelineError::TestsNotPassed { .. } => "tests_not_passed",
            PipelineError::RollbackUnsafe(_) => "rollback_unsafe",
            PipelineError::ExternalOperationFailed(_) => "external_operation_failed",
            PipelineError::State(_) => "state",
        }
    }

    pub(crate) fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        PipelineError::NotFound(format!("{what} {id}"))
    }
}

/// Fail with `Validation` when a required text field is blank.
pub(crate) fn require_non_empty(field: &str, value: &str) -> PipelineResult<()> {
    if value.trim().is_empty() {
        return Err(PipelineError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn blocked_commit_messages_name_the_artifact() {
        let request_id = Uuid::new_v4();
        let err = PipelineError::ApprovalRequired {
            request_id,
            status: ApprovalStatus::Pending,
        };
        assert!(err.to_string().contains(&request_id.to_string()));
        assert!(err.to_string().contains("pending"));

        let suite_id = Uuid::new_v4();
        let err = PipelineError::TestsNotPassed {
            suite_id: Some(suite_id),
            failed_cases: 3,
            status: Some(SuiteStatus::Failed),
        };
        let msg = err.to_string();
        assert!(msg.contains(&suite_id.to_string()));
        assert!(msg.contains("failed tests: 3"));
        assert_eq!(err.kind(), "tests_not_passed");
    }

    #[test]
    fn admin_errors_are_wrapped_verbatim() {
        let err: PipelineError = AdminError::Timeout("peer0 did not answer".into()).into();
        assert_eq!(err.kind(), "external_operation_failed");
        assert!(err.to_string().ends_with("timeout: peer0 did not answer"));
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(require_non_empty("name", "  ").is_err());
        assert!(require_non_empty("name", "teatrace").is_ok());
    }
}
