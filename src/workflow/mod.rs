//! Approval workflow rules for DTR entries.
//!
//! The state machine is small and strict: an entry starts Pending and a
//! reviewer moves it exactly once to Approved or Rejected. Both end states
//! are terminal; the status-guarded update in the repository enforces that
//! under concurrent reviewers. The rules here are pure so they can be tested
//! without a database.

use thiserror::Error;

use crate::db::{LogStatus, Role};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Only heads and admins may review DTR entries")]
    NotAReviewer,
    #[error("A log cannot be moved to {0}")]
    InvalidTarget(LogStatus),
    #[error("A rejection requires a comment")]
    CommentRequired,
}

/// A validated review decision, ready to be applied with a status-guarded
/// update from [`LogStatus::Pending`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDecision {
    pub new_status: LogStatus,
    pub comment: String,
}

/// Validate a reviewer's decision.
///
/// * Only Head/Admin may review; a teacher may never transition any log,
///   including their own.
/// * The only reachable targets are Approved and Rejected.
/// * Rejection requires a non-blank comment (whitespace is trimmed);
///   approval always stores an empty comment.
pub fn validate_review(
    reviewer: Role,
    target: LogStatus,
    comment: &str,
) -> Result<ReviewDecision, WorkflowError> {
    if !reviewer.is_reviewer() {
        return Err(WorkflowError::NotAReviewer);
    }

    match target {
        LogStatus::Approved => Ok(ReviewDecision {
            new_status: LogStatus::Approved,
            comment: String::new(),
        }),
        LogStatus::Rejected => {
            let trimmed = comment.trim();
            if trimmed.is_empty() {
                return Err(WorkflowError::CommentRequired);
            }
            Ok(ReviewDecision {
                new_status: LogStatus::Rejected,
                comment: trimmed.to_string(),
            })
        }
        LogStatus::Pending => Err(WorkflowError::InvalidTarget(LogStatus::Pending)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teacher_may_not_review() {
        let err = validate_review(Role::Teacher, LogStatus::Approved, "").unwrap_err();
        assert_eq!(err, WorkflowError::NotAReviewer);
    }

    #[test]
    fn test_approve_clears_comment() {
        let decision = validate_review(Role::Head, LogStatus::Approved, "looks good").unwrap();
        assert_eq!(decision.new_status, LogStatus::Approved);
        assert_eq!(decision.comment, "");
    }

    #[test]
    fn test_reject_requires_comment() {
        assert_eq!(
            validate_review(Role::Head, LogStatus::Rejected, "").unwrap_err(),
            WorkflowError::CommentRequired
        );
        assert_eq!(
            validate_review(Role::Admin, LogStatus::Rejected, "   \t").unwrap_err(),
            WorkflowError::CommentRequired
        );
    }

    #[test]
    fn test_reject_trims_comment() {
        let decision =
            validate_review(Role::Admin, LogStatus::Rejected, "  Missing signature  ").unwrap();
        assert_eq!(decision.new_status, LogStatus::Rejected);
        assert_eq!(decision.comment, "Missing signature");
    }

    #[test]
    fn test_pending_is_not_a_target() {
        let err = validate_review(Role::Admin, LogStatus::Pending, "").unwrap_err();
        assert_eq!(err, WorkflowError::InvalidTarget(LogStatus::Pending));
    }
}
