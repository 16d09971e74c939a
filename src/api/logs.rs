//! DTR log endpoints: listing, submission, review.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::db::{DtrLog, DtrLogWithAuthor, LogStatus, NewDtrLog, TransitionOutcome};
use crate::workflow::{self, WorkflowError};
use crate::AppState;

use super::auth::CurrentUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_date, validate_mode, validate_remarks, validate_time,
};

/// List logs visible to the calling session: teachers see their own entries,
/// reviewers see the whole system. Newest date first.
///
/// GET /api/logs
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<Json<Vec<DtrLogWithAuthor>>, ApiError> {
    let logs = DtrLog::list_for(&state.db, current.role(), &current.user.id).await?;
    Ok(Json(logs))
}

/// Raw submission fields gathered from the multipart form.
#[derive(Debug, Default)]
struct Submission {
    fields: NewDtrLog,
    proof: Option<(String, Vec<u8>)>,
}

fn validate_submission(fields: &NewDtrLog) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_date(&fields.date) {
        errors.add("date", e);
    }
    if let Err(e) = validate_time("Time in", &fields.time_in) {
        errors.add("time_in", e);
    }
    if let Err(e) = validate_time("Time out", &fields.time_out) {
        errors.add("time_out", e);
    }
    if let Err(e) = validate_mode(&fields.mode) {
        errors.add("mode", e);
    }
    if let Err(e) = validate_remarks(&fields.remarks) {
        errors.add("remarks", e);
    }

    errors.finish()
}

async fn read_submission(mut multipart: Multipart) -> Result<Submission, ApiError> {
    let mut submission = Submission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid form data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "proof" => {
                let filename = field.file_name().unwrap_or("proof").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid form data: {}", e)))?;
                if !bytes.is_empty() {
                    submission.proof = Some((filename, bytes.to_vec()));
                }
            }
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid form data: {}", e)))?;
                match name.as_str() {
                    "date" => submission.fields.date = value,
                    "time_in" => submission.fields.time_in = value,
                    "time_out" => submission.fields.time_out = value,
                    "mode" => submission.fields.mode = value,
                    "remarks" => submission.fields.remarks = value,
                    _ => {}
                }
            }
        }
    }

    Ok(submission)
}

/// Submit a new DTR entry (multipart form, optional `proof` file part).
/// The entry always starts Pending; an intended attachment that fails to
/// upload blocks the whole submission so no log-without-proof row appears.
///
/// POST /api/logs
pub async fn create_log(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DtrLog>), ApiError> {
    let mut submission = read_submission(multipart).await?;
    validate_submission(&submission.fields)?;

    // Upload before insert so proof_url is set atomically with creation.
    if let Some((filename, bytes)) = submission.proof.take() {
        let url = state
            .proofs
            .save(&current.user.id, &filename, &bytes)
            .await?;
        submission.fields.proof_url = Some(url);
    }

    let log = DtrLog::create(&state.db, &current.user.id, &submission.fields).await?;

    info!(log_id = %log.id, user_id = %current.user.id, "DTR entry submitted");

    Ok((StatusCode::CREATED, Json(log)))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub status: LogStatus,
    #[serde(default)]
    pub comment: String,
}

/// Approve or reject a pending entry. The transition is guarded on the
/// stored status: a reviewer who lost the race gets a 409 and the stored
/// decision stands.
///
/// POST /api/logs/:id/review
pub async fn review_log(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<DtrLog>, ApiError> {
    let decision = workflow::validate_review(current.role(), request.status, &request.comment)
        .map_err(|e| match e {
            WorkflowError::NotAReviewer => ApiError::forbidden(e.to_string()),
            WorkflowError::CommentRequired => ApiError::validation_field("comment", e.to_string()),
            WorkflowError::InvalidTarget(_) => ApiError::bad_request(e.to_string()),
        })?;

    let outcome = DtrLog::transition(
        &state.db,
        &id,
        LogStatus::Pending,
        decision.new_status,
        &decision.comment,
    )
    .await?;

    match outcome {
        TransitionOutcome::Updated(log) => {
            info!(
                log_id = %id,
                reviewer = %current.user.id,
                status = %decision.new_status,
                "DTR entry reviewed"
            );
            Ok(Json(*log))
        }
        TransitionOutcome::Conflict(current_status) => Err(ApiError::conflict(format!(
            "Log was already reviewed (status: {})",
            current_status
        ))),
        TransitionOutcome::NotFound => Err(ApiError::not_found("Log not found")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::config::Config;
    use crate::db::{self, Profile, Role, User};

    async fn test_state() -> Arc<AppState> {
        let pool = db::init_memory().await.unwrap();
        Arc::new(AppState::new(Config::default(), pool))
    }

    async fn seed_current(state: &AppState, email: &str, role: Role) -> CurrentUser {
        let id = uuid::Uuid::new_v4().to_string();
        User::insert(&state.db, &id, email, "x").await.unwrap();
        Profile::upsert(&state.db, &id, email, email, role, None)
            .await
            .unwrap();
        let user = User::find_by_id(&state.db, &id).await.unwrap().unwrap();
        let profile = Profile::resolve(&state.db, &user).await.unwrap();
        CurrentUser { user, profile }
    }

    fn submission(date: &str, time_in: &str, time_out: &str) -> NewDtrLog {
        NewDtrLog {
            date: date.to_string(),
            time_in: time_in.to_string(),
            time_out: time_out.to_string(),
            mode: "On-site".to_string(),
            remarks: String::new(),
            proof_url: None,
        }
    }

    #[test]
    fn test_validate_submission_requires_core_fields() {
        assert!(validate_submission(&submission("2024-03-01", "08:00", "17:00")).is_ok());

        for missing in [
            submission("", "08:00", "17:00"),
            submission("2024-03-01", "", "17:00"),
            submission("2024-03-01", "08:00", ""),
        ] {
            let err = validate_submission(&missing).unwrap_err();
            assert_eq!(err.code(), ErrorCode::ValidationError);
        }
    }

    #[tokio::test]
    async fn test_reject_then_conflict_scenario() {
        let state = test_state().await;
        let teacher = seed_current(&state, "t@school.edu", Role::Teacher).await;
        let head = seed_current(&state, "h@school.edu", Role::Head).await;

        let log = DtrLog::create(
            &state.db,
            &teacher.user.id,
            &submission("2024-03-01", "08:00", "17:00"),
        )
        .await
        .unwrap();
        assert_eq!(log.status(), LogStatus::Pending);

        let reviewed = review_log(
            State(state.clone()),
            head,
            Path(log.id.clone()),
            Json(ReviewRequest {
                status: LogStatus::Rejected,
                comment: "Missing signature".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(reviewed.0.status(), LogStatus::Rejected);
        assert_eq!(reviewed.0.admin_comment, "Missing signature");

        // A second reviewer on the same entry sees a conflict.
        let other = seed_current(&state, "h2@school.edu", Role::Admin).await;
        let err = review_log(
            State(state.clone()),
            other,
            Path(log.id.clone()),
            Json(ReviewRequest {
                status: LogStatus::Approved,
                comment: String::new(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_teacher_cannot_review_own_log() {
        let state = test_state().await;
        let teacher = seed_current(&state, "t@school.edu", Role::Teacher).await;

        let log = DtrLog::create(
            &state.db,
            &teacher.user.id,
            &submission("2024-03-01", "08:00", "17:00"),
        )
        .await
        .unwrap();

        let err = review_log(
            State(state.clone()),
            teacher,
            Path(log.id.clone()),
            Json(ReviewRequest {
                status: LogStatus::Approved,
                comment: String::new(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        // The entry is untouched.
        let stored = DtrLog::find_by_id(&state.db, &log.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), LogStatus::Pending);
    }

    #[tokio::test]
    async fn test_blank_rejection_comment_keeps_log_pending() {
        let state = test_state().await;
        let teacher = seed_current(&state, "t@school.edu", Role::Teacher).await;
        let head = seed_current(&state, "h@school.edu", Role::Head).await;

        let log = DtrLog::create(
            &state.db,
            &teacher.user.id,
            &submission("2024-03-01", "08:00", "17:00"),
        )
        .await
        .unwrap();

        let err = review_log(
            State(state.clone()),
            head,
            Path(log.id.clone()),
            Json(ReviewRequest {
                status: LogStatus::Rejected,
                comment: "   ".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let stored = DtrLog::find_by_id(&state.db, &log.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), LogStatus::Pending);
    }
}
