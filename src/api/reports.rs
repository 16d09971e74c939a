//! Reporting: approval queue, verified report, aggregate stats, CSV export.
//!
//! Views are pure derivations over the current log set; every handler
//! re-reads from the repository rather than trusting any cached state.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::db::{DtrLog, DtrLogWithAuthor, LogStatus, Role, User};
use crate::AppState;

use super::auth::CurrentUser;
use super::error::ApiError;

/// Pending entries awaiting review.
pub fn approval_queue(logs: &[DtrLogWithAuthor]) -> Vec<DtrLogWithAuthor> {
    logs.iter()
        .filter(|l| l.status() == LogStatus::Pending)
        .cloned()
        .collect()
}

/// Approved entries only.
pub fn verified_report(logs: &[DtrLogWithAuthor]) -> Vec<DtrLogWithAuthor> {
    logs.iter()
        .filter(|l| l.status() == LogStatus::Approved)
        .cloned()
        .collect()
}

/// Replace commas and control characters (newlines included) with a space so
/// free text cannot break the row or record structure. No quoting: the export
/// format is deliberately dumb.
fn sanitize_csv_field(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == ',' || c.is_control() { ' ' } else { c })
        .collect()
}

/// Render the verified report as CSV: a header row plus one row per
/// Approved log.
pub fn export_csv(logs: &[DtrLogWithAuthor]) -> String {
    let mut out = String::from("Date,Name,Time In,Time Out,Mode,Remarks,Status\n");
    for log in logs.iter().filter(|l| l.status() == LogStatus::Approved) {
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            log.date,
            sanitize_csv_field(&log.author_name),
            log.time_in,
            log.time_out,
            sanitize_csv_field(&log.mode),
            sanitize_csv_field(&log.remarks),
            log.status
        ));
    }
    out
}

/// GET /api/reports/queue
pub async fn queue(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<Json<Vec<DtrLogWithAuthor>>, ApiError> {
    current.require_reviewer()?;
    let logs = DtrLog::list_for(&state.db, current.role(), &current.user.id).await?;
    Ok(Json(approval_queue(&logs)))
}

/// GET /api/reports/verified
pub async fn verified(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<Json<Vec<DtrLogWithAuthor>>, ApiError> {
    current.require_reviewer()?;
    let logs = DtrLog::list_for(&state.db, current.role(), &current.user.id).await?;
    Ok(Json(verified_report(&logs)))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub pending_count: i64,
    pub approved_count: i64,
    /// Only present for admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_users: Option<i64>,
}

/// Aggregate counts for the dashboard cards. Teachers get their own counts,
/// reviewers system-wide ones, admins additionally the user total.
///
/// GET /api/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<Json<StatsResponse>, ApiError> {
    let role = current.role();

    let (pending_count, approved_count) = if role.is_reviewer() {
        (
            DtrLog::count_by_status(&state.db, LogStatus::Pending).await?,
            DtrLog::count_by_status(&state.db, LogStatus::Approved).await?,
        )
    } else {
        (
            DtrLog::count_for_user_by_status(&state.db, &current.user.id, LogStatus::Pending)
                .await?,
            DtrLog::count_for_user_by_status(&state.db, &current.user.id, LogStatus::Approved)
                .await?,
        )
    };

    let total_users = if role == Role::Admin {
        Some(User::count(&state.db).await?)
    } else {
        None
    };

    Ok(Json(StatsResponse {
        pending_count,
        approved_count,
        total_users,
    }))
}

/// Download the verified report as CSV.
///
/// GET /api/reports/export
pub async fn export(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<(HeaderMap, String), ApiError> {
    current.require_reviewer()?;

    let logs = DtrLog::list_for(&state.db, current.role(), &current.user.id).await?;
    let body = export_csv(&logs);

    let filename = format!("dtr_report_{}.csv", chrono::Utc::now().format("%Y-%m-%d"));
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
            .map_err(|e| ApiError::internal(format!("Invalid header value: {}", e)))?,
    );

    Ok((headers, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(status: &str, name: &str, mode: &str, remarks: &str) -> DtrLogWithAuthor {
        DtrLogWithAuthor {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: "u1".to_string(),
            date: "2024-03-01".to_string(),
            time_in: "08:00".to_string(),
            time_out: "17:00".to_string(),
            mode: mode.to_string(),
            remarks: remarks.to_string(),
            proof_url: None,
            status: status.to_string(),
            admin_comment: String::new(),
            created_at: "2024-03-01T08:00:00Z".to_string(),
            author_name: name.to_string(),
            author_email: "a@school.edu".to_string(),
        }
    }

    #[test]
    fn test_queue_and_report_filters() {
        let logs = vec![
            log("Pending", "A", "On-site", ""),
            log("Approved", "B", "Remote", ""),
            log("Rejected", "C", "On-site", ""),
        ];

        let queue = approval_queue(&logs);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].author_name, "A");

        let report = verified_report(&logs);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].author_name, "B");
    }

    #[test]
    fn test_export_csv_only_approved() {
        let logs = vec![
            log("Pending", "A", "On-site", ""),
            log("Approved", "B", "Remote", ""),
            log("Rejected", "C", "On-site", ""),
            log("Approved", "D", "On-site", ""),
        ];

        let csv = export_csv(&logs);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Date,Name,Time In,Time Out,Mode,Remarks,Status");
        // Exactly one data row per approved log.
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains(",B,"));
        assert!(lines[2].contains(",D,"));
    }

    #[test]
    fn test_export_csv_neutralizes_commas() {
        let logs = vec![log("Approved", "B", "Remote", "sick, leave")];

        let csv = export_csv(&logs);
        let data_row = csv.lines().nth(1).unwrap();
        assert!(data_row.contains("Remote"));
        assert!(data_row.contains("sick  leave"));
        // Header commas aside, each row keeps exactly 6 separators.
        assert_eq!(data_row.matches(',').count(), 6);
    }

    #[test]
    fn test_export_csv_neutralizes_newlines() {
        let logs = vec![log("Approved", "B", "Remote", "sick\nleave\r\nextra")];

        let csv = export_csv(&logs);
        let lines: Vec<&str> = csv.lines().collect();
        // One header plus exactly one data row; the remarks cannot split
        // a record.
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("sick leave  extra"));
    }

    #[test]
    fn test_export_csv_empty_set() {
        let csv = export_csv(&[]);
        assert_eq!(csv, "Date,Name,Time In,Time Out,Mode,Remarks,Status\n");
    }
}
