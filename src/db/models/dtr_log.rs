//! DTR log entries and the repository operations over them.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

use super::{LogStatus, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DtrLog {
    pub id: String,
    pub user_id: String,
    pub date: String,
    pub time_in: String,
    pub time_out: String,
    pub mode: String,
    pub remarks: String,
    pub proof_url: Option<String>,
    pub status: String,
    pub admin_comment: String,
    pub created_at: String,
}

impl DtrLog {
    /// Parsed status. Rows only ever hold the three known states.
    pub fn status(&self) -> LogStatus {
        LogStatus::from_str(&self.status).unwrap_or(LogStatus::Pending)
    }
}

/// A log row joined with its author's display data, as listed for the UI.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DtrLogWithAuthor {
    pub id: String,
    pub user_id: String,
    pub date: String,
    pub time_in: String,
    pub time_out: String,
    pub mode: String,
    pub remarks: String,
    pub proof_url: Option<String>,
    pub status: String,
    pub admin_comment: String,
    pub created_at: String,
    pub author_name: String,
    pub author_email: String,
}

impl DtrLogWithAuthor {
    pub fn status(&self) -> LogStatus {
        LogStatus::from_str(&self.status).unwrap_or(LogStatus::Pending)
    }
}

/// Validated submission fields for a new log entry.
#[derive(Debug, Clone, Default)]
pub struct NewDtrLog {
    pub date: String,
    pub time_in: String,
    pub time_out: String,
    pub mode: String,
    pub remarks: String,
    pub proof_url: Option<String>,
}

/// Outcome of a status-guarded transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The guarded update matched; the stored row after the transition.
    Updated(Box<DtrLog>),
    /// The row exists but its status no longer matches the expected one;
    /// carries the status found in the store.
    Conflict(String),
    /// No such log.
    NotFound,
}

impl DtrLog {
    /// List logs for a session: teachers see only their own entries, heads
    /// and admins see the whole system. Newest date first.
    ///
    /// The profile join is outer: an identity without a profile row still
    /// owns logs, so author fields fall back to the identity email the same
    /// way profile resolution does.
    pub async fn list_for(
        pool: &SqlitePool,
        role: Role,
        user_id: &str,
    ) -> Result<Vec<DtrLogWithAuthor>, sqlx::Error> {
        let base = r#"
            SELECT l.*,
                COALESCE(p.full_name, substr(u.email, 1, instr(u.email, '@') - 1)) AS author_name,
                COALESCE(p.email, u.email) AS author_email
            FROM dtr_logs l
            JOIN users u ON u.id = l.user_id
            LEFT JOIN profiles p ON p.id = l.user_id
        "#;

        if role.is_reviewer() {
            sqlx::query_as(&format!("{} ORDER BY l.date DESC, l.created_at DESC", base))
                .fetch_all(pool)
                .await
        } else {
            sqlx::query_as(&format!(
                "{} WHERE l.user_id = ? ORDER BY l.date DESC, l.created_at DESC",
                base
            ))
            .bind(user_id)
            .fetch_all(pool)
            .await
        }
    }

    /// Insert a new entry. Status is always Pending and the reviewer comment
    /// empty, regardless of what the caller supplies elsewhere.
    pub async fn create(
        pool: &SqlitePool,
        user_id: &str,
        fields: &NewDtrLog,
    ) -> Result<DtrLog, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO dtr_logs (id, user_id, date, time_in, time_out, mode, remarks, proof_url, status, admin_comment)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'Pending', '')
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&fields.date)
        .bind(&fields.time_in)
        .bind(&fields.time_out)
        .bind(&fields.mode)
        .bind(&fields.remarks)
        .bind(&fields.proof_url)
        .execute(pool)
        .await?;

        sqlx::query_as("SELECT * FROM dtr_logs WHERE id = ?")
            .bind(&id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<DtrLog>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM dtr_logs WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Status-guarded conditional update: the transition only lands when the
    /// stored status still matches `expected`. A reviewer losing a race gets
    /// a conflict instead of silently overwriting the winner's decision.
    pub async fn transition(
        pool: &SqlitePool,
        id: &str,
        expected: LogStatus,
        new_status: LogStatus,
        comment: &str,
    ) -> Result<TransitionOutcome, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE dtr_logs SET status = ?, admin_comment = ? WHERE id = ? AND status = ?",
        )
        .bind(new_status.as_str())
        .bind(comment)
        .bind(id)
        .bind(expected.as_str())
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return match Self::find_by_id(pool, id).await? {
                Some(log) => Ok(TransitionOutcome::Conflict(log.status)),
                None => Ok(TransitionOutcome::NotFound),
            };
        }

        let log: DtrLog = sqlx::query_as("SELECT * FROM dtr_logs WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(TransitionOutcome::Updated(Box::new(log)))
    }

    pub async fn count_by_status(
        pool: &SqlitePool,
        status: LogStatus,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM dtr_logs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(pool)
            .await
    }

    pub async fn count_for_user_by_status(
        pool: &SqlitePool,
        user_id: &str,
        status: LogStatus,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM dtr_logs WHERE user_id = ? AND status = ?")
            .bind(user_id)
            .bind(status.as_str())
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, Profile, User};

    async fn seed_user(pool: &SqlitePool, email: &str, name: &str, role: Role) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        User::insert(pool, &id, email, "x").await.unwrap();
        Profile::upsert(pool, &id, email, name, role, Some("Science"))
            .await
            .unwrap();
        id
    }

    fn entry(date: &str) -> NewDtrLog {
        NewDtrLog {
            date: date.to_string(),
            time_in: "08:00".to_string(),
            time_out: "17:00".to_string(),
            mode: "On-site".to_string(),
            remarks: String::new(),
            proof_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_defaults_to_pending() {
        let pool = db::init_memory().await.unwrap();
        let uid = seed_user(&pool, "t@school.edu", "Teacher One", Role::Teacher).await;

        let log = DtrLog::create(&pool, &uid, &entry("2024-03-01")).await.unwrap();
        assert_eq!(log.status(), LogStatus::Pending);
        assert_eq!(log.admin_comment, "");
        assert_eq!(log.user_id, uid);
    }

    #[tokio::test]
    async fn test_listing_is_owner_scoped_for_teachers() {
        let pool = db::init_memory().await.unwrap();
        let a = seed_user(&pool, "a@school.edu", "A", Role::Teacher).await;
        let b = seed_user(&pool, "b@school.edu", "B", Role::Teacher).await;

        DtrLog::create(&pool, &a, &entry("2024-03-01")).await.unwrap();
        DtrLog::create(&pool, &a, &entry("2024-03-02")).await.unwrap();
        DtrLog::create(&pool, &b, &entry("2024-03-03")).await.unwrap();

        let own = DtrLog::list_for(&pool, Role::Teacher, &a).await.unwrap();
        assert_eq!(own.len(), 2);
        assert!(own.iter().all(|l| l.user_id == a));

        let all = DtrLog::list_for(&pool, Role::Admin, &a).await.unwrap();
        assert_eq!(all.len(), 3);
        // Newest date first.
        assert_eq!(all[0].date, "2024-03-03");
    }

    #[tokio::test]
    async fn test_listing_includes_owners_without_profile() {
        let pool = db::init_memory().await.unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        // Identity only, no profile row.
        User::insert(&pool, &id, "new.teacher@school.edu", "x").await.unwrap();

        DtrLog::create(&pool, &id, &entry("2024-03-01")).await.unwrap();

        let own = DtrLog::list_for(&pool, Role::Teacher, &id).await.unwrap();
        assert_eq!(own.len(), 1);
        // Author fields fall back to the identity email, matching profile
        // resolution.
        assert_eq!(own[0].author_name, "new.teacher");
        assert_eq!(own[0].author_email, "new.teacher@school.edu");

        let all = DtrLog::list_for(&pool, Role::Admin, &id).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_transition_approve_then_conflict() {
        let pool = db::init_memory().await.unwrap();
        let uid = seed_user(&pool, "t@school.edu", "T", Role::Teacher).await;
        let log = DtrLog::create(&pool, &uid, &entry("2024-03-01")).await.unwrap();

        let outcome =
            DtrLog::transition(&pool, &log.id, LogStatus::Pending, LogStatus::Approved, "")
                .await
                .unwrap();
        match outcome {
            TransitionOutcome::Updated(updated) => {
                assert_eq!(updated.status(), LogStatus::Approved);
                assert_eq!(updated.admin_comment, "");
            }
            other => panic!("expected Updated, got {:?}", other),
        }

        // Second reviewer acting on the same entry loses the race.
        let second =
            DtrLog::transition(&pool, &log.id, LogStatus::Pending, LogStatus::Rejected, "late")
                .await
                .unwrap();
        assert_eq!(second, TransitionOutcome::Conflict("Approved".to_string()));

        // The stored state is unchanged by the losing attempt.
        let stored = DtrLog::find_by_id(&pool, &log.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), LogStatus::Approved);
        assert_eq!(stored.admin_comment, "");
    }

    #[tokio::test]
    async fn test_transition_missing_log() {
        let pool = db::init_memory().await.unwrap();
        let outcome =
            DtrLog::transition(&pool, "nope", LogStatus::Pending, LogStatus::Approved, "")
                .await
                .unwrap();
        assert_eq!(outcome, TransitionOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_owner_delete_cascades_to_logs() {
        let pool = db::init_memory().await.unwrap();
        let uid = seed_user(&pool, "t@school.edu", "T", Role::Teacher).await;
        let admin = seed_user(&pool, "adm@school.edu", "Adm", Role::Admin).await;
        DtrLog::create(&pool, &uid, &entry("2024-03-01")).await.unwrap();

        assert!(User::delete(&pool, &uid).await.unwrap());

        let remaining = DtrLog::list_for(&pool, Role::Admin, &admin).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_counts() {
        let pool = db::init_memory().await.unwrap();
        let uid = seed_user(&pool, "t@school.edu", "T", Role::Teacher).await;
        let log1 = DtrLog::create(&pool, &uid, &entry("2024-03-01")).await.unwrap();
        DtrLog::create(&pool, &uid, &entry("2024-03-02")).await.unwrap();

        DtrLog::transition(&pool, &log1.id, LogStatus::Pending, LogStatus::Approved, "")
            .await
            .unwrap();

        assert_eq!(DtrLog::count_by_status(&pool, LogStatus::Pending).await.unwrap(), 1);
        assert_eq!(DtrLog::count_by_status(&pool, LogStatus::Approved).await.unwrap(), 1);
        assert_eq!(
            DtrLog::count_for_user_by_status(&pool, &uid, LogStatus::Approved)
                .await
                .unwrap(),
            1
        );
    }
}
