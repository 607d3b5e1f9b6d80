use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::ExamSession;
use crate::db::types::SessionStatus;
use crate::services::transitions::{self, SessionEvent};
use crate::store::NewSession;

pub(crate) const COLUMNS: &str = "\
    id, exam_id, user_id, status, start_time, end_time, submitted_time, \
    time_remaining_seconds, total_questions, answered_questions, created_at, updated_at";

fn status_names(statuses: &[SessionStatus]) -> Vec<&'static str> {
    statuses.iter().map(|status| status.as_str()).collect()
}

/// Round trip that also fails when the schema has not been migrated.
pub(crate) async fn probe(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1 FROM exam_sessions LIMIT 1").fetch_optional(pool).await?;
    Ok(())
}

pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    session: &NewSession,
) -> Result<Option<ExamSession>, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!(
        "INSERT INTO exam_sessions (
            id, exam_id, user_id, status, time_remaining_seconds, total_questions,
            answered_questions, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,0,$7,$7)
        ON CONFLICT DO NOTHING
        RETURNING {COLUMNS}"
    ))
    .bind(&session.id)
    .bind(session.exam_id)
    .bind(session.user_id)
    .bind(SessionStatus::NotStarted)
    .bind(session.time_remaining_seconds)
    .bind(session.total_questions)
    .bind(session.created_at)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<ExamSession>, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!("SELECT {COLUMNS} FROM exam_sessions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn lock_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ExamSession>, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!(
        "SELECT {COLUMNS} FROM exam_sessions WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_by_user(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<ExamSession>, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!(
        "SELECT {COLUMNS} FROM exam_sessions WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_exam(
    pool: &PgPool,
    exam_id: i64,
) -> Result<Vec<ExamSession>, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!(
        "SELECT {COLUMNS} FROM exam_sessions WHERE exam_id = $1 ORDER BY created_at DESC"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_active_by_user(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<ExamSession>, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!(
        "SELECT {COLUMNS} FROM exam_sessions \
         WHERE user_id = $1 AND status = $2 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .bind(SessionStatus::InProgress)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_expired(
    pool: &PgPool,
    now: PrimitiveDateTime,
) -> Result<Vec<ExamSession>, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!(
        "SELECT {COLUMNS} FROM exam_sessions \
         WHERE status = $1 AND end_time < $2 ORDER BY end_time"
    ))
    .bind(SessionStatus::InProgress)
    .bind(now)
    .fetch_all(pool)
    .await
}

pub(crate) async fn apply_event(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    event: SessionEvent,
    now: PrimitiveDateTime,
) -> Result<Option<ExamSession>, sqlx::Error> {
    let stamps = match event {
        SessionEvent::Start => {
            ", start_time = $3, end_time = $3 + make_interval(secs => time_remaining_seconds)"
        }
        SessionEvent::Submit => ", submitted_time = $3",
        SessionEvent::Expire | SessionEvent::Cancel => "",
    };
    let deadline = match event {
        SessionEvent::Expire => " AND end_time < $3",
        _ => "",
    };

    sqlx::query_as::<_, ExamSession>(&format!(
        "UPDATE exam_sessions SET status = $1, updated_at = $3{stamps} \
         WHERE id = $2 AND status::text = ANY($4){deadline} \
         RETURNING {COLUMNS}"
    ))
    .bind(transitions::target(event))
    .bind(id)
    .bind(now)
    .bind(status_names(&transitions::sources(event)))
    .fetch_optional(executor)
    .await
}

pub(crate) async fn update_time_remaining(
    pool: &PgPool,
    id: &str,
    seconds: i32,
    now: PrimitiveDateTime,
) -> Result<Option<ExamSession>, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!(
        "UPDATE exam_sessions SET time_remaining_seconds = $1, updated_at = $2 \
         WHERE id = $3 AND status::text = ANY($4) \
         RETURNING {COLUMNS}"
    ))
    .bind(seconds)
    .bind(now)
    .bind(id)
    .bind(status_names(&SessionStatus::NON_TERMINAL))
    .fetch_optional(pool)
    .await
}

pub(crate) async fn increment_answered(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<ExamSession, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!(
        "UPDATE exam_sessions \
         SET answered_questions = answered_questions + 1, updated_at = $1 \
         WHERE id = $2 RETURNING {COLUMNS}"
    ))
    .bind(now)
    .bind(id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn delete_by_user(pool: &PgPool, user_id: i64) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM exam_sessions WHERE user_id = $1").bind(user_id).execute(pool).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn delete_by_exam(pool: &PgPool, exam_id: i64) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM exam_sessions WHERE exam_id = $1").bind(exam_id).execute(pool).await?;
    Ok(result.rows_affected())
}
