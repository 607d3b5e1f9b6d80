use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::SessionAnswer;
use crate::store::{AnswerGrade, NewAnswer};

pub(crate) const COLUMNS: &str = "\
    session_id, question_id, answer_text, is_correct, marks_obtained, \
    time_taken_seconds, answered_at, created_at, updated_at";

/// Inserts or overwrites the answer. Returns true when the row is new.
pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    answer: NewAnswer<'_>,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "INSERT INTO session_answers (
            session_id, question_id, answer_text, time_taken_seconds,
            answered_at, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$5,$5)
        ON CONFLICT (session_id, question_id) DO UPDATE SET
            answer_text = EXCLUDED.answer_text,
            time_taken_seconds = COALESCE(EXCLUDED.time_taken_seconds, session_answers.time_taken_seconds),
            answered_at = EXCLUDED.answered_at,
            updated_at = EXCLUDED.updated_at
        RETURNING (xmax = 0)",
    )
    .bind(answer.session_id)
    .bind(answer.question_id)
    .bind(answer.answer_text)
    .bind(answer.time_taken_seconds)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_by_session(
    pool: &PgPool,
    session_id: &str,
) -> Result<Vec<SessionAnswer>, sqlx::Error> {
    sqlx::query_as::<_, SessionAnswer>(&format!(
        "SELECT {COLUMNS} FROM session_answers WHERE session_id = $1 ORDER BY question_id"
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find(
    pool: &PgPool,
    session_id: &str,
    question_id: i64,
) -> Result<Option<SessionAnswer>, sqlx::Error> {
    sqlx::query_as::<_, SessionAnswer>(&format!(
        "SELECT {COLUMNS} FROM session_answers WHERE session_id = $1 AND question_id = $2"
    ))
    .bind(session_id)
    .bind(question_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn record_grade(
    executor: impl sqlx::PgExecutor<'_>,
    session_id: &str,
    grade: &AnswerGrade,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE session_answers SET is_correct = $1, marks_obtained = $2, updated_at = $3 \
         WHERE session_id = $4 AND question_id = $5",
    )
    .bind(grade.is_correct)
    .bind(grade.marks_obtained)
    .bind(now)
    .bind(session_id)
    .bind(grade.question_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn delete_by_user(pool: &PgPool, user_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM session_answers \
         WHERE session_id IN (SELECT id FROM exam_sessions WHERE user_id = $1)",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn delete_by_exam(pool: &PgPool, exam_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM session_answers \
         WHERE session_id IN (SELECT id FROM exam_sessions WHERE exam_id = $1)",
    )
    .bind(exam_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
