use sqlx::PgPool;

use crate::db::models::ExamResult;

pub(crate) const COLUMNS: &str = "\
    id, session_id, user_id, exam_id, total_questions, answered_questions, \
    correct_answers, wrong_answers, total_marks, obtained_marks, percentage, grade, \
    time_taken_minutes, passing_status, submitted_at, created_at";

pub(crate) async fn insert(pool: &PgPool, result: &ExamResult) -> Result<bool, sqlx::Error> {
    let outcome = sqlx::query(
        "INSERT INTO exam_results (
            id, session_id, user_id, exam_id, total_questions, answered_questions,
            correct_answers, wrong_answers, total_marks, obtained_marks, percentage, grade,
            time_taken_minutes, passing_status, submitted_at, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
        ON CONFLICT (session_id) DO NOTHING",
    )
    .bind(&result.id)
    .bind(&result.session_id)
    .bind(result.user_id)
    .bind(result.exam_id)
    .bind(result.total_questions)
    .bind(result.answered_questions)
    .bind(result.correct_answers)
    .bind(result.wrong_answers)
    .bind(result.total_marks)
    .bind(result.obtained_marks)
    .bind(result.percentage)
    .bind(result.grade)
    .bind(result.time_taken_minutes)
    .bind(result.passing_status)
    .bind(result.submitted_at)
    .bind(result.created_at)
    .execute(pool)
    .await?;

    Ok(outcome.rows_affected() > 0)
}

pub(crate) async fn find_by_session(
    pool: &PgPool,
    session_id: &str,
) -> Result<Option<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!(
        "SELECT {COLUMNS} FROM exam_results WHERE session_id = $1"
    ))
    .bind(session_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_by_user(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!(
        "SELECT {COLUMNS} FROM exam_results WHERE user_id = $1 ORDER BY submitted_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_exam(
    pool: &PgPool,
    exam_id: i64,
) -> Result<Vec<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!(
        "SELECT {COLUMNS} FROM exam_results WHERE exam_id = $1 ORDER BY percentage DESC"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_latest_for_user_exam(
    pool: &PgPool,
    user_id: i64,
    exam_id: i64,
) -> Result<Option<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!(
        "SELECT {COLUMNS} FROM exam_results WHERE user_id = $1 AND exam_id = $2 \
         ORDER BY submitted_at DESC LIMIT 1"
    ))
    .bind(user_id)
    .bind(exam_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete_by_user(pool: &PgPool, user_id: i64) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM exam_results WHERE user_id = $1").bind(user_id).execute(pool).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn delete_by_exam(pool: &PgPool, exam_id: i64) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM exam_results WHERE exam_id = $1").bind(exam_id).execute(pool).await?;
    Ok(result.rows_affected())
}
