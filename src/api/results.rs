use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::db::models::ExamResult;
use crate::schemas::result::{CompletionResponse, ExamResultResponse};
use crate::services::grading;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/session/:session_id", get(result_for_session))
        .route("/user/:user_id", get(results_by_user))
        .route("/exam/:exam_id", get(results_by_exam))
        .route("/user/:user_id/exam/:exam_id", get(result_for_user_exam))
        .route("/check/:user_id/:exam_id", get(check_completed))
}

fn results_response(results: Vec<ExamResult>) -> Json<Vec<ExamResultResponse>> {
    Json(results.into_iter().map(ExamResultResponse::from).collect())
}

async fn result_for_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ExamResultResponse>, ApiError> {
    Ok(Json(grading::result_for_session(&state, &session_id).await?.into()))
}

async fn results_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<ExamResultResponse>>, ApiError> {
    Ok(results_response(grading::results_by_user(&state, user_id).await?))
}

async fn results_by_exam(
    State(state): State<AppState>,
    Path(exam_id): Path<i64>,
) -> Result<Json<Vec<ExamResultResponse>>, ApiError> {
    Ok(results_response(grading::results_by_exam(&state, exam_id).await?))
}

async fn result_for_user_exam(
    State(state): State<AppState>,
    Path((user_id, exam_id)): Path<(i64, i64)>,
) -> Result<Json<ExamResultResponse>, ApiError> {
    Ok(Json(grading::result_for_user_exam(&state, user_id, exam_id).await?.into()))
}

async fn check_completed(
    State(state): State<AppState>,
    Path((user_id, exam_id)): Path<(i64, i64)>,
) -> Result<Json<CompletionResponse>, ApiError> {
    let completed = grading::is_exam_completed(&state, user_id, exam_id).await?;
    Ok(Json(CompletionResponse { user_id, exam_id, completed }))
}
