use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::schemas::result::ExamResultResponse;
use crate::schemas::session::{
    CreateSessionRequest, ExamSessionResponse, SessionAnswerResponse, SubmitAnswerRequest,
    UpdateTimeRequest,
};
use crate::services::answers::{self, AnswerSubmission};
use crate::services::cascade::{self, CascadeReport};
use crate::services::lifecycle::{self, CreateSession};
use crate::tasks::sweeper::{self, SweepReport};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_session))
        .route("/expired", get(list_expired))
        .route("/sweep", post(sweep_expired))
        .route("/user/:user_id", get(list_by_user).delete(delete_user_data))
        .route("/user/:user_id/active", get(list_active_by_user))
        .route("/exam/:exam_id", get(list_by_exam).delete(delete_exam_data))
        .route("/:session_id", get(get_session))
        .route("/:session_id/start", post(start_session))
        .route("/:session_id/answer", post(submit_answer))
        .route("/:session_id/answers", get(list_answers))
        .route("/:session_id/answers/:question_id", get(get_answer))
        .route("/:session_id/submit", post(submit_session))
        .route("/:session_id/cancel", post(cancel_session))
        .route("/:session_id/time", put(update_time))
}

fn sessions_response(
    sessions: Vec<crate::db::models::ExamSession>,
) -> Json<Vec<ExamSessionResponse>> {
    Json(sessions.into_iter().map(ExamSessionResponse::from).collect())
}

async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<ExamSessionResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let request = CreateSession {
        exam_id: payload.exam_id,
        user_id: payload.user_id,
        duration_minutes: payload.duration_minutes,
        total_questions: payload.total_questions,
    };
    let session = lifecycle::create(&state, request, primitive_now_utc()).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

async fn start_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ExamSessionResponse>, ApiError> {
    let session = lifecycle::start(&state, &session_id, primitive_now_utc()).await?;
    Ok(Json(session.into()))
}

async fn submit_answer(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<Json<ExamSessionResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let submission = AnswerSubmission {
        session_id,
        question_id: payload.question_id,
        answer_text: payload.answer_text,
        time_taken_seconds: payload.time_taken_seconds,
    };
    let session = answers::submit_answer(&state, submission, primitive_now_utc()).await?;
    Ok(Json(session.into()))
}

async fn submit_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ExamResultResponse>, ApiError> {
    let result = lifecycle::submit(&state, &session_id, primitive_now_utc()).await?;
    Ok(Json(result.into()))
}

async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ExamSessionResponse>, ApiError> {
    let session = lifecycle::cancel(&state, &session_id, primitive_now_utc()).await?;
    Ok(Json(session.into()))
}

async fn update_time(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<UpdateTimeRequest>,
) -> Result<Json<ExamSessionResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let session = lifecycle::update_time_remaining(
        &state,
        &session_id,
        payload.time_remaining_seconds,
        primitive_now_utc(),
    )
    .await?;
    Ok(Json(session.into()))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ExamSessionResponse>, ApiError> {
    Ok(Json(lifecycle::get(&state, &session_id).await?.into()))
}

async fn list_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<ExamSessionResponse>>, ApiError> {
    Ok(sessions_response(lifecycle::list_by_user(&state, user_id).await?))
}

async fn list_active_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<ExamSessionResponse>>, ApiError> {
    Ok(sessions_response(lifecycle::list_active_by_user(&state, user_id).await?))
}

async fn list_by_exam(
    State(state): State<AppState>,
    Path(exam_id): Path<i64>,
) -> Result<Json<Vec<ExamSessionResponse>>, ApiError> {
    Ok(sessions_response(lifecycle::list_by_exam(&state, exam_id).await?))
}

async fn list_expired(
    State(state): State<AppState>,
) -> Result<Json<Vec<ExamSessionResponse>>, ApiError> {
    Ok(sessions_response(lifecycle::list_expired(&state, primitive_now_utc()).await?))
}

async fn sweep_expired(State(state): State<AppState>) -> Result<Json<SweepReport>, ApiError> {
    Ok(Json(sweeper::sweep(&state, primitive_now_utc()).await?))
}

async fn list_answers(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<SessionAnswerResponse>>, ApiError> {
    let answers = answers::list_answers(&state, &session_id).await?;
    Ok(Json(answers.into_iter().map(SessionAnswerResponse::from).collect()))
}

async fn get_answer(
    State(state): State<AppState>,
    Path((session_id, question_id)): Path<(String, i64)>,
) -> Result<Json<SessionAnswerResponse>, ApiError> {
    Ok(Json(answers::get_answer(&state, &session_id, question_id).await?.into()))
}

async fn delete_user_data(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Json<CascadeReport> {
    Json(cascade::delete_user_data(&state, user_id).await)
}

async fn delete_exam_data(
    State(state): State<AppState>,
    Path(exam_id): Path<i64>,
) -> Json<CascadeReport> {
    Json(cascade::delete_exam_data(&state, exam_id).await)
}
