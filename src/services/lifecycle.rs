use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::db::models::{ExamResult, ExamSession};
use crate::db::types::SessionStatus;
use crate::services::errors::SessionError;
use crate::services::grading;
use crate::services::transitions::SessionEvent;
use crate::store::NewSession;

#[derive(Debug, Clone)]
pub(crate) struct CreateSession {
    pub(crate) exam_id: i64,
    pub(crate) user_id: i64,
    /// Resolved from the exam when absent.
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) total_questions: i32,
}

#[derive(Debug, Clone)]
pub(crate) enum ExpiryOutcome {
    /// This call moved the session to TIMED_OUT. `result` is set when the
    /// session had answers and grading succeeded.
    Expired { session: ExamSession, result: Option<ExamResult> },
    Unchanged(ExamSession),
}

async fn load(state: &AppState, id: &str) -> Result<ExamSession, SessionError> {
    state.store().find_session(id).await?.ok_or_else(|| SessionError::session_not_found(id))
}

/// Explains why a conditional transition did not take effect.
async fn rejection(state: &AppState, id: &str, action: &str) -> SessionError {
    match state.store().find_session(id).await {
        Ok(Some(session)) => SessionError::not_allowed(&session, action),
        Ok(None) => SessionError::session_not_found(id),
        Err(err) => err.into(),
    }
}

async fn resolve_duration(state: &AppState, request: &CreateSession) -> Result<i32, SessionError> {
    if let Some(minutes) = request.duration_minutes {
        return Ok(minutes);
    }

    let collaborators = state.collaborators();
    let exam = collaborators
        .bounded("exam service", collaborators.exams.exam(request.exam_id))
        .await
        .map_err(|err| {
            tracing::warn!(exam_id = request.exam_id, error = %err, "Cannot resolve exam duration");
            SessionError::InvalidInput(format!(
                "duration_minutes is required: exam {} is unavailable",
                request.exam_id
            ))
        })?;

    exam.duration_minutes.ok_or_else(|| {
        SessionError::InvalidInput(format!("exam {} has no duration", request.exam_id))
    })
}

pub(crate) async fn create(
    state: &AppState,
    request: CreateSession,
    now: PrimitiveDateTime,
) -> Result<ExamSession, SessionError> {
    if request.total_questions < 0 {
        return Err(SessionError::InvalidInput("total_questions must not be negative".into()));
    }
    let minutes = resolve_duration(state, &request).await?;
    let seconds = match minutes.checked_mul(60) {
        Some(seconds) if minutes > 0 => seconds,
        _ => {
            return Err(SessionError::InvalidInput(format!(
                "duration_minutes must be positive, got {minutes}"
            )))
        }
    };

    let new_session = NewSession {
        id: Uuid::new_v4().to_string(),
        exam_id: request.exam_id,
        user_id: request.user_id,
        time_remaining_seconds: seconds,
        total_questions: request.total_questions,
        created_at: now,
    };

    let session = state.store().insert_session(new_session).await?.ok_or_else(|| {
        SessionError::Conflict(format!(
            "user {} already has an active session for exam {}",
            request.user_id, request.exam_id
        ))
    })?;

    tracing::info!(
        session_id = %session.id,
        exam_id = session.exam_id,
        user_id = session.user_id,
        "Session created"
    );
    Ok(session)
}

pub(crate) async fn start(
    state: &AppState,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<ExamSession, SessionError> {
    match state.store().apply_event(id, SessionEvent::Start, now).await? {
        Some(session) => {
            tracing::info!(session_id = %session.id, end_time = ?session.end_time, "Session started");
            Ok(session)
        }
        None => Err(rejection(state, id, "start").await),
    }
}

pub(crate) async fn cancel(
    state: &AppState,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<ExamSession, SessionError> {
    match state.store().apply_event(id, SessionEvent::Cancel, now).await? {
        Some(session) => {
            tracing::info!(session_id = %session.id, "Session cancelled");
            Ok(session)
        }
        None => Err(rejection(state, id, "cancel").await),
    }
}

/// Stores the client's view of the remaining time. Never moves the deadline.
pub(crate) async fn update_time_remaining(
    state: &AppState,
    id: &str,
    seconds: i32,
    now: PrimitiveDateTime,
) -> Result<ExamSession, SessionError> {
    if seconds < 0 {
        return Err(SessionError::InvalidInput("time_remaining must not be negative".into()));
    }
    match state.store().update_time_remaining(id, seconds, now).await? {
        Some(session) => Ok(session),
        None => Err(rejection(state, id, "update the remaining time").await),
    }
}

/// Moves an overdue in-progress session to TIMED_OUT and grades it once if it
/// has answers. Shared by the sweeper and every request path.
pub(crate) async fn expire_if_past_deadline(
    state: &AppState,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<ExpiryOutcome, SessionError> {
    let Some(session) = state.store().apply_event(id, SessionEvent::Expire, now).await? else {
        return Ok(ExpiryOutcome::Unchanged(load(state, id).await?));
    };

    tracing::info!(
        session_id = %session.id,
        answered = session.answered_questions,
        "Session timed out"
    );
    metrics::counter!("sessions_expired_total").increment(1);

    let result = if session.answered_questions > 0 {
        match grading::grade_session(state, &session, now).await {
            Ok(result) => Some(result),
            Err(err) => {
                tracing::error!(session_id = %session.id, error = %err, "Failed to grade timed out session");
                metrics::counter!("grading_failures_total").increment(1);
                None
            }
        }
    } else {
        None
    };

    Ok(ExpiryOutcome::Expired { session, result })
}

/// Submits and grades the session. A finished session without a result is
/// graded again; once a result exists the call is a conflict.
pub(crate) async fn submit(
    state: &AppState,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<ExamResult, SessionError> {
    let session = load(state, id).await?;
    if session.is_past_deadline(now) {
        expire_if_past_deadline(state, id, now).await?;
        return Err(SessionError::Expired(id.to_string()));
    }

    if let Some(submitted) = state.store().apply_event(id, SessionEvent::Submit, now).await? {
        tracing::info!(session_id = %submitted.id, "Session submitted");
        return grading::grade_session(state, &submitted, now).await;
    }

    let current = load(state, id).await?;
    match current.status {
        SessionStatus::Submitted | SessionStatus::TimedOut => {
            if state.store().find_result_by_session(id).await?.is_some() {
                return Err(SessionError::Conflict(format!(
                    "session {id} has already been graded"
                )));
            }
            if current.status == SessionStatus::TimedOut && current.answered_questions == 0 {
                return Err(SessionError::Expired(id.to_string()));
            }
            tracing::info!(session_id = %id, status = %current.status, "Retrying grading");
            grading::grade_session(state, &current, now).await
        }
        SessionStatus::InProgress if current.is_past_deadline(now) => {
            expire_if_past_deadline(state, id, now).await?;
            Err(SessionError::Expired(id.to_string()))
        }
        _ => Err(SessionError::not_allowed(&current, "submit")),
    }
}

pub(crate) async fn get(state: &AppState, id: &str) -> Result<ExamSession, SessionError> {
    load(state, id).await
}

pub(crate) async fn list_by_user(
    state: &AppState,
    user_id: i64,
) -> Result<Vec<ExamSession>, SessionError> {
    Ok(state.store().list_sessions_by_user(user_id).await?)
}

pub(crate) async fn list_by_exam(
    state: &AppState,
    exam_id: i64,
) -> Result<Vec<ExamSession>, SessionError> {
    Ok(state.store().list_sessions_by_exam(exam_id).await?)
}

pub(crate) async fn list_active_by_user(
    state: &AppState,
    user_id: i64,
) -> Result<Vec<ExamSession>, SessionError> {
    Ok(state.store().list_active_sessions_by_user(user_id).await?)
}

pub(crate) async fn list_expired(
    state: &AppState,
    now: PrimitiveDateTime,
) -> Result<Vec<ExamSession>, SessionError> {
    Ok(state.store().list_expired_sessions(now).await?)
}
