use time::PrimitiveDateTime;

use crate::core::state::AppState;
use crate::db::models::{ExamSession, SessionAnswer};
use crate::db::types::SessionStatus;
use crate::services::errors::SessionError;
use crate::services::lifecycle::{self, ExpiryOutcome};
use crate::store::{AnswerWrite, NewAnswer};

#[derive(Debug, Clone)]
pub(crate) struct AnswerSubmission {
    pub(crate) session_id: String,
    pub(crate) question_id: i64,
    pub(crate) answer_text: String,
    pub(crate) time_taken_seconds: Option<i32>,
}

fn reject(session: &ExamSession) -> SessionError {
    match session.status {
        SessionStatus::TimedOut => SessionError::Expired(session.id.clone()),
        _ => SessionError::not_allowed(session, "accept answers"),
    }
}

/// Records one answer. The answered counter only moves when the question is
/// answered for the first time.
pub(crate) async fn submit_answer(
    state: &AppState,
    submission: AnswerSubmission,
    now: PrimitiveDateTime,
) -> Result<ExamSession, SessionError> {
    if submission.time_taken_seconds.is_some_and(|seconds| seconds < 0) {
        return Err(SessionError::InvalidInput("time_taken_seconds must not be negative".into()));
    }
    let id = submission.session_id.as_str();

    match lifecycle::expire_if_past_deadline(state, id, now).await? {
        ExpiryOutcome::Expired { .. } => return Err(SessionError::Expired(id.to_string())),
        ExpiryOutcome::Unchanged(session) if session.status != SessionStatus::InProgress => {
            return Err(reject(&session));
        }
        ExpiryOutcome::Unchanged(_) => {}
    }

    let answer = NewAnswer {
        session_id: id,
        question_id: submission.question_id,
        answer_text: &submission.answer_text,
        time_taken_seconds: submission.time_taken_seconds,
    };

    match state.store().upsert_answer(answer, now).await? {
        AnswerWrite::Recorded { session, created } => {
            tracing::debug!(
                session_id = %session.id,
                question_id = submission.question_id,
                created,
                answered = session.answered_questions,
                "Answer recorded"
            );
            Ok(session)
        }
        AnswerWrite::Missing => Err(SessionError::session_not_found(id)),
        AnswerWrite::Rejected(session) if session.is_past_deadline(now) => {
            lifecycle::expire_if_past_deadline(state, id, now).await?;
            Err(SessionError::Expired(id.to_string()))
        }
        AnswerWrite::Rejected(session) => Err(reject(&session)),
    }
}

pub(crate) async fn list_answers(
    state: &AppState,
    session_id: &str,
) -> Result<Vec<SessionAnswer>, SessionError> {
    lifecycle::get(state, session_id).await?;
    Ok(state.store().list_answers(session_id).await?)
}

pub(crate) async fn get_answer(
    state: &AppState,
    session_id: &str,
    question_id: i64,
) -> Result<SessionAnswer, SessionError> {
    state.store().find_answer(session_id, question_id).await?.ok_or_else(|| {
        SessionError::NotFound(format!("answer to question {question_id} in session {session_id}"))
    })
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::services::lifecycle::{cancel, create, start, CreateSession};
    use crate::test_support::{datetime, harness, TestHarness};

    fn submission(session_id: &str, question_id: i64, text: &str) -> AnswerSubmission {
        AnswerSubmission {
            session_id: session_id.to_string(),
            question_id,
            answer_text: text.to_string(),
            time_taken_seconds: Some(12),
        }
    }

    async fn started(h: &TestHarness, minutes: i32, now: PrimitiveDateTime) -> ExamSession {
        let session = create(
            &h.state,
            CreateSession { exam_id: 7, user_id: 3, duration_minutes: Some(minutes), total_questions: 20 },
            now,
        )
        .await
        .unwrap();
        start(&h.state, &session.id, now).await.unwrap()
    }

    #[tokio::test]
    async fn concurrent_distinct_answers_are_all_counted() {
        let h = harness();
        let now = datetime(2025, 3, 1, 9, 0, 0);
        let session = started(&h, 30, now).await;

        let mut handles = Vec::new();
        for question_id in 1..=16 {
            let state = h.state.clone();
            let id = session.id.clone();
            handles.push(tokio::spawn(async move {
                submit_answer(&state, submission(&id, question_id, "A"), now).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = lifecycle::get(&h.state, &session.id).await.unwrap();
        assert_eq!(stored.answered_questions, 16);
        assert_eq!(list_answers(&h.state, &session.id).await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn resubmission_overwrites_without_counting() {
        let h = harness();
        let now = datetime(2025, 3, 1, 9, 0, 0);
        let session = started(&h, 30, now).await;

        submit_answer(&h.state, submission(&session.id, 1, "A"), now).await.unwrap();
        let later = now + Duration::minutes(1);
        let updated = submit_answer(
            &h.state,
            AnswerSubmission { time_taken_seconds: None, ..submission(&session.id, 1, "D") },
            later,
        )
        .await
        .unwrap();

        assert_eq!(updated.answered_questions, 1);
        let answer = get_answer(&h.state, &session.id, 1).await.unwrap();
        assert_eq!(answer.answer_text, "D");
        assert_eq!(answer.answered_at, later);
        assert_eq!(answer.time_taken_seconds, Some(12));
    }

    #[tokio::test]
    async fn concurrent_resubmission_counts_once() {
        let h = harness();
        let now = datetime(2025, 3, 1, 9, 0, 0);
        let session = started(&h, 30, now).await;

        let mut handles = Vec::new();
        for text in ["A", "B", "C", "D"] {
            let state = h.state.clone();
            let id = session.id.clone();
            handles.push(tokio::spawn(async move {
                submit_answer(&state, submission(&id, 5, text), now).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(lifecycle::get(&h.state, &session.id).await.unwrap().answered_questions, 1);
    }

    #[tokio::test]
    async fn answer_after_deadline_expires_the_session() {
        let h = harness();
        let now = datetime(2025, 3, 1, 9, 0, 0);
        let session = started(&h, 1, now).await;
        submit_answer(&h.state, submission(&session.id, 1, "A"), now + Duration::seconds(20))
            .await
            .unwrap();

        let err = submit_answer(&h.state, submission(&session.id, 2, "B"), now + Duration::minutes(2))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Expired(_)));

        let stored = lifecycle::get(&h.state, &session.id).await.unwrap();
        assert_eq!(stored.status, SessionStatus::TimedOut);
        assert_eq!(stored.answered_questions, 1);
        assert!(matches!(
            get_answer(&h.state, &session.id, 2).await,
            Err(SessionError::NotFound(_))
        ));
        let result = crate::services::grading::result_for_session(&h.state, &session.id)
            .await
            .unwrap();
        assert_eq!(result.answered_questions, 1);

        let err = submit_answer(&h.state, submission(&session.id, 3, "C"), now + Duration::minutes(3))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Expired(_)));
    }

    #[tokio::test]
    async fn answers_need_an_in_progress_session() {
        let h = harness();
        let now = datetime(2025, 3, 1, 9, 0, 0);
        let session = create(
            &h.state,
            CreateSession { exam_id: 7, user_id: 3, duration_minutes: Some(30), total_questions: 2 },
            now,
        )
        .await
        .unwrap();

        let err = submit_answer(&h.state, submission(&session.id, 1, "A"), now).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidState(_)));

        cancel(&h.state, &session.id, now).await.unwrap();
        let err = submit_answer(&h.state, submission(&session.id, 1, "A"), now).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidState(message) if message.contains("CANCELLED")));

        let err = submit_answer(&h.state, submission("missing", 1, "A"), now).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn negative_time_taken_is_rejected() {
        let h = harness();
        let now = datetime(2025, 3, 1, 9, 0, 0);
        let session = started(&h, 30, now).await;

        let err = submit_answer(
            &h.state,
            AnswerSubmission { time_taken_seconds: Some(-5), ..submission(&session.id, 1, "A") },
            now,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn listing_answers_of_unknown_session_is_not_found() {
        let h = harness();
        assert!(matches!(list_answers(&h.state, "missing").await, Err(SessionError::NotFound(_))));
    }
}
