use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{ExamSession, SessionAnswer};
use crate::db::types::SessionStatus;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CreateSessionRequest {
    #[serde(alias = "examId")]
    #[validate(range(min = 1, message = "exam_id must be positive"))]
    pub(crate) exam_id: i64,
    #[serde(alias = "userId")]
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub(crate) user_id: i64,
    #[serde(default, alias = "durationMinutes")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: Option<i32>,
    #[serde(default, alias = "totalQuestions")]
    #[validate(range(min = 0, message = "total_questions must be non-negative"))]
    pub(crate) total_questions: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitAnswerRequest {
    #[serde(alias = "questionId")]
    #[validate(range(min = 1, message = "question_id must be positive"))]
    pub(crate) question_id: i64,
    #[serde(alias = "answerText", alias = "answer")]
    pub(crate) answer_text: String,
    #[serde(default, alias = "timeTakenSeconds")]
    #[validate(range(min = 0, message = "time_taken_seconds must be non-negative"))]
    pub(crate) time_taken_seconds: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct UpdateTimeRequest {
    #[serde(alias = "timeRemaining", alias = "time_remaining")]
    #[validate(range(min = 0, message = "time_remaining_seconds must be non-negative"))]
    pub(crate) time_remaining_seconds: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamSessionResponse {
    pub(crate) id: String,
    pub(crate) exam_id: i64,
    pub(crate) user_id: i64,
    pub(crate) status: SessionStatus,
    pub(crate) start_time: Option<String>,
    pub(crate) end_time: Option<String>,
    pub(crate) submitted_time: Option<String>,
    pub(crate) time_remaining_seconds: i32,
    pub(crate) total_questions: i32,
    pub(crate) answered_questions: i32,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl From<ExamSession> for ExamSessionResponse {
    fn from(session: ExamSession) -> Self {
        Self {
            id: session.id,
            exam_id: session.exam_id,
            user_id: session.user_id,
            status: session.status,
            start_time: session.start_time.map(format_primitive),
            end_time: session.end_time.map(format_primitive),
            submitted_time: session.submitted_time.map(format_primitive),
            time_remaining_seconds: session.time_remaining_seconds,
            total_questions: session.total_questions,
            answered_questions: session.answered_questions,
            created_at: format_primitive(session.created_at),
            updated_at: format_primitive(session.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionAnswerResponse {
    pub(crate) session_id: String,
    pub(crate) question_id: i64,
    pub(crate) answer_text: String,
    pub(crate) is_correct: Option<bool>,
    pub(crate) marks_obtained: Option<i32>,
    pub(crate) time_taken_seconds: Option<i32>,
    pub(crate) answered_at: String,
}

impl From<SessionAnswer> for SessionAnswerResponse {
    fn from(answer: SessionAnswer) -> Self {
        Self {
            session_id: answer.session_id,
            question_id: answer.question_id,
            answer_text: answer.answer_text,
            is_correct: answer.is_correct,
            marks_obtained: answer.marks_obtained,
            time_taken_seconds: answer.time_taken_seconds,
            answered_at: format_primitive(answer.answered_at),
        }
    }
}
