use serde::Serialize;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{Grade, PassingStatus, SessionStatus};

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct ExamSession {
    pub(crate) id: String,
    pub(crate) exam_id: i64,
    pub(crate) user_id: i64,
    pub(crate) status: SessionStatus,
    pub(crate) start_time: Option<PrimitiveDateTime>,
    pub(crate) end_time: Option<PrimitiveDateTime>,
    pub(crate) submitted_time: Option<PrimitiveDateTime>,
    pub(crate) time_remaining_seconds: i32,
    pub(crate) total_questions: i32,
    pub(crate) answered_questions: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl ExamSession {
    /// True once an in-progress session has run past its end time.
    pub(crate) fn is_past_deadline(&self, now: PrimitiveDateTime) -> bool {
        self.status == SessionStatus::InProgress && self.end_time.is_some_and(|end| now > end)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct SessionAnswer {
    pub(crate) session_id: String,
    pub(crate) question_id: i64,
    pub(crate) answer_text: String,
    pub(crate) is_correct: Option<bool>,
    pub(crate) marks_obtained: Option<i32>,
    pub(crate) time_taken_seconds: Option<i32>,
    pub(crate) answered_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub(crate) struct ExamResult {
    pub(crate) id: String,
    pub(crate) session_id: String,
    pub(crate) user_id: i64,
    pub(crate) exam_id: i64,
    pub(crate) total_questions: i32,
    pub(crate) answered_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) wrong_answers: i32,
    pub(crate) total_marks: i32,
    pub(crate) obtained_marks: i32,
    pub(crate) percentage: f64,
    pub(crate) grade: Grade,
    pub(crate) time_taken_minutes: i32,
    pub(crate) passing_status: PassingStatus,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
}
