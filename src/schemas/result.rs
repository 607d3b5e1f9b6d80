use serde::Serialize;

use crate::core::time::format_primitive;
use crate::db::models::ExamResult;
use crate::db::types::{Grade, PassingStatus};

#[derive(Debug, Serialize)]
pub(crate) struct ExamResultResponse {
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
    pub(crate) submitted_at: String,
    pub(crate) created_at: String,
}

impl From<ExamResult> for ExamResultResponse {
    fn from(result: ExamResult) -> Self {
        Self {
            id: result.id,
            session_id: result.session_id,
            user_id: result.user_id,
            exam_id: result.exam_id,
            total_questions: result.total_questions,
            answered_questions: result.answered_questions,
            correct_answers: result.correct_answers,
            wrong_answers: result.wrong_answers,
            total_marks: result.total_marks,
            obtained_marks: result.obtained_marks,
            percentage: result.percentage,
            grade: result.grade,
            time_taken_minutes: result.time_taken_minutes,
            passing_status: result.passing_status,
            submitted_at: format_primitive(result.submitted_at),
            created_at: format_primitive(result.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CompletionResponse {
    pub(crate) user_id: i64,
    pub(crate) exam_id: i64,
    pub(crate) completed: bool,
}
