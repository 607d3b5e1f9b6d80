//! Persistence contract for sessions, answers and results.
//!
//! Every state transition and the answer upsert are single atomic operations
//! of the store, so callers never read-then-write session status.

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{ExamResult, ExamSession, SessionAnswer};
use crate::services::transitions::SessionEvent;

pub(crate) use memory::MemoryStore;
pub(crate) use postgres::PgStore;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub(crate) struct NewSession {
    pub(crate) id: String,
    pub(crate) exam_id: i64,
    pub(crate) user_id: i64,
    pub(crate) time_remaining_seconds: i32,
    pub(crate) total_questions: i32,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct NewAnswer<'a> {
    pub(crate) session_id: &'a str,
    pub(crate) question_id: i64,
    pub(crate) answer_text: &'a str,
    pub(crate) time_taken_seconds: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AnswerGrade {
    pub(crate) question_id: i64,
    pub(crate) is_correct: bool,
    pub(crate) marks_obtained: i32,
}

/// Outcome of the atomic answer upsert.
#[derive(Debug, Clone)]
pub(crate) enum AnswerWrite {
    /// Stored; `created` is true when the question had no answer before.
    Recorded { session: ExamSession, created: bool },
    /// The session is not in progress or is past its deadline.
    Rejected(ExamSession),
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Owner {
    User(i64),
    Exam(i64),
}

#[async_trait]
pub(crate) trait ExamStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    /// Inserts a NOT_STARTED session. `None` when the user already has a
    /// live session for the exam.
    async fn insert_session(&self, session: NewSession)
        -> Result<Option<ExamSession>, StoreError>;
    async fn find_session(&self, id: &str) -> Result<Option<ExamSession>, StoreError>;
    async fn list_sessions_by_user(&self, user_id: i64) -> Result<Vec<ExamSession>, StoreError>;
    async fn list_sessions_by_exam(&self, exam_id: i64) -> Result<Vec<ExamSession>, StoreError>;
    async fn list_active_sessions_by_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<ExamSession>, StoreError>;
    /// IN_PROGRESS sessions with `end_time < now`.
    async fn list_expired_sessions(
        &self,
        now: PrimitiveDateTime,
    ) -> Result<Vec<ExamSession>, StoreError>;

    /// Applies `event` iff the current status is a legal source for it (and,
    /// for `Expire`, the deadline has passed). Returns the updated row only
    /// when the transition took effect.
    async fn apply_event(
        &self,
        id: &str,
        event: SessionEvent,
        now: PrimitiveDateTime,
    ) -> Result<Option<ExamSession>, StoreError>;
    /// Updates the advisory remaining time of a live session.
    async fn update_time_remaining(
        &self,
        id: &str,
        seconds: i32,
        now: PrimitiveDateTime,
    ) -> Result<Option<ExamSession>, StoreError>;

    async fn upsert_answer(
        &self,
        answer: NewAnswer<'_>,
        now: PrimitiveDateTime,
    ) -> Result<AnswerWrite, StoreError>;
    async fn list_answers(&self, session_id: &str) -> Result<Vec<SessionAnswer>, StoreError>;
    async fn find_answer(
        &self,
        session_id: &str,
        question_id: i64,
    ) -> Result<Option<SessionAnswer>, StoreError>;
    async fn record_answer_grades(
        &self,
        session_id: &str,
        grades: &[AnswerGrade],
        now: PrimitiveDateTime,
    ) -> Result<(), StoreError>;

    /// Returns false when the session already has a result.
    async fn insert_result(&self, result: &ExamResult) -> Result<bool, StoreError>;
    async fn find_result_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ExamResult>, StoreError>;
    async fn list_results_by_user(&self, user_id: i64) -> Result<Vec<ExamResult>, StoreError>;
    async fn list_results_by_exam(&self, exam_id: i64) -> Result<Vec<ExamResult>, StoreError>;
    /// Latest result of the user for the exam.
    async fn find_result_for_user_exam(
        &self,
        user_id: i64,
        exam_id: i64,
    ) -> Result<Option<ExamResult>, StoreError>;

    async fn delete_results(&self, owner: Owner) -> Result<u64, StoreError>;
    async fn delete_answers(&self, owner: Owner) -> Result<u64, StoreError>;
    async fn delete_sessions(&self, owner: Owner) -> Result<u64, StoreError>;
}
