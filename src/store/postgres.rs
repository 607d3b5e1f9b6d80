use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use super::{AnswerGrade, AnswerWrite, ExamStore, NewAnswer, NewSession, Owner, StoreError};
use crate::db::models::{ExamResult, ExamSession, SessionAnswer};
use crate::db::types::SessionStatus;
use crate::repositories::{answers, results, sessions};
use crate::services::transitions::SessionEvent;

#[derive(Clone)]
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(sessions::probe(&self.pool).await?)
    }

    async fn insert_session(
        &self,
        session: NewSession,
    ) -> Result<Option<ExamSession>, StoreError> {
        Ok(sessions::insert(&self.pool, &session).await?)
    }

    async fn find_session(&self, id: &str) -> Result<Option<ExamSession>, StoreError> {
        Ok(sessions::find_by_id(&self.pool, id).await?)
    }

    async fn list_sessions_by_user(&self, user_id: i64) -> Result<Vec<ExamSession>, StoreError> {
        Ok(sessions::list_by_user(&self.pool, user_id).await?)
    }

    async fn list_sessions_by_exam(&self, exam_id: i64) -> Result<Vec<ExamSession>, StoreError> {
        Ok(sessions::list_by_exam(&self.pool, exam_id).await?)
    }

    async fn list_active_sessions_by_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<ExamSession>, StoreError> {
        Ok(sessions::list_active_by_user(&self.pool, user_id).await?)
    }

    async fn list_expired_sessions(
        &self,
        now: PrimitiveDateTime,
    ) -> Result<Vec<ExamSession>, StoreError> {
        Ok(sessions::list_expired(&self.pool, now).await?)
    }

    async fn apply_event(
        &self,
        id: &str,
        event: SessionEvent,
        now: PrimitiveDateTime,
    ) -> Result<Option<ExamSession>, StoreError> {
        let applied = sessions::apply_event(&self.pool, id, event, now).await?;
        if applied.is_none() {
            tracing::debug!(session_id = id, event = event.as_str(), "Transition not applied");
        }
        Ok(applied)
    }

    async fn update_time_remaining(
        &self,
        id: &str,
        seconds: i32,
        now: PrimitiveDateTime,
    ) -> Result<Option<ExamSession>, StoreError> {
        Ok(sessions::update_time_remaining(&self.pool, id, seconds, now).await?)
    }

    async fn upsert_answer(
        &self,
        answer: NewAnswer<'_>,
        now: PrimitiveDateTime,
    ) -> Result<AnswerWrite, StoreError> {
        let mut tx = self.pool.begin().await?;

        let Some(session) = sessions::lock_by_id(&mut *tx, answer.session_id).await? else {
            tx.rollback().await?;
            return Ok(AnswerWrite::Missing);
        };
        if session.status != SessionStatus::InProgress || session.is_past_deadline(now) {
            tx.rollback().await?;
            return Ok(AnswerWrite::Rejected(session));
        }

        let created = answers::upsert(&mut *tx, answer, now).await?;
        let session = if created {
            sessions::increment_answered(&mut *tx, answer.session_id, now).await?
        } else {
            session
        };

        tx.commit().await?;
        Ok(AnswerWrite::Recorded { session, created })
    }

    async fn list_answers(&self, session_id: &str) -> Result<Vec<SessionAnswer>, StoreError> {
        Ok(answers::list_by_session(&self.pool, session_id).await?)
    }

    async fn find_answer(
        &self,
        session_id: &str,
        question_id: i64,
    ) -> Result<Option<SessionAnswer>, StoreError> {
        Ok(answers::find(&self.pool, session_id, question_id).await?)
    }

    async fn record_answer_grades(
        &self,
        session_id: &str,
        grades: &[AnswerGrade],
        now: PrimitiveDateTime,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for grade in grades {
            answers::record_grade(&mut *tx, session_id, grade, now).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_result(&self, result: &ExamResult) -> Result<bool, StoreError> {
        Ok(results::insert(&self.pool, result).await?)
    }

    async fn find_result_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ExamResult>, StoreError> {
        Ok(results::find_by_session(&self.pool, session_id).await?)
    }

    async fn list_results_by_user(&self, user_id: i64) -> Result<Vec<ExamResult>, StoreError> {
        Ok(results::list_by_user(&self.pool, user_id).await?)
    }

    async fn list_results_by_exam(&self, exam_id: i64) -> Result<Vec<ExamResult>, StoreError> {
        Ok(results::list_by_exam(&self.pool, exam_id).await?)
    }

    async fn find_result_for_user_exam(
        &self,
        user_id: i64,
        exam_id: i64,
    ) -> Result<Option<ExamResult>, StoreError> {
        Ok(results::find_latest_for_user_exam(&self.pool, user_id, exam_id).await?)
    }

    async fn delete_results(&self, owner: Owner) -> Result<u64, StoreError> {
        Ok(match owner {
            Owner::User(user_id) => results::delete_by_user(&self.pool, user_id).await?,
            Owner::Exam(exam_id) => results::delete_by_exam(&self.pool, exam_id).await?,
        })
    }

    async fn delete_answers(&self, owner: Owner) -> Result<u64, StoreError> {
        Ok(match owner {
            Owner::User(user_id) => answers::delete_by_user(&self.pool, user_id).await?,
            Owner::Exam(exam_id) => answers::delete_by_exam(&self.pool, exam_id).await?,
        })
    }

    async fn delete_sessions(&self, owner: Owner) -> Result<u64, StoreError> {
        Ok(match owner {
            Owner::User(user_id) => sessions::delete_by_user(&self.pool, user_id).await?,
            Owner::Exam(exam_id) => sessions::delete_by_exam(&self.pool, exam_id).await?,
        })
    }
}
