use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use time::{Duration, PrimitiveDateTime};
use tokio::sync::Mutex;

use super::{AnswerGrade, AnswerWrite, ExamStore, NewAnswer, NewSession, Owner, StoreError};
use crate::db::models::{ExamResult, ExamSession, SessionAnswer};
use crate::db::types::SessionStatus;
use crate::services::transitions::{self, SessionEvent};

/// Store kept in process memory. One lock guards all tables, so every
/// operation is atomic with respect to every other.
#[derive(Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    sessions: HashMap<String, ExamSession>,
    answers: BTreeMap<(String, i64), SessionAnswer>,
    results: HashMap<String, ExamResult>,
    #[cfg(test)]
    faults: Faults,
}

#[cfg(test)]
#[derive(Default)]
struct Faults {
    sessions: std::collections::HashSet<String>,
    deletes: std::collections::HashSet<&'static str>,
    results: bool,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes every transition of `id` fail as if the backend were down.
    #[cfg(test)]
    pub(crate) async fn poison_session(&self, id: &str) {
        self.tables.lock().await.faults.sessions.insert(id.to_string());
    }

    /// Makes result inserts fail until `heal_results` is called.
    #[cfg(test)]
    pub(crate) async fn poison_results(&self) {
        self.tables.lock().await.faults.results = true;
    }

    #[cfg(test)]
    pub(crate) async fn heal_results(&self) {
        self.tables.lock().await.faults.results = false;
    }

    /// Makes bulk deletes of `table` ("results", "answers", "sessions") fail.
    #[cfg(test)]
    pub(crate) async fn fail_deletes_on(&self, table: &'static str) {
        self.tables.lock().await.faults.deletes.insert(table);
    }
}

impl Tables {
    #[cfg(test)]
    fn check_session(&self, id: &str) -> Result<(), StoreError> {
        if self.faults.sessions.contains(id) {
            return Err(StoreError::Unavailable(format!("session {id} is unreachable")));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_session(&self, _id: &str) -> Result<(), StoreError> {
        Ok(())
    }

    #[cfg(test)]
    fn check_delete(&self, table: &'static str) -> Result<(), StoreError> {
        if self.faults.deletes.contains(table) {
            return Err(StoreError::Unavailable(format!("{table} table is unreachable")));
        }
        Ok(())
    }

    #[cfg(test)]
    fn check_results(&self) -> Result<(), StoreError> {
        if self.faults.results {
            return Err(StoreError::Unavailable("results table is unreachable".into()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_results(&self) -> Result<(), StoreError> {
        Ok(())
    }

    #[cfg(not(test))]
    fn check_delete(&self, _table: &'static str) -> Result<(), StoreError> {
        Ok(())
    }

    fn owned_session_ids(&self, owner: Owner) -> Vec<String> {
        self.sessions
            .values()
            .filter(|session| owns(owner, session.user_id, session.exam_id))
            .map(|session| session.id.clone())
            .collect()
    }
}

fn owns(owner: Owner, user_id: i64, exam_id: i64) -> bool {
    match owner {
        Owner::User(id) => id == user_id,
        Owner::Exam(id) => id == exam_id,
    }
}

fn newest_first(mut sessions: Vec<ExamSession>) -> Vec<ExamSession> {
    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    sessions
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_session(
        &self,
        session: NewSession,
    ) -> Result<Option<ExamSession>, StoreError> {
        let mut tables = self.tables.lock().await;
        let live_exists = tables.sessions.values().any(|existing| {
            existing.user_id == session.user_id
                && existing.exam_id == session.exam_id
                && !existing.status.is_terminal()
        });
        if live_exists || tables.sessions.contains_key(&session.id) {
            return Ok(None);
        }

        let row = ExamSession {
            id: session.id.clone(),
            exam_id: session.exam_id,
            user_id: session.user_id,
            status: SessionStatus::NotStarted,
            start_time: None,
            end_time: None,
            submitted_time: None,
            time_remaining_seconds: session.time_remaining_seconds,
            total_questions: session.total_questions,
            answered_questions: 0,
            created_at: session.created_at,
            updated_at: session.created_at,
        };
        tables.sessions.insert(session.id, row.clone());
        Ok(Some(row))
    }

    async fn find_session(&self, id: &str) -> Result<Option<ExamSession>, StoreError> {
        Ok(self.tables.lock().await.sessions.get(id).cloned())
    }

    async fn list_sessions_by_user(&self, user_id: i64) -> Result<Vec<ExamSession>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(newest_first(
            tables.sessions.values().filter(|s| s.user_id == user_id).cloned().collect(),
        ))
    }

    async fn list_sessions_by_exam(&self, exam_id: i64) -> Result<Vec<ExamSession>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(newest_first(
            tables.sessions.values().filter(|s| s.exam_id == exam_id).cloned().collect(),
        ))
    }

    async fn list_active_sessions_by_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<ExamSession>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(newest_first(
            tables
                .sessions
                .values()
                .filter(|s| s.user_id == user_id && s.status == SessionStatus::InProgress)
                .cloned()
                .collect(),
        ))
    }

    async fn list_expired_sessions(
        &self,
        now: PrimitiveDateTime,
    ) -> Result<Vec<ExamSession>, StoreError> {
        let tables = self.tables.lock().await;
        let mut expired: Vec<ExamSession> =
            tables.sessions.values().filter(|s| s.is_past_deadline(now)).cloned().collect();
        expired.sort_by(|a, b| a.end_time.cmp(&b.end_time).then_with(|| a.id.cmp(&b.id)));
        Ok(expired)
    }

    async fn apply_event(
        &self,
        id: &str,
        event: SessionEvent,
        now: PrimitiveDateTime,
    ) -> Result<Option<ExamSession>, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.check_session(id)?;
        let Some(session) = tables.sessions.get_mut(id) else {
            return Ok(None);
        };
        let Some(next) = transitions::next_status(session.status, event) else {
            return Ok(None);
        };
        if event == SessionEvent::Expire && !session.is_past_deadline(now) {
            return Ok(None);
        }

        match event {
            SessionEvent::Start => {
                session.start_time = Some(now);
                session.end_time =
                    Some(now + Duration::seconds(i64::from(session.time_remaining_seconds)));
            }
            SessionEvent::Submit => session.submitted_time = Some(now),
            SessionEvent::Expire | SessionEvent::Cancel => {}
        }
        session.status = next;
        session.updated_at = now;
        Ok(Some(session.clone()))
    }

    async fn update_time_remaining(
        &self,
        id: &str,
        seconds: i32,
        now: PrimitiveDateTime,
    ) -> Result<Option<ExamSession>, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.sessions.get_mut(id) {
            Some(session) if !session.status.is_terminal() => {
                session.time_remaining_seconds = seconds;
                session.updated_at = now;
                Ok(Some(session.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn upsert_answer(
        &self,
        answer: NewAnswer<'_>,
        now: PrimitiveDateTime,
    ) -> Result<AnswerWrite, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(session) = tables.sessions.get(answer.session_id) else {
            return Ok(AnswerWrite::Missing);
        };
        if session.status != SessionStatus::InProgress || session.is_past_deadline(now) {
            return Ok(AnswerWrite::Rejected(session.clone()));
        }

        let key = (answer.session_id.to_string(), answer.question_id);
        let created = match tables.answers.entry(key) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.answer_text = answer.answer_text.to_string();
                existing.time_taken_seconds =
                    answer.time_taken_seconds.or(existing.time_taken_seconds);
                existing.answered_at = now;
                existing.updated_at = now;
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(SessionAnswer {
                    session_id: answer.session_id.to_string(),
                    question_id: answer.question_id,
                    answer_text: answer.answer_text.to_string(),
                    is_correct: None,
                    marks_obtained: None,
                    time_taken_seconds: answer.time_taken_seconds,
                    answered_at: now,
                    created_at: now,
                    updated_at: now,
                });
                true
            }
        };

        let Some(session) = tables.sessions.get_mut(answer.session_id) else {
            return Ok(AnswerWrite::Missing);
        };
        if created {
            session.answered_questions += 1;
            session.updated_at = now;
        }
        Ok(AnswerWrite::Recorded { session: session.clone(), created })
    }

    async fn list_answers(&self, session_id: &str) -> Result<Vec<SessionAnswer>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .answers
            .values()
            .filter(|answer| answer.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn find_answer(
        &self,
        session_id: &str,
        question_id: i64,
    ) -> Result<Option<SessionAnswer>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.answers.get(&(session_id.to_string(), question_id)).cloned())
    }

    async fn record_answer_grades(
        &self,
        session_id: &str,
        grades: &[AnswerGrade],
        now: PrimitiveDateTime,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        for grade in grades {
            if let Some(answer) = tables.answers.get_mut(&(session_id.to_string(), grade.question_id))
            {
                answer.is_correct = Some(grade.is_correct);
                answer.marks_obtained = Some(grade.marks_obtained);
                answer.updated_at = now;
            }
        }
        Ok(())
    }

    async fn insert_result(&self, result: &ExamResult) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.check_results()?;
        if tables.results.contains_key(&result.session_id) {
            return Ok(false);
        }
        tables.results.insert(result.session_id.clone(), result.clone());
        Ok(true)
    }

    async fn find_result_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ExamResult>, StoreError> {
        Ok(self.tables.lock().await.results.get(session_id).cloned())
    }

    async fn list_results_by_user(&self, user_id: i64) -> Result<Vec<ExamResult>, StoreError> {
        let tables = self.tables.lock().await;
        let mut results: Vec<ExamResult> =
            tables.results.values().filter(|r| r.user_id == user_id).cloned().collect();
        results.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(results)
    }

    async fn list_results_by_exam(&self, exam_id: i64) -> Result<Vec<ExamResult>, StoreError> {
        let tables = self.tables.lock().await;
        let mut results: Vec<ExamResult> =
            tables.results.values().filter(|r| r.exam_id == exam_id).cloned().collect();
        results.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
        Ok(results)
    }

    async fn find_result_for_user_exam(
        &self,
        user_id: i64,
        exam_id: i64,
    ) -> Result<Option<ExamResult>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .results
            .values()
            .filter(|r| r.user_id == user_id && r.exam_id == exam_id)
            .max_by_key(|r| r.submitted_at)
            .cloned())
    }

    async fn delete_results(&self, owner: Owner) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.check_delete("results")?;
        let before = tables.results.len();
        tables.results.retain(|_, result| !owns(owner, result.user_id, result.exam_id));
        Ok((before - tables.results.len()) as u64)
    }

    async fn delete_answers(&self, owner: Owner) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.check_delete("answers")?;
        let owned = tables.owned_session_ids(owner);
        let before = tables.answers.len();
        tables.answers.retain(|(session_id, _), _| !owned.contains(session_id));
        Ok((before - tables.answers.len()) as u64)
    }

    async fn delete_sessions(&self, owner: Owner) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.check_delete("sessions")?;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, session| !owns(owner, session.user_id, session.exam_id));
        Ok((before - tables.sessions.len()) as u64)
    }
}
