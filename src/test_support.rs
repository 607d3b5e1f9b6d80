use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
};
use time::{Date, Month, PrimitiveDateTime, Time};

use crate::collaborators::{
    CollaboratorError, Collaborators, ExamCatalog, ExamMetadata, NotificationGateway, QuestionBank,
    QuestionKey,
};
use crate::core::{config::Settings, state::AppState};
use crate::db::models::{ExamSession, SessionAnswer};
use crate::db::types::SessionStatus;
use crate::store::MemoryStore;

pub(crate) struct TestHarness {
    pub(crate) state: AppState,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) exams: Arc<FakeExams>,
    pub(crate) questions: Arc<FakeQuestions>,
    pub(crate) notifications: Arc<FakeNotifications>,
}

pub(crate) fn harness() -> TestHarness {
    harness_with(&[])
}

/// In-memory state with fake collaborators. `overrides` are extra
/// environment-style settings.
pub(crate) fn harness_with(overrides: &[(&str, &str)]) -> TestHarness {
    let mut values: HashMap<String, String> = [
        ("EXAM_SESSIONS_ENV", "test"),
        ("STORE_BACKEND", "memory"),
        ("COLLABORATOR_TIMEOUT_MS", "200"),
    ]
    .iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect();
    for (key, value) in overrides {
        values.insert(key.to_string(), value.to_string());
    }
    let settings = Settings::from_lookup(|key| values.get(key).cloned()).expect("settings");

    let store = Arc::new(MemoryStore::new());
    let exams = Arc::new(FakeExams::default());
    let questions = Arc::new(FakeQuestions::default());
    let notifications = Arc::new(FakeNotifications::default());
    let collaborators = Collaborators {
        exams: exams.clone(),
        questions: questions.clone(),
        notifications: notifications.clone(),
        timeout: settings.collaborators().timeout(),
    };

    let state = AppState::new(settings, store.clone(), collaborators);
    TestHarness { state, store, exams, questions, notifications }
}

#[derive(Default)]
pub(crate) struct FakeExams {
    exams: Mutex<HashMap<i64, ExamMetadata>>,
    failing: AtomicBool,
}

impl FakeExams {
    pub(crate) fn insert(
        &self,
        exam_id: i64,
        duration_minutes: Option<i32>,
        total_marks: Option<i32>,
        passing_marks: Option<i32>,
    ) {
        self.exams
            .lock()
            .unwrap()
            .insert(exam_id, ExamMetadata { duration_minutes, total_marks, passing_marks });
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExamCatalog for FakeExams {
    async fn exam(&self, exam_id: i64) -> Result<ExamMetadata, CollaboratorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Status { service: "exam service", status: 503 });
        }
        self.exams
            .lock()
            .unwrap()
            .get(&exam_id)
            .cloned()
            .ok_or(CollaboratorError::Status { service: "exam service", status: 404 })
    }
}

#[derive(Default)]
pub(crate) struct FakeQuestions {
    questions: Mutex<HashMap<i64, (i64, QuestionKey)>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl FakeQuestions {
    pub(crate) fn insert(&self, exam_id: i64, key: QuestionKey) {
        self.questions.lock().unwrap().insert(key.id, (exam_id, key));
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    async fn pause(&self) -> Result<(), CollaboratorError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Status { service: "question service", status: 503 });
        }
        Ok(())
    }
}

#[async_trait]
impl QuestionBank for FakeQuestions {
    async fn question(&self, question_id: i64) -> Result<QuestionKey, CollaboratorError> {
        self.pause().await?;
        self.questions
            .lock()
            .unwrap()
            .get(&question_id)
            .map(|(_, key)| key.clone())
            .ok_or(CollaboratorError::Status { service: "question service", status: 404 })
    }

    async fn questions_for_exam(
        &self,
        exam_id: i64,
    ) -> Result<Vec<QuestionKey>, CollaboratorError> {
        self.pause().await?;
        let mut keys: Vec<QuestionKey> = self
            .questions
            .lock()
            .unwrap()
            .values()
            .filter(|(owner, _)| *owner == exam_id)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort_by_key(|key| key.id);
        Ok(keys)
    }
}

#[derive(Default)]
pub(crate) struct FakeNotifications {
    deleted: Mutex<Vec<i64>>,
    failing: AtomicBool,
}

impl FakeNotifications {
    pub(crate) fn deleted_users(&self) -> Vec<i64> {
        self.deleted.lock().unwrap().clone()
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationGateway for FakeNotifications {
    async fn delete_for_user(&self, user_id: i64) -> Result<(), CollaboratorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Status { service: "notification service", status: 500 });
        }
        self.deleted.lock().unwrap().push(user_id);
        Ok(())
    }
}

pub(crate) fn datetime(
    year: i32,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
) -> PrimitiveDateTime {
    let month = Month::try_from(month).expect("month");
    PrimitiveDateTime::new(
        Date::from_calendar_date(year, month, day).expect("date"),
        Time::from_hms(hour, minute, second).expect("time"),
    )
}

pub(crate) fn key(id: i64, correct_answer: &str, marks: i32) -> QuestionKey {
    QuestionKey { id, correct_answer: Some(correct_answer.to_string()), marks: Some(marks) }
}

pub(crate) fn answer(session_id: &str, question_id: i64, text: &str) -> SessionAnswer {
    let at = datetime(2025, 3, 1, 9, 0, 0);
    SessionAnswer {
        session_id: session_id.to_string(),
        question_id,
        answer_text: text.to_string(),
        is_correct: None,
        marks_obtained: None,
        time_taken_seconds: None,
        answered_at: at,
        created_at: at,
        updated_at: at,
    }
}

pub(crate) fn in_progress_session(
    id: &str,
    start: PrimitiveDateTime,
    seconds: i32,
) -> ExamSession {
    ExamSession {
        id: id.to_string(),
        exam_id: 7,
        user_id: 3,
        status: SessionStatus::InProgress,
        start_time: Some(start),
        end_time: Some(start + time::Duration::seconds(i64::from(seconds))),
        submitted_time: None,
        time_remaining_seconds: seconds,
        total_questions: 2,
        answered_questions: 0,
        created_at: start,
        updated_at: start,
    }
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
