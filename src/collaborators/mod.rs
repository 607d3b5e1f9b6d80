//! Services this one consults but does not own: exam metadata, the question
//! bank (correct answers and marks) and notifications.

mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::core::config::Settings;

pub(crate) use http::{HttpExamCatalog, HttpNotificationGateway, HttpQuestionBank};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamMetadata {
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) total_marks: Option<i32>,
    pub(crate) passing_marks: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionKey {
    pub(crate) id: i64,
    pub(crate) correct_answer: Option<String>,
    pub(crate) marks: Option<i32>,
}

#[derive(Debug, Error)]
pub(crate) enum CollaboratorError {
    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },
    #[error("{service} request failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} responded with status {status}")]
    Status { service: &'static str, status: u16 },
    #[error("{service} did not answer within {timeout:?}")]
    Timeout { service: &'static str, timeout: Duration },
}

#[async_trait]
pub(crate) trait ExamCatalog: Send + Sync {
    async fn exam(&self, exam_id: i64) -> Result<ExamMetadata, CollaboratorError>;
}

#[async_trait]
pub(crate) trait QuestionBank: Send + Sync {
    async fn question(&self, question_id: i64) -> Result<QuestionKey, CollaboratorError>;
    async fn questions_for_exam(&self, exam_id: i64)
        -> Result<Vec<QuestionKey>, CollaboratorError>;
}

#[async_trait]
pub(crate) trait NotificationGateway: Send + Sync {
    async fn delete_for_user(&self, user_id: i64) -> Result<(), CollaboratorError>;
}

#[derive(Clone)]
pub(crate) struct Collaborators {
    pub(crate) exams: Arc<dyn ExamCatalog>,
    pub(crate) questions: Arc<dyn QuestionBank>,
    pub(crate) notifications: Arc<dyn NotificationGateway>,
    /// Upper bound applied to every collaborator call made while grading.
    pub(crate) timeout: Duration,
}

impl Collaborators {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let config = settings.collaborators();
        let client = http::build_client(config.timeout())?;

        Ok(Self {
            exams: Arc::new(HttpExamCatalog::new(client.clone(), &config.exam_service_url)),
            questions: Arc::new(HttpQuestionBank::new(client.clone(), &config.question_service_url)),
            notifications: Arc::new(HttpNotificationGateway::new(
                client,
                &config.notification_service_url,
            )),
            timeout: config.timeout(),
        })
    }

    /// Runs a collaborator call under the configured timeout.
    pub(crate) async fn bounded<T, F>(
        &self,
        service: &'static str,
        call: F,
    ) -> Result<T, CollaboratorError>
    where
        F: std::future::Future<Output = Result<T, CollaboratorError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CollaboratorError::Timeout { service, timeout: self.timeout }),
        }
    }
}
