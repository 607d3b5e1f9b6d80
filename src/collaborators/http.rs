use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;

use super::{
    CollaboratorError, ExamCatalog, ExamMetadata, NotificationGateway, QuestionBank, QuestionKey,
};

pub(super) fn build_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .context("Failed to build collaborator HTTP client")
}

#[derive(Clone)]
struct Endpoint {
    client: Client,
    base_url: String,
    service: &'static str,
}

impl Endpoint {
    fn new(client: Client, base_url: &str, service: &'static str) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_string(), service }
    }

    fn url(&self, path: &str) -> Result<String, CollaboratorError> {
        if self.base_url.is_empty() {
            return Err(CollaboratorError::NotConfigured { service: self.service });
        }
        Ok(format!("{}{path}", self.base_url))
    }

    async fn send(&self, method: Method, path: &str) -> Result<reqwest::Response, CollaboratorError> {
        let url = self.url(path)?;
        let response = self
            .client
            .request(method, &url)
            .send()
            .await
            .map_err(|source| CollaboratorError::Request { service: self.service, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Status { service: self.service, status: status.as_u16() });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CollaboratorError> {
        self.send(Method::GET, path)
            .await?
            .json::<T>()
            .await
            .map_err(|source| CollaboratorError::Request { service: self.service, source })
    }
}

pub(crate) struct HttpExamCatalog {
    endpoint: Endpoint,
}

impl HttpExamCatalog {
    pub(crate) fn new(client: Client, base_url: &str) -> Self {
        Self { endpoint: Endpoint::new(client, base_url, "exam service") }
    }
}

#[async_trait]
impl ExamCatalog for HttpExamCatalog {
    async fn exam(&self, exam_id: i64) -> Result<ExamMetadata, CollaboratorError> {
        self.endpoint.get_json(&format!("/api/exams/{exam_id}")).await
    }
}

pub(crate) struct HttpQuestionBank {
    endpoint: Endpoint,
}

impl HttpQuestionBank {
    pub(crate) fn new(client: Client, base_url: &str) -> Self {
        Self { endpoint: Endpoint::new(client, base_url, "question service") }
    }
}

#[async_trait]
impl QuestionBank for HttpQuestionBank {
    async fn question(&self, question_id: i64) -> Result<QuestionKey, CollaboratorError> {
        self.endpoint.get_json(&format!("/api/questions/{question_id}")).await
    }

    async fn questions_for_exam(
        &self,
        exam_id: i64,
    ) -> Result<Vec<QuestionKey>, CollaboratorError> {
        self.endpoint.get_json(&format!("/api/questions/exam/{exam_id}")).await
    }
}

pub(crate) struct HttpNotificationGateway {
    endpoint: Endpoint,
}

impl HttpNotificationGateway {
    pub(crate) fn new(client: Client, base_url: &str) -> Self {
        Self { endpoint: Endpoint::new(client, base_url, "notification service") }
    }
}

#[async_trait]
impl NotificationGateway for HttpNotificationGateway {
    async fn delete_for_user(&self, user_id: i64) -> Result<(), CollaboratorError> {
        match self.endpoint.send(Method::DELETE, &format!("/api/notifications/user/{user_id}")).await {
            Ok(_) => Ok(()),
            // Nothing stored for the user is not a failure of the cascade.
            Err(CollaboratorError::Status { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
