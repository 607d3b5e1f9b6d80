//! Best-effort removal of everything a user or an exam owns. Each step runs
//! regardless of the others and records its own outcome; nothing is rolled
//! back.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::core::state::AppState;
use crate::store::{Owner, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum CascadeStep {
    Results,
    Answers,
    Sessions,
    Notifications,
}

impl CascadeStep {
    fn as_str(self) -> &'static str {
        match self {
            CascadeStep::Results => "results",
            CascadeStep::Answers => "answers",
            CascadeStep::Sessions => "sessions",
            CascadeStep::Notifications => "notifications",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub(crate) enum StepOutcome {
    Deleted { rows: u64 },
    /// Done remotely; the collaborator reports no count.
    Completed,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StepReport {
    pub(crate) step: CascadeStep,
    #[serde(flatten)]
    pub(crate) outcome: StepOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CascadeReport {
    pub(crate) steps: Vec<StepReport>,
}

impl CascadeReport {
    #[cfg(test)]
    pub(crate) fn outcome(&self, step: CascadeStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|report| report.step == step).map(|report| &report.outcome)
    }

    pub(crate) fn failed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|report| matches!(report.outcome, StepOutcome::Failed { .. }))
            .count()
    }
}

type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<u64>, String>> + Send + 'a>>;

fn store_step<'a>(
    delete: impl Future<Output = Result<u64, StoreError>> + Send + 'a,
) -> StepFuture<'a> {
    Box::pin(async move { delete.await.map(Some).map_err(|err| err.to_string()) })
}

async fn run_steps(owner: Owner, steps: Vec<(CascadeStep, StepFuture<'_>)>) -> CascadeReport {
    let mut report = CascadeReport { steps: Vec::with_capacity(steps.len()) };

    for (step, future) in steps {
        let outcome = match future.await {
            Ok(Some(rows)) => StepOutcome::Deleted { rows },
            Ok(None) => StepOutcome::Completed,
            Err(error) => {
                tracing::warn!(?owner, step = step.as_str(), error = %error, "Cascade step failed");
                metrics::counter!("cascade_step_failures_total", "step" => step.as_str())
                    .increment(1);
                StepOutcome::Failed { error }
            }
        };
        report.steps.push(StepReport { step, outcome });
    }

    tracing::info!(?owner, failed = report.failed_steps(), "Cascade delete finished");
    report
}

pub(crate) async fn delete_user_data(state: &AppState, user_id: i64) -> CascadeReport {
    let store = state.store();
    let collaborators = state.collaborators();
    let owner = Owner::User(user_id);

    let notifications: StepFuture<'_> = Box::pin(async move {
        collaborators
            .bounded("notification service", collaborators.notifications.delete_for_user(user_id))
            .await
            .map(|()| None)
            .map_err(|err| err.to_string())
    });

    run_steps(
        owner,
        vec![
            (CascadeStep::Results, store_step(store.delete_results(owner))),
            (CascadeStep::Answers, store_step(store.delete_answers(owner))),
            (CascadeStep::Sessions, store_step(store.delete_sessions(owner))),
            (CascadeStep::Notifications, notifications),
        ],
    )
    .await
}

pub(crate) async fn delete_exam_data(state: &AppState, exam_id: i64) -> CascadeReport {
    let store = state.store();
    let owner = Owner::Exam(exam_id);

    run_steps(
        owner,
        vec![
            (CascadeStep::Results, store_step(store.delete_results(owner))),
            (CascadeStep::Answers, store_step(store.delete_answers(owner))),
            (CascadeStep::Sessions, store_step(store.delete_sessions(owner))),
        ],
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::answers::{submit_answer, AnswerSubmission};
    use crate::services::lifecycle::{self, create, start, submit, CreateSession};
    use crate::test_support::{datetime, harness, TestHarness};

    async fn graded_session(h: &TestHarness, exam_id: i64, user_id: i64) -> String {
        let now = datetime(2025, 3, 1, 9, 0, 0);
        let session = create(
            &h.state,
            CreateSession { exam_id, user_id, duration_minutes: Some(30), total_questions: 1 },
            now,
        )
        .await
        .unwrap();
        start(&h.state, &session.id, now).await.unwrap();
        submit_answer(
            &h.state,
            AnswerSubmission {
                session_id: session.id.clone(),
                question_id: 1,
                answer_text: "A".into(),
                time_taken_seconds: None,
            },
            now,
        )
        .await
        .unwrap();
        submit(&h.state, &session.id, now).await.unwrap();
        session.id
    }

    #[tokio::test]
    async fn user_cascade_removes_everything_the_user_owns() {
        let h = harness();
        let mine = graded_session(&h, 7, 3).await;
        let other = graded_session(&h, 7, 4).await;

        let report = delete_user_data(&h.state, 3).await;

        assert_eq!(report.failed_steps(), 0);
        assert_eq!(report.outcome(CascadeStep::Results), Some(&StepOutcome::Deleted { rows: 1 }));
        assert_eq!(report.outcome(CascadeStep::Answers), Some(&StepOutcome::Deleted { rows: 1 }));
        assert_eq!(report.outcome(CascadeStep::Sessions), Some(&StepOutcome::Deleted { rows: 1 }));
        assert_eq!(report.outcome(CascadeStep::Notifications), Some(&StepOutcome::Completed));
        assert_eq!(h.notifications.deleted_users(), vec![3]);

        assert!(lifecycle::get(&h.state, &mine).await.is_err());
        assert!(lifecycle::get(&h.state, &other).await.is_ok());
    }

    #[tokio::test]
    async fn failing_steps_do_not_stop_later_ones() {
        let h = harness();
        let session_id = graded_session(&h, 7, 3).await;
        h.store.fail_deletes_on("answers").await;
        h.notifications.set_failing(true);

        let report = delete_user_data(&h.state, 3).await;

        assert_eq!(report.steps.len(), 4);
        assert_eq!(report.failed_steps(), 2);
        assert!(matches!(report.outcome(CascadeStep::Answers), Some(StepOutcome::Failed { .. })));
        assert!(matches!(
            report.outcome(CascadeStep::Notifications),
            Some(StepOutcome::Failed { .. })
        ));
        assert_eq!(report.outcome(CascadeStep::Sessions), Some(&StepOutcome::Deleted { rows: 1 }));
        assert!(lifecycle::get(&h.state, &session_id).await.is_err());
    }

    #[tokio::test]
    async fn exam_cascade_skips_notifications() {
        let h = harness();
        graded_session(&h, 7, 3).await;
        graded_session(&h, 7, 4).await;
        graded_session(&h, 8, 3).await;

        let report = delete_exam_data(&h.state, 7).await;

        assert_eq!(report.steps.len(), 3);
        assert_eq!(report.outcome(CascadeStep::Sessions), Some(&StepOutcome::Deleted { rows: 2 }));
        assert_eq!(report.outcome(CascadeStep::Notifications), None);
        assert!(h.notifications.deleted_users().is_empty());
        assert_eq!(lifecycle::list_by_user(&h.state, 3).await.unwrap().len(), 1);
    }

    #[test]
    fn report_serializes_step_outcomes_flat() {
        let report = CascadeReport {
            steps: vec![
                StepReport { step: CascadeStep::Results, outcome: StepOutcome::Deleted { rows: 2 } },
                StepReport {
                    step: CascadeStep::Notifications,
                    outcome: StepOutcome::Failed { error: "down".into() },
                },
            ],
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"steps": [
                {"step": "results", "outcome": "deleted", "rows": 2},
                {"step": "notifications", "outcome": "failed", "error": "down"}
            ]})
        );
    }
}
