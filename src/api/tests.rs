use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::api::router::router;
use crate::test_support::{harness, json_request, key, read_json, TestHarness};

async fn send(
    h: &TestHarness,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let response = router(h.state.clone())
        .oneshot(json_request(method, uri, body))
        .await
        .expect("response");
    let status = response.status();
    (status, read_json(response).await)
}

async fn created_session(h: &TestHarness, body: serde_json::Value) -> String {
    let (status, json) = send(h, Method::POST, "/api/sessions/create", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["id"].as_str().expect("session id").to_string()
}

#[tokio::test]
async fn full_exam_flow_over_http() {
    let h = harness();
    h.exams.insert(7, Some(30), None, Some(1));
    h.questions.insert(7, key(1, "B", 1));
    h.questions.insert(7, key(2, "C", 1));

    let id = created_session(
        &h,
        json!({"examId": 7, "userId": 3, "durationMinutes": 30, "totalQuestions": 2}),
    )
    .await;

    let (status, json) = send(&h, Method::POST, &format!("/api/sessions/{id}/start"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "IN_PROGRESS");
    assert!(json["end_time"].is_string());

    for (question_id, text) in [(1, "B"), (2, "A")] {
        let (status, json) = send(
            &h,
            Method::POST,
            &format!("/api/sessions/{id}/answer"),
            Some(json!({"questionId": question_id, "answerText": text})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{json}");
    }

    let (_, json) = send(&h, Method::GET, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(json["answered_questions"], 2);

    let (status, json) = send(&h, Method::POST, &format!("/api/sessions/{id}/submit"), None).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["correct_answers"], 1);
    assert_eq!(json["wrong_answers"], 1);
    assert_eq!(json["percentage"], 50.0);
    assert_eq!(json["grade"], "C+");
    assert_eq!(json["passing_status"], "PASS");

    let (status, json) = send(&h, Method::GET, &format!("/api/sessions/{id}/answers"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().map(Vec::len), Some(2));
    assert_eq!(json[0]["is_correct"], true);

    let (status, json) = send(&h, Method::GET, &format!("/api/sessions/{id}/answers/2"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["answer_text"], "A");
    assert_eq!(json["marks_obtained"], 0);

    let (status, json) = send(&h, Method::GET, "/api/results/check/3/7", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["completed"], true);

    let (status, json) = send(&h, Method::GET, "/api/results/user/3/exam/7", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["session_id"], id.as_str());

    let (status, json) = send(&h, Method::POST, &format!("/api/sessions/{id}/submit"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["status"], 409);
}

#[tokio::test]
async fn duplicate_live_session_is_conflict() {
    let h = harness();
    let body = json!({"exam_id": 7, "user_id": 3, "duration_minutes": 30, "total_questions": 2});
    created_session(&h, body.clone()).await;

    let (status, json) = send(&h, Method::POST, "/api/sessions/create", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["detail"].as_str().unwrap().contains("already has an active session"));
}

#[tokio::test]
async fn invalid_create_payload_is_bad_request() {
    let h = harness();
    let (status, json) = send(
        &h,
        Method::POST,
        "/api/sessions/create",
        Some(json!({"exam_id": 7, "user_id": 3, "duration_minutes": -5})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn unknown_session_is_404() {
    let h = harness();
    let (status, json) = send(&h, Method::POST, "/api/sessions/nope/start", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["detail"], "session nope not found");
}

#[tokio::test]
async fn answering_a_finished_session_is_conflict() {
    let h = harness();
    let id = created_session(&h, json!({"exam_id": 7, "user_id": 3, "duration_minutes": 30})).await;
    send(&h, Method::POST, &format!("/api/sessions/{id}/cancel"), None).await;

    let (status, json) = send(
        &h,
        Method::POST,
        &format!("/api/sessions/{id}/answer"),
        Some(json!({"question_id": 1, "answer_text": "A"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["detail"].as_str().unwrap().contains("CANCELLED"));
}

#[tokio::test]
async fn time_update_and_listings() {
    let h = harness();
    let id = created_session(&h, json!({"exam_id": 7, "user_id": 3, "duration_minutes": 30})).await;
    created_session(&h, json!({"exam_id": 8, "user_id": 3, "duration_minutes": 30})).await;
    send(&h, Method::POST, &format!("/api/sessions/{id}/start"), None).await;

    let (status, json) = send(
        &h,
        Method::PUT,
        &format!("/api/sessions/{id}/time"),
        Some(json!({"timeRemaining": 120})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["time_remaining_seconds"], 120);

    let (_, json) = send(&h, Method::GET, "/api/sessions/user/3", None).await;
    assert_eq!(json.as_array().map(Vec::len), Some(2));
    let (_, json) = send(&h, Method::GET, "/api/sessions/user/3/active", None).await;
    assert_eq!(json.as_array().map(Vec::len), Some(1));
    let (_, json) = send(&h, Method::GET, "/api/sessions/exam/8", None).await;
    assert_eq!(json.as_array().map(Vec::len), Some(1));
    let (_, json) = send(&h, Method::GET, "/api/sessions/expired", None).await;
    assert_eq!(json.as_array().map(Vec::len), Some(0));

    let (status, json) = send(&h, Method::POST, "/api/sessions/sweep", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["expired"], 0);
}

#[tokio::test]
async fn user_delete_reports_each_step() {
    let h = harness();
    created_session(&h, json!({"exam_id": 7, "user_id": 3, "duration_minutes": 30})).await;
    h.notifications.set_failing(true);

    let (status, json) = send(&h, Method::DELETE, "/api/sessions/user/3", None).await;
    assert_eq!(status, StatusCode::OK);
    let steps = json["steps"].as_array().expect("steps");
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[2]["step"], "sessions");
    assert_eq!(steps[2]["rows"], 1);
    assert_eq!(steps[3]["outcome"], "failed");

    let (_, json) = send(&h, Method::GET, "/api/sessions/user/3", None).await;
    assert_eq!(json.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn missing_result_is_404() {
    let h = harness();
    let (status, _) = send(&h, Method::GET, "/api/results/session/none", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(&h, Method::GET, "/api/results/user/3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));
}

#[tokio::test]
async fn collaborator_outage_still_grades_the_submission() {
    let h = harness();
    h.exams.set_failing(true);
    h.questions.set_failing(true);
    let id = created_session(&h, json!({"exam_id": 7, "user_id": 3, "duration_minutes": 30})).await;
    send(&h, Method::POST, &format!("/api/sessions/{id}/start"), None).await;
    send(
        &h,
        Method::POST,
        &format!("/api/sessions/{id}/answer"),
        Some(json!({"question_id": 1, "answer_text": "B"})),
    )
    .await;

    let (status, json) = send(&h, Method::POST, &format!("/api/sessions/{id}/submit"), None).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["correct_answers"], 0);
    assert_eq!(json["wrong_answers"], 1);
    assert_eq!(json["total_marks"], 0);
    assert_eq!(json["grade"], "F");
}
