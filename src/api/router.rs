use axum::{
    extract::MatchedPath,
    http::{HeaderName, Request, Response},
    routing::get,
    Router,
};
use std::time::Duration;
use tower_http::{
    normalize_path::NormalizePathLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::api::handlers;
use crate::api::results;
use crate::api::sessions;
use crate::core::state::AppState;

const REQUEST_ID: &str = "x-request-id";

fn request_span<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or("unmatched");
    tracing::info_span!(
        "request",
        method = %request.method(),
        route,
        uri = %request.uri(),
        request_id = %request_id
    )
}

fn record_response<B>(response: &Response<B>, latency: Duration, _span: &Span) {
    let status_label = response.status().as_u16().to_string();
    metrics::counter!("http_requests_total", "status" => status_label.clone()).increment(1);
    metrics::histogram!("http_request_duration_seconds", "status" => status_label)
        .record(latency.as_secs_f64());
}

pub(crate) fn router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/sessions", sessions::router())
        .nest("/results", results::router());

    let mut router: Router<AppState> = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz).head(handlers::healthz))
        .nest("/api", api);

    if state.settings().telemetry().prometheus_enabled {
        router = router.route("/metrics", get(handlers::metrics));
    }

    let request_id_header = HeaderName::from_static(REQUEST_ID);
    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span::<axum::body::Body>)
                .on_response(record_response::<axum::body::Body>),
        )
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    use super::router;
    use crate::core::metrics;
    use crate::test_support::{harness_with, read_json};

    #[tokio::test]
    async fn root_returns_message() {
        let h = harness_with(&[]);
        let app = router(h.state.clone());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let json = read_json(response).await;
        assert_eq!(json["message"], "Exam Sessions API");
        assert_eq!(json["environment"], "test");
    }

    #[tokio::test]
    async fn healthz_reports_store_and_collaborators() {
        let h = harness_with(&[("EXAM_SERVICE_URL", "http://exams:8081")]);
        let app = router(h.state.clone());

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["components"]["store"], "healthy");
        assert_eq!(json["components"]["exam_service"], "configured");
        assert_eq!(json["components"]["notification_service"], "not configured");
    }

    #[tokio::test]
    async fn metrics_disabled_returns_404() {
        let h = harness_with(&[]);
        let app = router(h.state.clone());

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_enabled_returns_200() {
        let h = harness_with(&[("PROMETHEUS_ENABLED", "1")]);
        metrics::init(h.state.settings()).expect("metrics init");
        let app = router(h.state.clone());

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }
}
