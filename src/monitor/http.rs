//! Read-only monitor endpoint.
//!
//! Exposes the run log and a small usage document over HTTP so operators can
//! check on the service without shell access:
//!
//! - `GET /monitor/logs`: recent log lines, plain text
//! - `GET /monitor/error_logs`: recent error lines, plain text
//! - `GET /monitor/ping`: liveness
//! - `GET /monitor/usage`: uptime, counters, GitHub rate limit

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::github::GithubApi;
use crate::monitor::RunLog;

/// Shared state for the monitor routes.
#[derive(Clone)]
struct MonitorState {
    log: Arc<RunLog>,
    api: Arc<dyn GithubApi>,
    started: Instant,
    name: &'static str,
}

fn text(body: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body)
}

async fn logs(State(state): State<MonitorState>) -> impl IntoResponse {
    text(state.log.lines().join("\n"))
}

async fn error_logs(State(state): State<MonitorState>) -> impl IntoResponse {
    text(state.log.error_lines().join("\n"))
}

async fn ping() -> impl IntoResponse {
    text("pong".to_string())
}

async fn usage(State(state): State<MonitorState>) -> impl IntoResponse {
    let rate = match state.api.rate_limit().await {
        Ok(value) => value,
        Err(_) => json!({ "error": "unreachable" }),
    };
    axum::Json(json!({
        "status": "ok",
        "name": state.name,
        "uptime_secs": state.started.elapsed().as_secs(),
        "warnings": state.log.warning_count(),
        "errors": state.log.error_count(),
        "github": rate,
    }))
}

/// Build the monitor router.
fn router(log: Arc<RunLog>, api: Arc<dyn GithubApi>) -> Router {
    let state = MonitorState {
        log,
        api,
        started: Instant::now(),
        name: "horizontal-tracker",
    };
    Router::new()
        .route("/monitor/logs", get(logs))
        .route("/monitor/error_logs", get(error_logs))
        .route("/monitor/ping", get(ping))
        .route("/monitor/usage", get(usage))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve the monitor endpoint until the process exits.
pub async fn serve(
    addr: String,
    log: Arc<RunLog>,
    api: Arc<dyn GithubApi>,
) -> crate::error::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "monitor endpoint listening");
    axum::serve(listener, router(log, api)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::testing::FakeGithub;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_ping() {
        let app = router(Arc::new(RunLog::new()), Arc::new(FakeGithub::new()));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/monitor/ping")
                    .body(axum::body::Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_logs_round_trip() {
        let log = Arc::new(RunLog::new());
        log.log("hello from the pass");
        let app = router(log, Arc::new(FakeGithub::new()));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/monitor/logs")
                    .body(axum::body::Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert!(String::from_utf8_lossy(&body).contains("hello from the pass"));
    }
}
