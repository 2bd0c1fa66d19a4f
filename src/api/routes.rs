//! HTTP API route definitions.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    confirm, health, home, login_callback, login_start, logs, ltp, metrics_export, nifty50,
    pending, queue_order, ready, scan, status,
};
use crate::state::SharedState;

/// Create the API router.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        // Landing + probes
        .route("/", get(home))
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Broker OAuth flow
        .route("/login/start", get(login_start))
        .route("/login/callback", get(login_callback))
        // Universe and quotes
        .route("/api/nifty50", get(nifty50))
        .route("/api/ltp", get(ltp))
        .route("/api/scan", get(scan))
        // Queue + confirm workflow
        .route("/api/queue_order", post(queue_order))
        .route("/api/pending", get(pending))
        .route("/api/confirm", post(confirm))
        // Status and logs
        .route("/api/status", get(status))
        .route("/api/logs", get(logs))
        // Prometheus exposition
        .route("/metrics", get(metrics_export))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MockBroker;
    use crate::config::Config;
    use crate::state::AppState;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        Arc::new(AppState::new(Config::default(), Arc::new(MockBroker::new())))
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_503_when_not_ready() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_200_when_ready() {
        let state = test_state();
        state.set_ready(true);
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn login_start_redirects_to_broker() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/login/start")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert!(response
            .headers()
            .get("location")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("https://kite.trade/connect/login"));
    }
}
