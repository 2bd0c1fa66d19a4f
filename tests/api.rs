//! Integration tests driving the HTTP API against the mock broker.
//!
//! Each test builds the real router over a fresh `AppState` and exercises
//! the queue/confirm workflow end to end with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use kite_daytrader::api::create_router;
use kite_daytrader::broker::{FillMode, MockBroker};
use kite_daytrader::config::Config;
use kite_daytrader::engine::{ExitPreference, ExitReason, Position, Side};
use kite_daytrader::queue::ExitConfirmation;
use kite_daytrader::state::{AppState, SharedState};

const TOKEN: &str = "it-token";

fn test_config() -> Config {
    Config {
        kite_api_key: "it-key".to_string(),
        kite_api_secret: "it-secret".to_string(),
        kite_api_url: "https://api.kite.trade".to_string(),
        invest_amount: dec!(10000),
        auto_confirm_token: TOKEN.to_string(),
        poll_interval_secs: 5,
        price_max_age_secs: 30,
        redirect_url: "http://localhost:8080/login/callback".to_string(),
        app_url: None,
        port: 8080,
        rust_log: "info".to_string(),
        journal_cap: 1000,
    }
}

fn setup() -> (Router, SharedState, Arc<MockBroker>) {
    let broker = Arc::new(MockBroker::new());
    let state = Arc::new(AppState::new(test_config(), broker.clone()));
    (create_router(state.clone()), state, broker)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn login(app: &Router) {
    let response = app
        .clone()
        .oneshot(get("/login/callback?request_token=it-req-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

fn entry_body(symbol: &str) -> Value {
    json!({
        "symbol": symbol,
        "side": "LONG",
        "quantity": 10,
        "entry_type": "MARKET",
        "tp_pct": 0.8,
        "sl_pct": 0.4,
        "exit_preference": "AUTO",
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _state, _broker) = setup();

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn queue_order_requires_login() {
    let (app, _state, _broker) = setup();

    let response = app
        .oneshot(post_json("/api/queue_order", entry_body("RELIANCE")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ltp_validates_universe_membership() {
    let (app, _state, broker) = setup();
    broker.set_price("RELIANCE", dec!(2800.50));

    let response = app.clone().oneshot(get("/api/ltp?symbol=PENNYSTOCK")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.oneshot(get("/api/ltp?symbol=RELIANCE")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["symbol"], json!("RELIANCE"));
    assert_eq!(body["ltp"].as_str().unwrap().parse::<Decimal>().unwrap(), dec!(2800.50));
}

#[tokio::test]
async fn nifty50_lists_the_universe() {
    let (app, _state, _broker) = setup();

    let response = app.oneshot(get("/api/nifty50")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let symbols = body["symbols"].as_array().unwrap();
    assert_eq!(symbols.len(), 50);
    assert!(symbols.contains(&json!("RELIANCE")));
}

#[tokio::test]
async fn queue_then_confirm_opens_a_position() {
    let (app, state, broker) = setup();
    broker.set_price("RELIANCE", dec!(2800));
    login(&app).await;

    // Queue the entry.
    let response = app
        .clone()
        .oneshot(post_json("/api/queue_order", entry_body("RELIANCE")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.queue.len(), 1);

    // Pending shows it.
    let response = app.clone().oneshot(get("/api/pending")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["pending"].as_array().unwrap().len(), 1);
    assert_eq!(body["pending"][0]["kind"], json!("entry"));

    // Wrong token is rejected and the queue is untouched.
    let response = app
        .clone()
        .oneshot(post_json("/api/confirm", json!({"index": 0, "token": "wrong"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(state.queue.len(), 1);

    // Correct token confirms index 0 and places the entry.
    let response = app
        .clone()
        .oneshot(post_json("/api/confirm", json!({"index": 0, "token": TOKEN})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["position"]["symbol"], json!("RELIANCE"));
    assert_eq!(body["position"]["status"], json!("OPEN"));

    assert!(state.queue.is_empty());
    assert_eq!(broker.order_count(), 1);
    assert!(state.positions.contains_key("RELIANCE"));

    // Status reflects the open position.
    let response = app.oneshot(get("/api/status")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["positions"].as_array().unwrap().len(), 1);
    assert_eq!(body["closed_trades"].as_array().unwrap().len(), 0);
    assert_eq!(
        body["realized_pnl"].as_str().unwrap().parse::<Decimal>().unwrap(),
        Decimal::ZERO
    );
}

#[tokio::test]
async fn confirm_index_out_of_range_is_rejected() {
    let (app, _state, _broker) = setup();
    login(&app).await;

    let response = app
        .oneshot(post_json("/api/confirm", json!({"index": 3, "token": TOKEN})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn confirming_a_queued_exit_places_the_flattening_order() {
    let (app, state, broker) = setup();
    broker.set_price("RELIANCE", dec!(2825));
    broker.set_fill_mode(FillMode::Resting);
    login(&app).await;

    // A MANUAL position whose TP fired: PENDING_EXIT with a queued
    // confirmation and no order yet.
    let mut position = Position::open(
        "RELIANCE",
        Side::Long,
        dec!(2800),
        10,
        dec!(2822.40),
        dec!(2788.80),
        ExitPreference::Manual,
        "entry-1",
    );
    position.mark_pending_exit(ExitReason::TakeProfit).unwrap();
    state.positions.insert("RELIANCE".to_string(), position);
    state.queue.push_exit(ExitConfirmation {
        symbol: "RELIANCE".to_string(),
        reason: ExitReason::TakeProfit,
        trigger_price: dec!(2825),
        queued_at: None,
    });

    let response = app
        .oneshot(post_json("/api/confirm", json!({"index": 0, "token": TOKEN})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["confirmed"]["kind"], json!("exit"));
    assert!(body["order_id"].as_str().unwrap().starts_with("mock-"));

    let orders = broker.submitted_orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].params.tag, "exit-TP");
    assert_eq!(
        state.positions.get("RELIANCE").unwrap().exit_order_id,
        Some(orders[0].order_id.clone())
    );
}

#[tokio::test]
async fn duplicate_entry_for_open_symbol_is_rejected() {
    let (app, state, broker) = setup();
    broker.set_price("RELIANCE", dec!(2800));
    login(&app).await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json("/api/queue_order", entry_body("RELIANCE")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(post_json("/api/confirm", json!({"index": 0, "token": TOKEN})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The second confirmation finds the symbol already tracked.
    let response = app
        .oneshot(post_json("/api/confirm", json!({"index": 0, "token": TOKEN})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.positions.len(), 1);
    assert_eq!(broker.order_count(), 1);
}

#[tokio::test]
async fn logs_endpoint_separates_trade_and_error_journals() {
    let (app, state, _broker) = setup();
    state.journal.trade("Order placed", json!({"symbol": "TCS"}));
    state.journal.error("Order rejected", json!({"symbol": "INFY"}));

    let response = app.clone().oneshot(get("/api/logs")).await.unwrap();
    let body = body_json(response).await;
    let logs = body["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["msg"], json!("Order placed"));

    let response = app.oneshot(get("/api/logs?type=error")).await.unwrap();
    let body = body_json(response).await;
    let logs = body["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["msg"], json!("Order rejected"));
}

#[tokio::test]
async fn callback_without_request_token_is_a_bad_request() {
    let (app, state, _broker) = setup();

    let response = app.oneshot(get("/login/callback")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!state.is_logged_in().await);
}
