//! HTTP API handlers.
//!
//! Response shapes follow the original tool's JSON contract: `{"ok": true,
//! ...}` on success, `{"ok": false, "error": ...}` with a meaningful status
//! code on failure. The sidecar depends on `/api/pending` and `/api/confirm`
//! keeping this shape.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::engine::orders::{execute_entry, execute_exit_confirmation};
use crate::engine::Position;
use crate::error::{AppError, AuthError, BrokerError};
use crate::hours;
use crate::journal::JournalEntry;
use crate::metrics;
use crate::queue::{EntryRequest, PendingAction};
use crate::scanner::{self, ScanSignal};
use crate::state::SharedState;
use crate::universe;

/// How many closed trades `/api/status` returns.
const STATUS_CLOSED_LIMIT: usize = 50;

/// How many journal entries `/api/logs` returns.
const LOGS_LIMIT: usize = 200;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Auth(AuthError::BadConfirmToken) => StatusCode::UNAUTHORIZED,
            AppError::Auth(AuthError::MissingRequestToken) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::ExchangeFailed(_)) => StatusCode::BAD_GATEWAY,
            AppError::Broker(BrokerError::SessionMissing) => StatusCode::UNAUTHORIZED,
            AppError::Broker(_) => StatusCode::BAD_GATEWAY,
            AppError::Queue(_) => StatusCode::BAD_REQUEST,
            AppError::Engine(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({"ok": false, "error": self.to_string()}));
        (status, body).into_response()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always true when the process is serving.
    pub ok: bool,
    /// Whether the NSE session is currently live (IST).
    pub live: bool,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether the service finished startup.
    pub ready: bool,
    /// Whether a broker session is present.
    pub logged_in: bool,
}

/// `/api/ltp` response.
#[derive(Debug, Serialize)]
pub struct LtpResponse {
    /// Always true on success.
    pub ok: bool,
    /// The requested symbol.
    pub symbol: String,
    /// Last traded price.
    pub ltp: Decimal,
}

/// `/api/confirm` request body. The sidecar always sends index 0.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    /// Queue index to confirm.
    #[serde(default)]
    pub index: usize,
    /// Must match `AUTO_CONFIRM_TOKEN`.
    pub token: String,
}

/// `/api/confirm` response.
#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    /// Always true on success.
    pub ok: bool,
    /// The confirmed action.
    pub confirmed: PendingAction,
    /// Broker order id of the placed order.
    pub order_id: String,
    /// The tracked position, present for entry confirmations.
    pub position: Option<Position>,
}

/// `/api/status` response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Always true.
    pub ok: bool,
    /// Whether a broker session is present.
    pub logged_in: bool,
    /// Whether the NSE session is currently live.
    pub live: bool,
    /// Open and pending-exit positions.
    pub positions: Vec<Position>,
    /// Most recent closed trades, oldest first.
    pub closed_trades: Vec<Position>,
    /// Sum of realized P&L over all closed trades.
    pub realized_pnl: Decimal,
    /// Actions awaiting confirmation.
    pub pending: Vec<PendingAction>,
}

/// Landing page: a terse route summary, like the original tool's home page.
pub async fn home(State(state): State<SharedState>) -> String {
    let logged_in = if state.is_logged_in().await { "yes" } else { "no" };
    format!(
        "kite-daytrader up. Logged in: {}. \
         GET /health | GET /api/nifty50 | GET /api/ltp?symbol=RELIANCE | \
         POST /api/queue_order then POST /api/confirm | GET /api/status",
        logged_in
    )
}

/// Liveness probe. Always 200 while the process serves.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        live: hours::is_market_open_now(),
    })
}

/// Readiness probe: 200 once startup completed, 503 before.
pub async fn ready(State(state): State<SharedState>) -> impl IntoResponse {
    let response = ReadyResponse {
        ready: state.is_ready(),
        logged_in: state.is_logged_in().await,
    };

    if response.ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Redirect the browser to the broker's OAuth login page.
pub async fn login_start(State(state): State<SharedState>) -> Redirect {
    Redirect::temporary(&state.broker.login_url())
}

/// OAuth callback query parameters.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    /// Request token handed back by the broker after login.
    pub request_token: Option<String>,
}

/// Broker OAuth redirect target: exchanges the request token for an access
/// token and stores the session.
pub async fn login_callback(
    State(state): State<SharedState>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, AppError> {
    let request_token = params
        .request_token
        .ok_or(AuthError::MissingRequestToken)?;

    let session = match state.broker.generate_session(&request_token).await {
        Ok(session) => session,
        Err(e) => {
            state
                .journal
                .error("Login failed", json!({"error": e.to_string()}));
            return Err(AuthError::ExchangeFailed(e.to_string()).into());
        }
    };

    info!(user_id = ?session.user_id, "Broker login success");
    state
        .journal
        .trade("Broker login success", json!({"user_id": session.user_id}));
    state.set_session(session).await;

    Ok(Redirect::to("/"))
}

/// The NIFTY 50 trading universe.
pub async fn nifty50() -> impl IntoResponse {
    Json(json!({"ok": true, "symbols": universe::NIFTY50.as_slice()}))
}

/// `/api/ltp` query parameters.
#[derive(Debug, Deserialize)]
pub struct LtpParams {
    /// NSE tradingsymbol, must be in the universe.
    pub symbol: String,
}

/// Last traded price for a universe symbol.
pub async fn ltp(
    State(state): State<SharedState>,
    Query(params): Query<LtpParams>,
) -> Result<Json<LtpResponse>, AppError> {
    if !universe::contains(&params.symbol) {
        return Err(crate::error::QueueError::SymbolNotInUniverse(params.symbol).into());
    }

    let quote = state.broker.ltp(&params.symbol).await?;
    state.history.record(&quote.symbol, quote.price);

    Ok(Json(LtpResponse {
        ok: true,
        symbol: quote.symbol,
        ltp: quote.price,
    }))
}

/// Sweep the universe for indicator signals.
pub async fn scan(State(state): State<SharedState>) -> Json<Vec<ScanSignal>> {
    let signals = scanner::scan(&*state.broker, &state.history, &universe::NIFTY50).await;
    Json(signals)
}

/// Queue an entry for confirmation. Requires a broker session.
pub async fn queue_order(
    State(state): State<SharedState>,
    Json(request): Json<EntryRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !state.is_logged_in().await {
        return Err(BrokerError::SessionMissing.into());
    }

    state.queue.push_entry(request)?;
    Ok(Json(json!({"ok": true, "pending": state.queue.snapshot()})))
}

/// The actions awaiting confirmation, in queue order.
pub async fn pending(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({"ok": true, "pending": state.queue.snapshot()}))
}

/// Confirm a queued action: pop it and place the order.
///
/// A popped action is consumed even when placement fails; the failure is in
/// the error log and the caller's response, never silently retried.
pub async fn confirm(
    State(state): State<SharedState>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, AppError> {
    if !state.is_logged_in().await {
        return Err(BrokerError::SessionMissing.into());
    }
    if request.token != state.config.auto_confirm_token {
        warn!(index = request.index, "Confirm rejected: bad token");
        return Err(AuthError::BadConfirmToken.into());
    }

    let action = state.queue.take(request.index)?;
    metrics::inc_confirms_processed();

    match action {
        PendingAction::Entry(entry) => {
            let position = execute_entry(&state, entry.clone()).await?;
            Ok(Json(ConfirmResponse {
                ok: true,
                confirmed: PendingAction::Entry(entry),
                order_id: position.entry_order_id.clone(),
                position: Some(position),
            }))
        }
        PendingAction::Exit(confirmation) => {
            let order_id = execute_exit_confirmation(&state, confirmation.clone()).await?;
            Ok(Json(ConfirmResponse {
                ok: true,
                confirmed: PendingAction::Exit(confirmation),
                order_id,
                position: None,
            }))
        }
    }
}

/// Positions, recent closed trades, realized P&L, and the pending queue.
pub async fn status(State(state): State<SharedState>) -> Json<StatusResponse> {
    let positions: Vec<Position> = state.positions.iter().map(|p| p.clone()).collect();

    let closed = state.closed.read().await;
    let skip = closed.len().saturating_sub(STATUS_CLOSED_LIMIT);
    let closed_trades: Vec<Position> = closed[skip..].to_vec();
    let realized_pnl: Decimal = closed.iter().filter_map(|p| p.realized_pnl).sum();
    drop(closed);

    Json(StatusResponse {
        ok: true,
        logged_in: state.is_logged_in().await,
        live: hours::is_market_open_now(),
        positions,
        closed_trades,
        realized_pnl,
        pending: state.queue.snapshot(),
    })
}

/// `/api/logs` query parameters.
#[derive(Debug, Deserialize)]
pub struct LogParams {
    /// `trade` (default) or `error`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Recent trade-log or error-log entries.
pub async fn logs(
    State(state): State<SharedState>,
    Query(params): Query<LogParams>,
) -> impl IntoResponse {
    let entries: Vec<JournalEntry> = match params.kind.as_deref() {
        Some("error") => state.journal.recent_errors(LOGS_LIMIT),
        _ => state.journal.recent_trades(LOGS_LIMIT),
    };
    Json(json!({"ok": true, "logs": entries}))
}

/// Prometheus exposition for the installed recorder.
pub async fn metrics_export(State(state): State<SharedState>) -> Response {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
