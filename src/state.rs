//! Shared application state.
//!
//! Position state is owned exclusively by this process (spec: the sidecar is
//! a stateless external caller). Everything hangs off one `Arc<AppState>`
//! shared by the HTTP handlers and the exit watcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::broker::{Broker, Session};
use crate::config::Config;
use crate::engine::position::Position;
use crate::journal::Journal;
use crate::queue::PendingQueue;
use crate::scanner::PriceHistory;

/// Shared application state.
pub struct AppState {
    /// Immutable configuration.
    pub config: Config,
    /// The broker everything trades through.
    pub broker: Arc<dyn Broker>,
    /// Broker session, present after the login flow completes.
    pub session: RwLock<Option<Session>>,
    /// Open and pending-exit positions by symbol.
    pub positions: DashMap<String, Position>,
    /// Closed positions, oldest first.
    pub closed: RwLock<Vec<Position>>,
    /// Queue of entries and exits awaiting confirmation.
    pub queue: PendingQueue,
    /// Trade and error logs.
    pub journal: Journal,
    /// Rolling close history for the scanner.
    pub history: PriceHistory,
    /// Prometheus render handle, when the exporter is installed.
    pub prometheus: Option<PrometheusHandle>,
    ready: AtomicBool,
}

/// The state type handlers receive.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Create application state around a broker.
    pub fn new(config: Config, broker: Arc<dyn Broker>) -> Self {
        let journal = Journal::new(config.journal_cap);
        Self {
            config,
            broker,
            session: RwLock::new(None),
            positions: DashMap::new(),
            closed: RwLock::new(Vec::new()),
            queue: PendingQueue::new(),
            journal,
            history: PriceHistory::new(),
            prometheus: None,
            ready: AtomicBool::new(false),
        }
    }

    /// Attach a Prometheus render handle.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Whether a broker session is present.
    pub async fn is_logged_in(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Store the broker session.
    pub async fn set_session(&self, session: Session) {
        *self.session.write().await = Some(session);
    }

    /// Sum of realized P&L over all closed positions.
    pub async fn realized_pnl(&self) -> Decimal {
        self.closed
            .read()
            .await
            .iter()
            .filter_map(|p| p.realized_pnl)
            .sum()
    }

    /// Archive a closed position.
    pub async fn archive(&self, position: Position) {
        self.closed.write().await.push(position);
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
