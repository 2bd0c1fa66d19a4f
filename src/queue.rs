//! The pending-action queue.
//!
//! Nothing trades without passing through here: queued entries wait for a
//! confirmation (`POST /api/confirm`), and MANUAL positions whose TP/SL
//! fired during market hours queue an exit confirmation through the same
//! mechanism. The sidecar always confirms index 0; `take` is idempotent in
//! the sense that a popped index is gone.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::broker::OrderType;
use crate::engine::position::{ExitPreference, ExitReason, Side};
use crate::error::QueueError;
use crate::hours;
use crate::universe;

/// A queued entry awaiting confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRequest {
    /// NSE tradingsymbol; must be in the NIFTY 50 universe.
    pub symbol: String,
    /// Long or short.
    pub side: Side,
    /// Explicit quantity; when omitted the order is sized from
    /// INVEST_AMOUNT at the entry price.
    #[serde(default)]
    pub quantity: Option<u32>,
    /// MARKET or LIMIT entry.
    pub entry_type: OrderType,
    /// Required when `entry_type` is LIMIT.
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    /// Take-profit distance, percent of entry price.
    pub tp_pct: Decimal,
    /// Stop-loss distance, percent of entry price.
    pub sl_pct: Decimal,
    /// Exit authorization mode for the resulting position.
    #[serde(default)]
    pub exit_preference: ExitPreference,
    /// When the request was queued (IST).
    #[serde(default)]
    pub queued_at: Option<DateTime<FixedOffset>>,
}

impl EntryRequest {
    /// Validate against the universe and parameter rules.
    pub fn validate(&self) -> Result<(), QueueError> {
        if !universe::contains(&self.symbol) {
            return Err(QueueError::SymbolNotInUniverse(self.symbol.clone()));
        }
        if self.entry_type == OrderType::Limit && self.limit_price.is_none() {
            return Err(QueueError::MissingLimitPrice);
        }
        if self.quantity == Some(0) {
            return Err(QueueError::ZeroQuantity {
                symbol: self.symbol.clone(),
                price: self.limit_price.unwrap_or(Decimal::ZERO),
            });
        }
        Ok(())
    }
}

/// A triggered MANUAL exit awaiting confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitConfirmation {
    /// Symbol of the PENDING_EXIT position.
    pub symbol: String,
    /// Which threshold fired.
    pub reason: ExitReason,
    /// Price that triggered the exit.
    pub trigger_price: Decimal,
    /// When the confirmation was queued (IST).
    pub queued_at: Option<DateTime<FixedOffset>>,
}

/// Anything waiting in the confirmation queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingAction {
    /// A queued entry order.
    Entry(EntryRequest),
    /// A triggered exit for a MANUAL position.
    Exit(ExitConfirmation),
}

/// FIFO queue of actions requiring confirmation.
#[derive(Default)]
pub struct PendingQueue {
    items: Mutex<Vec<PendingAction>>,
}

impl PendingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an entry after validation.
    pub fn push_entry(&self, mut request: EntryRequest) -> Result<(), QueueError> {
        request.validate()?;
        request.queued_at = Some(hours::now_ist());
        self.items
            .lock()
            .expect("queue lock")
            .push(PendingAction::Entry(request));
        Ok(())
    }

    /// Queue an exit confirmation, unless one is already pending for the
    /// symbol (the watcher re-evaluates every few seconds).
    pub fn push_exit(&self, confirmation: ExitConfirmation) -> bool {
        let mut items = self.items.lock().expect("queue lock");
        let already_pending = items.iter().any(|a| {
            matches!(a, PendingAction::Exit(e) if e.symbol == confirmation.symbol)
        });
        if already_pending {
            return false;
        }
        items.push(PendingAction::Exit(ExitConfirmation {
            queued_at: Some(hours::now_ist()),
            ..confirmation
        }));
        true
    }

    /// Remove and return the action at `index`.
    pub fn take(&self, index: usize) -> Result<PendingAction, QueueError> {
        let mut items = self.items.lock().expect("queue lock");
        if index >= items.len() {
            return Err(QueueError::IndexOutOfRange(index));
        }
        Ok(items.remove(index))
    }

    /// Snapshot of the queue contents.
    pub fn snapshot(&self) -> Vec<PendingAction> {
        self.items.lock().expect("queue lock").clone()
    }

    /// Number of queued actions.
    pub fn len(&self) -> usize {
        self.items.lock().expect("queue lock").len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(symbol: &str) -> EntryRequest {
        EntryRequest {
            symbol: symbol.to_string(),
            side: Side::Long,
            quantity: Some(10),
            entry_type: OrderType::Market,
            limit_price: None,
            tp_pct: dec!(0.8),
            sl_pct: dec!(0.4),
            exit_preference: ExitPreference::Auto,
            queued_at: None,
        }
    }

    #[test]
    fn queue_accepts_valid_entries_in_order() {
        let queue = PendingQueue::new();
        queue.push_entry(entry("RELIANCE")).unwrap();
        queue.push_entry(entry("TCS")).unwrap();

        assert_eq!(queue.len(), 2);
        let first = queue.take(0).unwrap();
        match first {
            PendingAction::Entry(e) => assert_eq!(e.symbol, "RELIANCE"),
            _ => panic!("expected entry"),
        }
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        let queue = PendingQueue::new();
        let result = queue.push_entry(entry("PENNYSTOCK"));
        assert!(matches!(result, Err(QueueError::SymbolNotInUniverse(_))));
    }

    #[test]
    fn limit_entry_requires_price() {
        let queue = PendingQueue::new();
        let request = EntryRequest {
            entry_type: OrderType::Limit,
            limit_price: None,
            ..entry("RELIANCE")
        };
        assert!(matches!(
            queue.push_entry(request),
            Err(QueueError::MissingLimitPrice)
        ));
    }

    #[test]
    fn take_out_of_range_errors() {
        let queue = PendingQueue::new();
        assert!(matches!(queue.take(0), Err(QueueError::IndexOutOfRange(0))));
    }

    #[test]
    fn duplicate_exit_confirmations_are_dropped() {
        let queue = PendingQueue::new();
        let confirmation = ExitConfirmation {
            symbol: "RELIANCE".to_string(),
            reason: ExitReason::TakeProfit,
            trigger_price: dec!(2822.40),
            queued_at: None,
        };

        assert!(queue.push_exit(confirmation.clone()));
        assert!(!queue.push_exit(confirmation));
        assert_eq!(queue.len(), 1);
    }
}
