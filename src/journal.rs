//! In-memory trade and error logs.
//!
//! Capped ring buffers of timestamped entries with JSON payloads, mirrored
//! to `tracing`. The trade log is the archive positions are written to on
//! close; the error log is where broker failures surface (no retries).

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;
use tracing::{info, warn};

use crate::hours;

/// A single journal entry.
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    /// IST timestamp, `YYYY-MM-DD HH:MM:SS`.
    pub ts: String,
    /// Human-readable message.
    pub msg: String,
    /// Structured payload.
    pub payload: serde_json::Value,
}

/// Capped trade and error logs.
pub struct Journal {
    cap: usize,
    trades: Mutex<VecDeque<JournalEntry>>,
    errors: Mutex<VecDeque<JournalEntry>>,
}

impl Journal {
    /// Create a journal retaining at most `cap` entries per log.
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            trades: Mutex::new(VecDeque::new()),
            errors: Mutex::new(VecDeque::new()),
        }
    }

    /// Append to the trade log.
    pub fn trade(&self, msg: &str, payload: serde_json::Value) {
        info!(target: "tradelog", %msg, %payload);
        push_capped(&self.trades, self.cap, entry(msg, payload));
    }

    /// Append to the error log.
    pub fn error(&self, msg: &str, payload: serde_json::Value) {
        warn!(target: "errorlog", %msg, %payload);
        push_capped(&self.errors, self.cap, entry(msg, payload));
    }

    /// Most recent trade entries, oldest first.
    pub fn recent_trades(&self, limit: usize) -> Vec<JournalEntry> {
        tail(&self.trades, limit)
    }

    /// Most recent error entries, oldest first.
    pub fn recent_errors(&self, limit: usize) -> Vec<JournalEntry> {
        tail(&self.errors, limit)
    }

    /// Number of error entries currently retained.
    pub fn error_count(&self) -> usize {
        self.errors.lock().expect("journal lock").len()
    }
}

fn entry(msg: &str, payload: serde_json::Value) -> JournalEntry {
    JournalEntry {
        ts: hours::now_str(),
        msg: msg.to_string(),
        payload,
    }
}

fn push_capped(log: &Mutex<VecDeque<JournalEntry>>, cap: usize, entry: JournalEntry) {
    let mut log = log.lock().expect("journal lock");
    if log.len() >= cap {
        log.pop_front();
    }
    log.push_back(entry);
}

fn tail(log: &Mutex<VecDeque<JournalEntry>>, limit: usize) -> Vec<JournalEntry> {
    let log = log.lock().expect("journal lock");
    let skip = log.len().saturating_sub(limit);
    log.iter().skip(skip).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_are_recorded_with_payloads() {
        let journal = Journal::new(10);
        journal.trade("Position opened", json!({"symbol": "RELIANCE"}));
        journal.error("Exit order failed", json!({"symbol": "RELIANCE"}));

        let trades = journal.recent_trades(10);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].msg, "Position opened");
        assert_eq!(trades[0].payload["symbol"], "RELIANCE");
        assert_eq!(journal.error_count(), 1);
    }

    #[test]
    fn logs_are_capped() {
        let journal = Journal::new(3);
        for i in 0..5 {
            journal.trade(&format!("msg-{}", i), json!({}));
        }

        let trades = journal.recent_trades(10);
        assert_eq!(trades.len(), 3);
        assert_eq!(trades[0].msg, "msg-2");
        assert_eq!(trades[2].msg, "msg-4");
    }

    #[test]
    fn tail_returns_most_recent() {
        let journal = Journal::new(10);
        for i in 0..6 {
            journal.error(&format!("err-{}", i), json!({}));
        }

        let errors = journal.recent_errors(2);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].msg, "err-4");
        assert_eq!(errors[1].msg, "err-5");
    }
}
