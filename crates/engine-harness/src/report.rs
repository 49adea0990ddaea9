//! End-of-run summary.

use std::path::Path;

use anyhow::Context;
use engine_core::{EngineStatsSnapshot, SessionId, TopOfBookSnapshot};
use serde::Serialize;

/// What one session did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub session: u32,

    /// Places, cancels and waits that ran to completion.
    pub applied: u64,

    /// Places the engine refused (duplicate id, invalid order).
    pub rejected: u64,

    /// Commands dropped because the session had already aborted.
    pub skipped: u64,

    pub barriers: u64,

    /// Why the session aborted, if it did.
    pub failure: Option<String>,
}

impl SessionReport {
    pub fn new(session: SessionId) -> Self {
        SessionReport {
            session: session.0,
            ..Self::default()
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.failure.is_some()
    }
}

/// Engine counters at the end of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    pub orders_accepted: u64,
    pub orders_rejected: u64,
    pub trades: u64,
    pub traded_volume: u64,
    pub cancels_accepted: u64,
    pub cancels_rejected: u64,
}

impl From<EngineStatsSnapshot> for StatsReport {
    fn from(s: EngineStatsSnapshot) -> Self {
        StatsReport {
            orders_accepted: s.orders_accepted,
            orders_rejected: s.orders_rejected,
            trades: s.trades,
            traded_volume: s.traded_volume,
            cancels_accepted: s.cancels_accepted,
            cancels_rejected: s.cancels_rejected,
        }
    }
}

/// Final top of book for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookSummary {
    pub instrument: String,
    pub bid_price: u32,
    pub bid_quantity: u64,
    pub ask_price: u32,
    pub ask_quantity: u64,
    pub resting_orders: usize,
}

impl BookSummary {
    pub fn new(instrument: String, top: TopOfBookSnapshot, resting_orders: usize) -> Self {
        BookSummary {
            instrument,
            bid_price: top.bid_price,
            bid_quantity: top.bid_quantity,
            ask_price: top.ask_price,
            ask_quantity: top.ask_quantity,
            resting_orders,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Sessions in id order.
    pub sessions: Vec<SessionReport>,

    /// Bad lines that named no valid session.
    pub unattributed_errors: u64,

    /// Whether the script ended with `x` rather than EOF.
    pub clean_end: bool,

    pub events_written: u64,
    pub stats: StatsReport,

    /// Books in instrument order.
    pub books: Vec<BookSummary>,
}

impl RunReport {
    pub fn aborted_sessions(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_aborted()).count()
    }

    pub fn session(&self, id: u32) -> Option<&SessionReport> {
        self.sessions.iter().find(|s| s.session == id)
    }

    pub fn book(&self, instrument: &str) -> Option<&BookSummary> {
        self.books.iter().find(|b| b.instrument == instrument)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("writing run report to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_sessions_are_counted() {
        let mut failed = SessionReport::new(SessionId(1));
        failed.failure = Some("line 4: price `-5` is not a non-negative integer".into());
        let report = RunReport {
            sessions: vec![SessionReport::new(SessionId(0)), failed],
            ..RunReport::default()
        };
        assert_eq!(report.aborted_sessions(), 1);
        assert!(report.session(1).unwrap().is_aborted());
        assert!(report.session(2).is_none());
    }

    #[test]
    fn json_has_stable_field_names() {
        let report = RunReport {
            sessions: vec![SessionReport::new(SessionId(0))],
            clean_end: true,
            books: vec![BookSummary::new(
                "GOOG".into(),
                TopOfBookSnapshot::new(2700, 3, 0, 0),
                2,
            )],
            ..RunReport::default()
        };
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["sessions"][0]["session"], 0);
        assert_eq!(value["sessions"][0]["failure"], serde_json::Value::Null);
        assert_eq!(value["books"][0]["bid_price"], 2700);
        assert_eq!(value["stats"]["trades"], 0);
        assert_eq!(value["clean_end"], true);
    }
}
