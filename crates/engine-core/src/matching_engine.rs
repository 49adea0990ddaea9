//! Multi-instrument matching engine.
//!
//! - Maintains one [`InstrumentBook`](crate::registry::InstrumentBook) per
//!   instrument, created on first use.
//! - Routes places by instrument and cancels by the order id route table.
//! - Publishes order progress to the [`OrderTracker`] and events to an
//!   optional sink, both from inside the owning book's critical section.
//!
//! The engine is shared by reference between all sessions; it has no
//! engine-wide lock.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::EngineError;
use crate::messages::{
    CancelOutcome, EngineEvent, InputMessage, NewOrder, OrderDeleted, PlaceOutcome, Response,
};
use crate::order::{OrderId, OrderStatus};
use crate::order_book::validate;
use crate::order_tracker::{OrderTracker, TrackedState};
use crate::registry::{BookHandle, BookRegistry};
use crate::stats::{EngineStats, EngineStatsSnapshot};
use crate::top_of_book::{BookDepth, TopOfBookSnapshot};

/// Events from the engine to whoever renders them.
pub type EventTx = mpsc::UnboundedSender<EngineEvent>;
pub type EventRx = mpsc::UnboundedReceiver<EngineEvent>;

#[derive(Debug)]
pub struct MatchingEngine {
    registry: BookRegistry,
    tracker: OrderTracker,
    events: Option<EventTx>,
    stats: EngineStats,
    /// Origin of the engine clock.
    epoch: Instant,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingEngine {
    /// Create a new, empty matching engine that publishes no events.
    pub fn new() -> Self {
        MatchingEngine {
            registry: BookRegistry::new(),
            tracker: OrderTracker::new(),
            events: None,
            stats: EngineStats::default(),
            epoch: Instant::now(),
        }
    }

    /// Create an engine that sends every [`EngineEvent`] to `tx`.
    pub fn with_event_sink(tx: EventTx) -> Self {
        MatchingEngine {
            events: Some(tx),
            ..Self::new()
        }
    }

    /// Process a single place or cancel.
    pub fn process_message(&self, msg: InputMessage) -> Result<Response, EngineError> {
        match msg {
            InputMessage::NewOrder(order) => self.place(order).map(Response::Placed),
            InputMessage::Cancel(cancel) => Ok(Response::Cancel(self.cancel(cancel.id))),
        }
    }

    /// Place a limit order.
    ///
    /// The id is claimed first; then, inside one hold of the book's lock,
    /// the order gets its sequence, crosses, rests, and every resulting
    /// status change and event is published.
    pub fn place(&self, msg: NewOrder) -> Result<PlaceOutcome, EngineError> {
        if let Err(err) = validate(&msg) {
            self.stats.record_reject();
            return Err(err);
        }

        let book = self.registry.get_or_create(&msg.instrument);
        if let Err(err) = self
            .registry
            .bind_route(msg.id, &book, || self.tracker.begin(msg.id))
        {
            debug!(order_id = msg.id, error = %err, "place rejected");
            self.stats.record_reject();
            return Err(err);
        }

        let mut guard = book.lock();
        let now = self.now_ns();
        let result = match guard.place(&msg, now) {
            Ok(result) => result,
            Err(err) => {
                drop(guard);
                self.tracker.abandon(msg.id);
                self.stats.record_reject();
                return Err(err);
            }
        };

        for &(id, status) in &result.touched {
            self.tracker.publish(id, status);
        }
        self.tracker.publish(msg.id, result.outcome.status);

        if let Some(tx) = &self.events {
            for trade in &result.outcome.trades {
                let _ = tx.send(EngineEvent::OrderExecuted(trade.clone()));
            }
            if let Some(added) = &result.added {
                let _ = tx.send(EngineEvent::OrderAdded(added.clone()));
            }
        }
        drop(guard);

        let outcome = result.outcome;
        self.stats
            .record_place(outcome.trades.len() as u64, u64::from(outcome.filled_qty));
        trace!(
            order_id = outcome.order_id,
            instrument = %msg.instrument,
            sequence = outcome.sequence,
            status = ?outcome.status,
            fills = outcome.trades.len(),
            "order placed"
        );
        Ok(outcome)
    }

    /// Cancel a resting order.
    ///
    /// Runs under the same lock as `place` on the order's book, so it
    /// either removes the order before any crossing order can see it, or
    /// finds it already filled and answers `NotFound`.
    pub fn cancel(&self, id: OrderId) -> CancelOutcome {
        let outcome = match self.registry.route(id) {
            Some(book) => {
                let mut guard = book.lock();
                let now = self.now_ns();
                let outcome = guard.cancel(id);
                if outcome.is_cancelled() {
                    self.tracker.publish(id, OrderStatus::Cancelled);
                }
                self.emit_deleted(id, outcome.is_cancelled(), now);
                outcome
            }
            None => {
                self.emit_deleted(id, false, self.now_ns());
                CancelOutcome::NotFound { order_id: id }
            }
        };

        self.stats.record_cancel(outcome.is_cancelled());
        trace!(order_id = id, accepted = outcome.is_cancelled(), "cancel processed");
        outcome
    }

    /// Suspend until the engine has processed `id`.
    ///
    /// Returns the order's status at the moment the waiter observed it.
    /// Blocks indefinitely for an id that is never placed.
    pub async fn wait(&self, id: OrderId) -> Result<OrderStatus, EngineError> {
        self.tracker.wait(id).await
    }

    /// [`wait`](Self::wait) with a deadline.
    pub async fn wait_timeout(&self, id: OrderId, timeout: Duration) -> Result<OrderStatus, EngineError> {
        self.tracker.wait_timeout(id, timeout).await
    }

    /// Latest settled status of an order.
    pub fn order_status(&self, id: OrderId) -> Option<OrderStatus> {
        self.tracker.status(id)
    }

    /// Tracking state of an order, including in-flight places.
    pub fn order_state(&self, id: OrderId) -> TrackedState {
        self.tracker.state(id)
    }

    /// For tests or admin queries: handle to an instrument's book.
    pub fn book(&self, instrument: &str) -> Option<BookHandle> {
        self.registry.get(instrument)
    }

    /// Top of book for an instrument; empty if it was never referenced.
    pub fn top_of_book(&self, instrument: &str) -> TopOfBookSnapshot {
        self.book(instrument)
            .map(|book| {
                let snapshot = book.lock().top_of_book_snapshot();
                snapshot
            })
            .unwrap_or_default()
    }

    /// Full depth for an instrument; empty if it was never referenced.
    pub fn depth(&self, instrument: &str) -> BookDepth {
        self.book(instrument)
            .map(|book| {
                let depth = book.lock().depth();
                depth
            })
            .unwrap_or_default()
    }

    /// Number of instruments currently tracked.
    pub fn num_instruments(&self) -> usize {
        self.registry.len()
    }

    /// All instrument names, sorted.
    pub fn instruments(&self) -> Vec<String> {
        self.registry.instruments()
    }

    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// Nanoseconds on the engine clock.
    fn now_ns(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn emit_deleted(&self, id: OrderId, accepted: bool, timestamp_ns: u64) {
        if let Some(tx) = &self.events {
            let _ = tx.send(EngineEvent::OrderDeleted(OrderDeleted {
                id,
                accepted,
                timestamp_ns,
            }));
        }
    }
}
