//! Message types used by the core matching engine.
//!
//! - [`InputMessage`]: what the engine consumes (place / cancel).
//! - [`Response`]: what a caller gets back synchronously.
//! - [`EngineEvent`]: what the engine publishes on its event sink, in
//!   critical-section order per instrument.
//!
//! Text encoders live in the `engine-protocol` crate; this module is
//! purely logical.

use std::sync::Arc;

use crate::order::{OrderId, OrderStatus, Price, Quantity, Sequence};
use crate::side::Side;

/// A request into the matching engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMessage {
    /// New limit order.
    NewOrder(NewOrder),

    /// Cancel a resting order by id.
    Cancel(Cancel),
}

/// New order message (input).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    /// Caller-supplied id, unique while the order is active.
    pub id: OrderId,

    /// Buy or Sell.
    pub side: Side,

    /// Instrument symbol, e.g. `"GOOG"`. Books are created on first use.
    pub instrument: String,

    /// Limit price in integer ticks (> 0).
    pub price: Price,

    /// Quantity (> 0).
    pub quantity: Quantity,
}

impl NewOrder {
    pub fn new(
        id: OrderId,
        side: Side,
        instrument: impl Into<String>,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        NewOrder {
            id,
            side,
            instrument: instrument.into(),
            price,
            quantity,
        }
    }
}

/// Cancel message (input).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancel {
    pub id: OrderId,
}

/// Synchronous answer to an [`InputMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Placed(PlaceOutcome),
    Cancel(CancelOutcome),
}

/// Result of a successful place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOutcome {
    pub order_id: OrderId,
    /// Sequence assigned inside the book's critical section.
    pub sequence: Sequence,
    /// `Resting`, `PartiallyFilled` or `Filled`.
    pub status: OrderStatus,
    pub filled_qty: Quantity,
    pub remaining_qty: Quantity,
    /// Fills in execution order.
    pub trades: Vec<Trade>,
}

/// Result of a cancel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The order was resting and has been removed.
    Cancelled {
        order_id: OrderId,
        instrument: Arc<str>,
        /// Quantity that was still open when the cancel won.
        remaining_qty: Quantity,
    },

    /// Already filled, already cancelled, never placed, or not yet
    /// visible to its book.
    NotFound { order_id: OrderId },
}

impl CancelOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CancelOutcome::Cancelled { .. })
    }
}

/// One execution between an incoming order and a resting order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub instrument: Arc<str>,

    pub resting_id: OrderId,
    pub incoming_id: OrderId,

    /// Side of the incoming (aggressor) order.
    pub aggressor: Side,

    /// Per-resting-order fill counter, starting at 1.
    pub execution_id: u32,

    /// Always the resting order's price.
    pub price: Price,
    pub quantity: Quantity,

    /// Sequence of the incoming order.
    pub sequence: Sequence,
    pub timestamp_ns: u64,
}

/// A remainder was inserted into its book side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAdded {
    pub id: OrderId,
    pub instrument: Arc<str>,
    pub side: Side,
    pub price: Price,
    /// Remaining (resting) quantity.
    pub quantity: Quantity,
    pub sequence: Sequence,
    pub timestamp_ns: u64,
}

/// Answer to a cancel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDeleted {
    pub id: OrderId,
    /// `false` when the cancel found nothing to remove.
    pub accepted: bool,
    pub timestamp_ns: u64,
}

/// An event published by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    OrderAdded(OrderAdded),
    OrderExecuted(Trade),
    OrderDeleted(OrderDeleted),
}

impl EngineEvent {
    /// Engine-clock timestamp of the event.
    pub fn timestamp_ns(&self) -> u64 {
        match self {
            EngineEvent::OrderAdded(a) => a.timestamp_ns,
            EngineEvent::OrderExecuted(t) => t.timestamp_ns,
            EngineEvent::OrderDeleted(d) => d.timestamp_ns,
        }
    }
}
