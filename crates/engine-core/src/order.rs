//! Internal order representation used inside an instrument book.
//!
//! An order has an immutable identity (`id`, `side`, `instrument`,
//! `price`, original `quantity`) and mutable lifecycle state
//! (`remaining_qty`, `status`, `executions`). The `sequence` is assigned
//! by the book when the order enters its critical section and is the
//! time-priority key.

use std::sync::Arc;

use crate::messages::NewOrder;
use crate::side::Side;

/// Caller-supplied order handle, used for cancel and wait.
pub type OrderId = u32;

/// Limit price in integer ticks.
pub type Price = u32;

/// Quantity in integer units.
pub type Quantity = u32;

/// Per-book tie-break number, taken inside the book's critical section.
pub type Sequence = u64;

/// Lifecycle status of an order once the engine has processed it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// On the book, nothing filled yet.
    Resting,
    /// On the book with some quantity already executed.
    PartiallyFilled,
    /// Remaining quantity reached zero. Terminal.
    Filled,
    /// Removed by an accepted cancel. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// `true` for `Filled` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    /// `true` while the order sits on one side of its book.
    pub fn is_resting(self) -> bool {
        matches!(self, OrderStatus::Resting | OrderStatus::PartiallyFilled)
    }
}

/// A single order in the book.
#[derive(Debug, Clone)]
pub struct Order {
    // Identity
    pub id: OrderId,
    pub side: Side,
    pub instrument: Arc<str>,
    pub price: Price,
    pub quantity: Quantity, // original quantity

    // Lifecycle
    pub remaining_qty: Quantity,
    pub sequence: Sequence,
    pub status: OrderStatus,

    /// Number of fills this order has taken part in as the resting side.
    pub executions: u32,
}

impl Order {
    /// Construct an `Order` from a [`NewOrder`] message and the sequence
    /// the book assigned to it.
    pub fn from_new_order(msg: &NewOrder, instrument: Arc<str>, sequence: Sequence) -> Self {
        Order {
            id: msg.id,
            side: msg.side,
            instrument,
            price: msg.price,
            quantity: msg.quantity,
            remaining_qty: msg.quantity,
            sequence,
            status: OrderStatus::Resting,
            executions: 0,
        }
    }

    /// Returns `true` if the order is fully filled.
    pub fn is_filled(&self) -> bool {
        self.remaining_qty == 0
    }

    /// Quantity executed so far.
    pub fn filled_qty(&self) -> Quantity {
        self.quantity - self.remaining_qty
    }

    /// Fill the order by up to `qty` units and update its status.
    ///
    /// Returns the quantity that was actually filled (which will be
    /// `<= qty` and `<= remaining_qty`).
    pub fn fill(&mut self, qty: Quantity) -> Quantity {
        let filled = qty.min(self.remaining_qty);
        self.remaining_qty -= filled;
        self.status = if self.remaining_qty == 0 {
            OrderStatus::Filled
        } else if self.remaining_qty < self.quantity {
            OrderStatus::PartiallyFilled
        } else {
            self.status
        };
        filled
    }
}
