//! One price level of a book side.
//!
//! Orders at a level are keyed by their book `sequence`, so iteration
//! order is time priority and removal by sequence (cancel) does not need
//! a linear scan.

use std::collections::BTreeMap;

use crate::order::{Order, Quantity, Sequence};

#[derive(Debug, Clone, Default)]
pub struct PriceLevel {
    orders: BTreeMap<Sequence, Order>,
    total_quantity: u64,
}

impl PriceLevel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an order behind everything already at this level.
    pub fn insert(&mut self, order: Order) {
        self.total_quantity += u64::from(order.remaining_qty);
        self.orders.insert(order.sequence, order);
    }

    /// Remove an order by sequence, returning it.
    pub fn remove(&mut self, sequence: Sequence) -> Option<Order> {
        let order = self.orders.remove(&sequence)?;
        self.total_quantity -= u64::from(order.remaining_qty);
        Some(order)
    }

    /// Oldest order at this level.
    pub fn front(&self) -> Option<&Order> {
        self.orders.values().next()
    }

    /// Fill the oldest order by up to `qty`.
    ///
    /// Returns a copy of the order after the fill together with the
    /// quantity taken. A filled order is removed from the level.
    /// `None` if the level is empty.
    pub fn fill_front(&mut self, qty: Quantity) -> Option<(Order, Quantity)> {
        let mut entry = self.orders.first_entry()?;
        let order = entry.get_mut();
        let filled = order.fill(qty);
        order.executions += 1;
        self.total_quantity -= u64::from(filled);

        let snapshot = if order.is_filled() {
            entry.remove()
        } else {
            order.clone()
        };
        Some((snapshot, filled))
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Sum of remaining quantity across the level.
    pub fn total_quantity(&self) -> u64 {
        self.total_quantity
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Orders in time priority.
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }
}
