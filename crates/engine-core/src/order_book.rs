//! Single-instrument order book with price-time priority.
//!
//! - One instance per instrument, always used behind that instrument's
//!   lock (see [`InstrumentBook`](crate::registry::InstrumentBook)).
//! - Bids: descending by price (best = highest).
//! - Asks: ascending by price (best = lowest).
//! - Within a price level, ascending by `sequence`.
//!
//! The book assigns `sequence` itself, from a counter that only exists
//! inside the locked state. Whoever holds the lock when `place` runs is
//! the one that gets the next number, so priority always follows
//! critical-section order.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::EngineError;
use crate::messages::{CancelOutcome, NewOrder, OrderAdded, PlaceOutcome, Trade};
use crate::order::{Order, OrderId, OrderStatus, Price, Sequence};
use crate::price_level::PriceLevel;
use crate::side::Side;
use crate::top_of_book::{BookDepth, LevelView, TopOfBookSnapshot};

/// Where a resting order lives.
#[derive(Debug, Clone, Copy)]
struct Locator {
    side: Side,
    price: Price,
    sequence: Sequence,
}

/// Everything one `place` did to the book.
#[derive(Debug, Clone)]
pub struct PlaceResult {
    pub outcome: PlaceOutcome,

    /// Set when a remainder was inserted.
    pub added: Option<OrderAdded>,

    /// New status of every resting order the crossing touched, in fill
    /// order.
    pub touched: Vec<(OrderId, OrderStatus)>,
}

/// Single-instrument order book.
#[derive(Debug)]
pub struct OrderBook {
    instrument: Arc<str>,

    /// Bids: price -> level. Highest key is best.
    bids: BTreeMap<Price, PriceLevel>,

    /// Asks: price -> level. Lowest key is best.
    asks: BTreeMap<Price, PriceLevel>,

    /// Resting orders only. An id is here iff its order is on a side.
    index: HashMap<OrderId, Locator>,

    next_sequence: Sequence,
}

impl OrderBook {
    /// Create a new order book for the given instrument.
    pub fn new(instrument: impl Into<Arc<str>>) -> Self {
        OrderBook {
            instrument: instrument.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
            next_sequence: 0,
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Sequence the next accepted order will get.
    pub fn next_sequence(&self) -> Sequence {
        self.next_sequence
    }

    /// Process a new limit order: assign its sequence, cross it against
    /// the opposite side, and rest any remainder.
    ///
    /// On error nothing is modified and no sequence is consumed.
    pub fn place(&mut self, msg: &NewOrder, timestamp_ns: u64) -> Result<PlaceResult, EngineError> {
        validate(msg)?;
        if self.index.contains_key(&msg.id) {
            return Err(EngineError::DuplicateId(msg.id));
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let mut incoming = Order::from_new_order(msg, self.instrument.clone(), sequence);
        let (trades, touched) = self.cross(&mut incoming, timestamp_ns);

        let added = if incoming.remaining_qty > 0 {
            let added = OrderAdded {
                id: incoming.id,
                instrument: self.instrument.clone(),
                side: incoming.side,
                price: incoming.price,
                quantity: incoming.remaining_qty,
                sequence,
                timestamp_ns,
            };
            self.rest(incoming.clone());
            Some(added)
        } else {
            None
        };

        Ok(PlaceResult {
            outcome: PlaceOutcome {
                order_id: incoming.id,
                sequence,
                status: incoming.status,
                filled_qty: incoming.filled_qty(),
                remaining_qty: incoming.remaining_qty,
                trades,
            },
            added,
            touched,
        })
    }

    /// Cancel a resting order by id.
    ///
    /// Filled, cancelled and unknown ids all answer `NotFound` and leave
    /// the book untouched.
    pub fn cancel(&mut self, id: OrderId) -> CancelOutcome {
        let Some(locator) = self.index.remove(&id) else {
            return CancelOutcome::NotFound { order_id: id };
        };

        let levels = self.side_mut(locator.side);
        let removed = levels
            .get_mut(&locator.price)
            .and_then(|level| level.remove(locator.sequence));
        if levels.get(&locator.price).is_some_and(PriceLevel::is_empty) {
            levels.remove(&locator.price);
        }

        match removed {
            Some(order) => CancelOutcome::Cancelled {
                order_id: id,
                instrument: self.instrument.clone(),
                remaining_qty: order.remaining_qty,
            },
            // Index and sides disagreed; the index entry is gone either way.
            None => CancelOutcome::NotFound { order_id: id },
        }
    }

    /// `true` if `id` is resting in this book.
    pub fn contains(&self, id: OrderId) -> bool {
        self.index.contains_key(&id)
    }

    /// Look up a resting order.
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        let loc = self.index.get(&id)?;
        self.side(loc.side)
            .get(&loc.price)?
            .iter()
            .find(|o| o.sequence == loc.sequence)
    }

    /// Number of resting orders on both sides.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Best price on a side, if any.
    pub fn best_price(&self, side: Side) -> Option<Price> {
        match side {
            Side::Buy => self.bids.keys().next_back().copied(),
            Side::Sell => self.asks.keys().next().copied(),
        }
    }

    /// Get best bid price (0 if none).
    pub fn best_bid_price(&self) -> Price {
        self.best_price(Side::Buy).unwrap_or(0)
    }

    /// Get best ask price (0 if none).
    pub fn best_ask_price(&self) -> Price {
        self.best_price(Side::Sell).unwrap_or(0)
    }

    /// Return a simple snapshot of the current top-of-book.
    pub fn top_of_book_snapshot(&self) -> TopOfBookSnapshot {
        let qty_at = |side: Side| {
            self.best_price(side)
                .and_then(|p| self.side(side).get(&p))
                .map_or(0, PriceLevel::total_quantity)
        };
        TopOfBookSnapshot::new(
            self.best_bid_price(),
            qty_at(Side::Buy),
            self.best_ask_price(),
            qty_at(Side::Sell),
        )
    }

    /// All price levels, best first.
    pub fn depth(&self) -> BookDepth {
        let view = |(price, level): (&Price, &PriceLevel)| LevelView {
            price: *price,
            total_quantity: level.total_quantity(),
            order_count: level.order_count(),
        };
        BookDepth {
            bids: self.bids.iter().rev().map(view).collect(),
            asks: self.asks.iter().map(view).collect(),
        }
    }

    /// Resting orders of one side in matching priority.
    pub fn resting_orders(&self, side: Side) -> Vec<&Order> {
        match side {
            Side::Buy => self.bids.values().rev().flat_map(PriceLevel::iter).collect(),
            Side::Sell => self.asks.values().flat_map(PriceLevel::iter).collect(),
        }
    }

    /// Structural self-check used by tests.
    ///
    /// Verifies that the index and the two sides agree, that no empty
    /// level is kept, that every resting order is open, and that the book
    /// is not crossed.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen = 0usize;
        for side in [Side::Buy, Side::Sell] {
            for (price, level) in self.side(side) {
                if level.is_empty() {
                    return Err(format!("empty level kept at {price}"));
                }
                let mut sum = 0u64;
                for order in level.iter() {
                    seen += 1;
                    sum += u64::from(order.remaining_qty);
                    if order.price != *price || order.side != side {
                        return Err(format!("order {} filed under wrong level", order.id));
                    }
                    if order.remaining_qty == 0 || !order.status.is_resting() {
                        return Err(format!("order {} resting with status {:?}", order.id, order.status));
                    }
                    match self.index.get(&order.id) {
                        Some(loc) if loc.sequence == order.sequence => {}
                        _ => return Err(format!("order {} missing from index", order.id)),
                    }
                }
                if sum != level.total_quantity() {
                    return Err(format!("level {price} total {} != {sum}", level.total_quantity()));
                }
            }
        }
        if seen != self.index.len() {
            return Err(format!("index has {} entries, sides hold {seen}", self.index.len()));
        }
        if let (Some(bid), Some(ask)) = (self.best_price(Side::Buy), self.best_price(Side::Sell)) {
            if bid >= ask {
                return Err(format!("book crossed: bid {bid} >= ask {ask}"));
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    /// Match an incoming order against the opposite side of the book.
    ///
    /// Fills generate trades at the resting price. Any remaining quantity
    /// is left in `incoming` for the caller to rest.
    fn cross(&mut self, incoming: &mut Order, timestamp_ns: u64) -> (Vec<Trade>, Vec<(OrderId, OrderStatus)>) {
        let mut trades = Vec::new();
        let mut touched = Vec::new();
        let opposite = incoming.side.opposite();

        while incoming.remaining_qty > 0 {
            let Some(best) = self.best_price(opposite) else {
                break;
            };
            if !incoming.side.crosses(incoming.price, best) {
                break;
            }

            let levels = match opposite {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            let Some(level) = levels.get_mut(&best) else {
                break;
            };

            // FIFO through this level.
            while incoming.remaining_qty > 0 {
                let Some((resting, qty)) = level.fill_front(incoming.remaining_qty) else {
                    break;
                };
                incoming.fill(qty);

                if resting.is_filled() {
                    self.index.remove(&resting.id);
                }
                touched.push((resting.id, resting.status));
                trades.push(Trade {
                    instrument: self.instrument.clone(),
                    resting_id: resting.id,
                    incoming_id: incoming.id,
                    aggressor: incoming.side,
                    execution_id: resting.executions,
                    price: resting.price,
                    quantity: qty,
                    sequence: incoming.sequence,
                    timestamp_ns,
                });
            }

            if level.is_empty() {
                levels.remove(&best);
            }
        }

        (trades, touched)
    }

    /// Add a remaining limit order to its side of the book.
    fn rest(&mut self, order: Order) {
        self.index.insert(
            order.id,
            Locator {
                side: order.side,
                price: order.price,
                sequence: order.sequence,
            },
        );
        self.side_mut(order.side)
            .entry(order.price)
            .or_default()
            .insert(order);
    }

    fn side(&self, side: Side) -> &BTreeMap<Price, PriceLevel> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<Price, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }
}

/// Reject orders the protocol forbids before anything is touched.
pub(crate) fn validate(msg: &NewOrder) -> Result<(), EngineError> {
    if msg.price == 0 {
        return Err(EngineError::InvalidOrder {
            id: msg.id,
            reason: "price must be positive",
        });
    }
    if msg.quantity == 0 {
        return Err(EngineError::InvalidOrder {
            id: msg.id,
            reason: "quantity must be positive",
        });
    }
    Ok(())
}
