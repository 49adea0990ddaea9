//! Read-only views of book state.
//!
//! These are plain values copied out of a book while its lock is held, so
//! callers can inspect them without holding the critical section.

use crate::order::Price;

/// A simple snapshot of top-of-book for a single instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TopOfBookSnapshot {
    /// Best bid price (0 if no bid).
    pub bid_price: Price,
    /// Total quantity at best bid (0 if no bid).
    pub bid_quantity: u64,

    /// Best ask price (0 if no ask).
    pub ask_price: Price,
    /// Total quantity at best ask (0 if no ask).
    pub ask_quantity: u64,
}

impl TopOfBookSnapshot {
    pub fn new(bid_price: Price, bid_quantity: u64, ask_price: Price, ask_quantity: u64) -> Self {
        TopOfBookSnapshot {
            bid_price,
            bid_quantity,
            ask_price,
            ask_quantity,
        }
    }

    /// Returns `true` if there is *no* bid and *no* ask.
    pub fn is_empty(&self) -> bool {
        self.bid_price == 0 && self.ask_price == 0
    }
}

/// Aggregate of one price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelView {
    pub price: Price,
    pub total_quantity: u64,
    pub order_count: usize,
}

/// All levels of a book, best first on each side.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookDepth {
    pub bids: Vec<LevelView>,
    pub asks: Vec<LevelView>,
}

impl BookDepth {
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
