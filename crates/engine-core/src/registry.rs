//! Book registry: instrument -> [`InstrumentBook`], created on first use.
//!
//! Each instrument book carries its own mutex, so work on one instrument
//! never waits for another. The registry itself is a sharded map; looking
//! up or creating a book only touches one shard, and never while a book
//! lock is held.
//!
//! The registry also keeps the cancel route table (`order id -> book`),
//! because a cancel names only the order id.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};

use crate::error::EngineError;
use crate::order::OrderId;
use crate::order_book::OrderBook;

/// Shared handle to one instrument's book. Lives as long as the engine.
pub type BookHandle = Arc<InstrumentBook>;

/// An [`OrderBook`] and the critical section that guards it.
#[derive(Debug)]
pub struct InstrumentBook {
    instrument: Arc<str>,
    book: Mutex<OrderBook>,
}

impl InstrumentBook {
    pub fn new(instrument: &str) -> Self {
        let instrument: Arc<str> = Arc::from(instrument);
        InstrumentBook {
            book: Mutex::new(OrderBook::new(instrument.clone())),
            instrument,
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Enter the book's critical section.
    ///
    /// Sequence assignment, crossing, insertion and removal all happen
    /// through the returned guard.
    pub fn lock(&self) -> MutexGuard<'_, OrderBook> {
        self.book.lock()
    }

    /// Try to enter the critical section without blocking.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, OrderBook>> {
        self.book.try_lock()
    }
}

/// Instrument -> book mapping plus the cancel route table.
#[derive(Debug, Default)]
pub struct BookRegistry {
    books: DashMap<String, BookHandle>,
    routes: DashMap<OrderId, BookHandle>,
}

impl BookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the book for `instrument`, creating it if this is the first
    /// reference. Entries are never removed.
    pub fn get_or_create(&self, instrument: &str) -> BookHandle {
        if let Some(book) = self.books.get(instrument) {
            return book.value().clone();
        }
        self.books
            .entry(instrument.to_string())
            .or_insert_with(|| Arc::new(InstrumentBook::new(instrument)))
            .value()
            .clone()
    }

    /// Existing book for `instrument`, if any.
    pub fn get(&self, instrument: &str) -> Option<BookHandle> {
        self.books.get(instrument).map(|b| b.value().clone())
    }

    /// Point `id` at `book` for later cancels.
    ///
    /// `claim` runs while the route entry for `id` is held, so two
    /// concurrent places of the same id are decided one after the other.
    /// If `claim` fails the route table is left as it was.
    pub fn bind_route<F>(&self, id: OrderId, book: &BookHandle, claim: F) -> Result<(), EngineError>
    where
        F: FnOnce() -> Result<(), EngineError>,
    {
        match self.routes.entry(id) {
            Entry::Occupied(mut entry) => {
                claim()?;
                entry.insert(book.clone());
            }
            Entry::Vacant(entry) => {
                claim()?;
                entry.insert(book.clone());
            }
        }
        Ok(())
    }

    /// Book an order id was last placed into.
    pub fn route(&self, id: OrderId) -> Option<BookHandle> {
        self.routes.get(&id).map(|b| b.value().clone())
    }

    /// Number of instruments currently tracked.
    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Snapshot of all instrument names, sorted.
    pub fn instruments(&self) -> Vec<String> {
        let mut names: Vec<String> = self.books.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
