//! engine-core
//!
//! Concurrent limit order book logic:
//! - messages (input / outcome / event types)
//! - order representation and lifecycle
//! - per-instrument order book and its critical section
//! - book registry with cancel routing
//! - multi-instrument matching engine
//! - synchronization primitives: order tracker (`wait`) and session barriers

pub mod side;
pub mod messages;
pub mod order;
pub mod price_level;
pub mod order_book;
pub mod registry;
pub mod order_tracker;
pub mod barrier;
pub mod matching_engine;
pub mod stats;
pub mod error;
pub mod top_of_book;

pub use side::Side;

pub use messages::{
    Cancel,
    CancelOutcome,
    EngineEvent,
    InputMessage,
    NewOrder,
    OrderAdded,
    OrderDeleted,
    PlaceOutcome,
    Response,
    Trade,
};

pub use order::{Order, OrderId, OrderStatus, Price, Quantity, Sequence};
pub use order_book::{OrderBook, PlaceResult};
pub use registry::{BookHandle, BookRegistry, InstrumentBook};
pub use order_tracker::{OrderTracker, TrackedState};
pub use barrier::{BarrierScope, BarrierSet, BarrierTicket, SessionId};
pub use matching_engine::{EventRx, EventTx, MatchingEngine};
pub use stats::EngineStatsSnapshot;
pub use error::EngineError;
pub use top_of_book::{BookDepth, LevelView, TopOfBookSnapshot};
