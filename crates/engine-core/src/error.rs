//! Error types for the core matching engine.
//!
//! Errors are local to one order or command: none of them leaves a book
//! in a partially mutated state, and none of them is fatal to the engine.
//! A cancel of an unknown or terminal id is not an error at all; it is
//! reported as [`CancelOutcome::NotFound`](crate::messages::CancelOutcome).

use std::time::Duration;

use thiserror::Error;

use crate::order::OrderId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A place reused an id that is still in flight or resting.
    #[error("order id {0} is already active")]
    DuplicateId(OrderId),

    /// Price or quantity was zero.
    #[error("order {id} rejected: {reason}")]
    InvalidOrder { id: OrderId, reason: &'static str },

    /// A wait with a deadline expired before the order was processed.
    #[error("wait for order {id} timed out after {timeout:?}")]
    WaitTimedOut { id: OrderId, timeout: Duration },

    /// A participant list named no sessions or a session outside the run.
    #[error("invalid barrier: {0}")]
    InvalidBarrier(String),

    /// A generic internal error (e.g. invariant violation).
    #[error("internal engine error: {0}")]
    Internal(String),
}
