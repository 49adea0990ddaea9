//! Shared types for the script harness.
//!
//! This module defines:
//! - `SessionMsg`: what the dispatcher hands to a session worker
//! - channel aliases between the dispatcher and the session workers

use engine_core::BarrierTicket;
use engine_protocol::Command;
use tokio::sync::mpsc;

/// Message flowing from the dispatcher into one session worker.
#[derive(Debug)]
pub enum SessionMsg {
    /// Apply a place, cancel or wait.
    Run(Command),

    /// Meet the other participants of a barrier.
    Barrier(BarrierTicket),

    /// A script line addressed to this session could not be parsed.
    /// The session stops applying commands but keeps meeting barriers.
    Abort(String),
}

/// Channel from the dispatcher to a session worker.
pub type SessionTx = mpsc::UnboundedSender<SessionMsg>;
pub type SessionRx = mpsc::UnboundedReceiver<SessionMsg>;
