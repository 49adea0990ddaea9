//! One client session.
//!
//! A session worker owns its command queue and applies commands strictly
//! in queue order: a place or cancel is fully applied to its book before
//! the next message is taken, a wait suspends only this worker, and a
//! barrier suspends it until every participant has arrived.
//!
//! Once a session aborts it drops its remaining places, cancels and
//! waits, but it still meets every barrier it is named in so the other
//! participants are not left waiting on it.

use std::sync::Arc;
use std::time::Duration;

use engine_core::{EngineError, MatchingEngine, OrderStatus, Response, SessionId};
use engine_protocol::Command;
use tracing::{debug, info, trace, warn};

use crate::report::SessionReport;
use crate::types::{SessionMsg, SessionRx};

/// Run the session loop until the dispatcher closes the queue.
pub async fn run_session(
    id: SessionId,
    engine: Arc<MatchingEngine>,
    mut rx: SessionRx,
    wait_timeout: Option<Duration>,
) -> SessionReport {
    let mut report = SessionReport::new(id);

    while let Some(msg) = rx.recv().await {
        match msg {
            SessionMsg::Barrier(ticket) => {
                trace!(session = %id, participants = ticket.participants.len(), "at barrier");
                ticket.barrier.wait().await;
                report.barriers += 1;
            }
            SessionMsg::Abort(reason) => {
                if report.failure.is_none() {
                    warn!(session = %id, %reason, "session aborted");
                    report.failure = Some(reason);
                }
            }
            SessionMsg::Run(command) => {
                if report.is_aborted() {
                    report.skipped += 1;
                    continue;
                }
                match apply(id, &engine, &command, wait_timeout).await {
                    Ok(Applied::Done) => report.applied += 1,
                    Ok(Applied::Rejected) => report.rejected += 1,
                    Err(err) => {
                        warn!(session = %id, command = %command, error = %err, "session aborted");
                        report.failure = Some(format!("{command}: {err}"));
                    }
                }
            }
        }
    }

    info!(
        session = %id,
        applied = report.applied,
        rejected = report.rejected,
        skipped = report.skipped,
        aborted = report.is_aborted(),
        "session finished"
    );
    report
}

enum Applied {
    Done,
    Rejected,
}

/// Apply one command. `Err` is fatal for the session.
async fn apply(
    id: SessionId,
    engine: &MatchingEngine,
    command: &Command,
    wait_timeout: Option<Duration>,
) -> Result<Applied, EngineError> {
    match command {
        Command::Engine(msg) => match engine.process_message(msg.clone()) {
            Ok(Response::Placed(outcome)) => {
                debug!(
                    session = %id,
                    order_id = outcome.order_id,
                    status = ?outcome.status,
                    fills = outcome.trades.len(),
                    "placed"
                );
                Ok(Applied::Done)
            }
            Ok(Response::Cancel(outcome)) => {
                debug!(session = %id, ?outcome, "cancel");
                Ok(Applied::Done)
            }
            Err(err @ (EngineError::DuplicateId(_) | EngineError::InvalidOrder { .. })) => {
                warn!(session = %id, error = %err, "place rejected");
                Ok(Applied::Rejected)
            }
            Err(err) => Err(err),
        },
        Command::Wait(order_id) => {
            let status: OrderStatus = match wait_timeout {
                Some(timeout) => engine.wait_timeout(*order_id, timeout).await?,
                None => engine.wait(*order_id).await?,
            };
            debug!(session = %id, order_id, ?status, "wait released");
            Ok(Applied::Done)
        }
    }
}
