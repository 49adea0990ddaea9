//! Script dispatcher and top-level harness wiring.
//!
//! This module:
//! - Reads the session count header.
//! - Spawns one worker per session and, unless disabled, an event writer.
//! - Routes every script line: commands to their session (unprefixed
//!   commands go to session 0), barriers to each participant, parse errors
//!   to the session they belong to.
//! - Stops at `x` (or EOF), drains the workers and builds the run report.
//!
//! The dispatcher never touches a book itself; it only forwards.

use std::sync::Arc;

use anyhow::{bail, Context};
use engine_core::{BarrierSet, MatchingEngine, SessionId};
use engine_protocol::{ProtocolError, ScriptLine, ScriptParser};
use futures::future::join_all;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::output::run_event_writer;
use crate::report::{BookSummary, RunReport, SessionReport, StatsReport};
use crate::session::run_session;
use crate::types::{SessionMsg, SessionRx, SessionTx};

/// Replay one script.
///
/// Engine events are written to `output` as they happen. The sink is
/// handed back with the report so callers can inspect what was written.
pub async fn run_script<R, W>(config: &Config, input: R, output: W) -> anyhow::Result<(RunReport, W)>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut lines = input.lines();
    let mut parser = ScriptParser::new();
    let mut unattributed = 0u64;

    let session_count = loop {
        let Some(line) = lines.next_line().await.context("reading script")? else {
            bail!("script ended before the session count header");
        };
        match parser.parse_line(&line) {
            Ok(Some(ScriptLine::SessionCount(n))) => break n,
            Ok(_) => {}
            Err(err) => bail!("bad script header: {err}"),
        }
    };
    if session_count > config.max_sessions {
        bail!(
            "script declares {session_count} sessions, more than the configured maximum of {}",
            config.max_sessions
        );
    }
    info!(sessions = session_count, "starting run");

    let (engine, writer) = if config.emit_events {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(run_event_writer(rx, output));
        (Arc::new(MatchingEngine::with_event_sink(tx)), Ok(writer))
    } else {
        (Arc::new(MatchingEngine::new()), Err(output))
    };

    let mut senders: Vec<SessionTx> = Vec::with_capacity(session_count as usize);
    let mut workers = Vec::with_capacity(session_count as usize);
    for n in 0..session_count {
        let (tx, rx): (SessionTx, SessionRx) = mpsc::unbounded_channel();
        senders.push(tx);
        workers.push(tokio::spawn(run_session(
            SessionId(n),
            engine.clone(),
            rx,
            config.wait_timeout,
        )));
    }

    let mut barriers = BarrierSet::new(session_count);
    let mut clean_end = false;

    while let Some(line) = lines.next_line().await.context("reading script")? {
        match parser.parse_line(&line) {
            Ok(None) => {}
            Ok(Some(ScriptLine::Command { session, command })) => {
                let session = session.unwrap_or(SessionId(0));
                send(&senders, session, SessionMsg::Run(command));
            }
            Ok(Some(ScriptLine::Barrier(scope))) => match barriers.resolve(&scope) {
                Ok(ticket) => {
                    for &session in &ticket.participants {
                        send(&senders, session, SessionMsg::Barrier(ticket.clone()));
                    }
                }
                Err(err) => {
                    warn!(line = parser.line_no(), error = %err, "barrier skipped");
                    unattributed += 1;
                }
            },
            Ok(Some(ScriptLine::Open)) => debug!("open marker"),
            Ok(Some(ScriptLine::SessionCount(_))) => {}
            Ok(Some(ScriptLine::End)) => {
                clean_end = true;
                break;
            }
            Err(err) => route_error(&senders, err, &mut unattributed),
        }
    }
    if !clean_end {
        warn!("script ended without `x`; treating EOF as end");
    }

    // Closing the queues lets each worker finish once it has drained.
    drop(senders);
    let sessions = collect_sessions(join_all(workers).await);

    let books = engine
        .instruments()
        .into_iter()
        .map(|instrument| {
            let resting = engine.book(&instrument).map_or(0, |book| book.lock().len());
            let top = engine.top_of_book(&instrument);
            BookSummary::new(instrument, top, resting)
        })
        .collect();
    let stats = engine.stats();
    info!(?stats, "run finished");

    // The engine owns the event sender; the writer stops once it is gone.
    drop(engine);
    let (output, events_written) = match writer {
        Ok(handle) => handle.await.context("event writer panicked")??,
        Err(output) => (output, 0),
    };

    let report = RunReport {
        sessions,
        unattributed_errors: unattributed,
        clean_end,
        events_written,
        stats: StatsReport::from(stats),
        books,
    };
    Ok((report, output))
}

fn send(senders: &[SessionTx], session: SessionId, msg: SessionMsg) {
    // Parser and barrier set have already range-checked the id.
    match senders.get(session.0 as usize) {
        Some(tx) => {
            if tx.send(msg).is_err() {
                warn!(%session, "session worker is gone");
            }
        }
        None => warn!(%session, "no such session"),
    }
}

fn route_error(senders: &[SessionTx], err: ProtocolError, unattributed: &mut u64) {
    match err.session() {
        Some(session) => send(senders, session, SessionMsg::Abort(err.to_string())),
        None => {
            warn!(error = %err, "malformed line skipped");
            *unattributed += 1;
        }
    }
}

fn collect_sessions(
    results: Vec<Result<SessionReport, tokio::task::JoinError>>,
) -> Vec<SessionReport> {
    results
        .into_iter()
        .enumerate()
        .map(|(n, result)| {
            result.unwrap_or_else(|err| {
                let mut report = SessionReport::new(SessionId(n as u32));
                report.failure = Some(format!("session worker failed: {err}"));
                report
            })
        })
        .collect()
}
