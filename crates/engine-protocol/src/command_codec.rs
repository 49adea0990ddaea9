// crates/engine-protocol/src/command_codec.rs

//! Command script codec.
//!
//! A script is one command per line:
//!
//! ```text
//! <N>                                  number of sessions
//! o                                    open marker
//! [<tid> ]B|S <id> <instrument> <price> <qty>
//! [<tid> ]C <id>
//! [<tid> ]w <id>
//! .                                    barrier over every session
//! <tid>[,<tid>...] .                   barrier over the listed sessions
//! x                                    end of script
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. The `<tid>`
//! prefix may be omitted; the caller decides which session runs such a
//! command.
//!
//! Numeric fields are plain ASCII digits; signs are rejected.
//!
//! Parsing is stateful only in that it remembers the session count (to
//! range-check tids) and the current line number (for errors).

use std::fmt;

use engine_core::{BarrierScope, Cancel, InputMessage, NewOrder, OrderId, SessionId, Side};
use thiserror::Error;

/// One parsed, non-empty script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptLine {
    /// Header: how many sessions the script drives.
    SessionCount(u32),

    /// `o`
    Open,

    /// A command for one session. `session` is `None` when the line
    /// carried no tid prefix.
    Command {
        session: Option<SessionId>,
        command: Command,
    },

    /// `.` or `a,b .`
    Barrier(BarrierScope),

    /// `x`
    End,
}

/// Work a session performs against the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A place or cancel, handed to the engine as is.
    Engine(InputMessage),

    /// Suspend the session until the order has been processed.
    Wait(OrderId),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Engine(InputMessage::NewOrder(o)) => write!(
                f,
                "{} {} {} {} {}",
                o.side.as_char(),
                o.id,
                o.instrument,
                o.price,
                o.quantity
            ),
            Command::Engine(InputMessage::Cancel(c)) => write!(f, "C {}", c.id),
            Command::Wait(id) => write!(f, "w {id}"),
        }
    }
}

/// A line the script reader could not accept.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The line does not follow the grammar. `session` is set when the
    /// line carried a valid tid, i.e. the failure belongs to that session.
    #[error("line {line}: {reason}")]
    Malformed {
        line: usize,
        session: Option<SessionId>,
        reason: String,
    },

    #[error("line {line}: session {session} is outside 0..{count}")]
    UnknownSession {
        line: usize,
        session: u32,
        count: u32,
    },

    #[error("line {line}: command before the session count header")]
    MissingHeader { line: usize },
}

impl ProtocolError {
    /// The session this error is attributable to, if any.
    pub fn session(&self) -> Option<SessionId> {
        match self {
            ProtocolError::Malformed { session, .. } => *session,
            ProtocolError::UnknownSession { .. } | ProtocolError::MissingHeader { .. } => None,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            ProtocolError::Malformed { line, .. }
            | ProtocolError::UnknownSession { line, .. }
            | ProtocolError::MissingHeader { line } => *line,
        }
    }
}

/// Incremental script parser. Feed it lines in order.
#[derive(Debug, Default)]
pub struct ScriptParser {
    line_no: usize,
    session_count: Option<u32>,
}

impl ScriptParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session count from the header, once seen.
    pub fn session_count(&self) -> Option<u32> {
        self.session_count
    }

    /// 1-based number of the last line fed in.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// Parse the next line.
    ///
    /// Returns `Ok(None)` for blank lines and comments.
    pub fn parse_line(&mut self, raw: &str) -> Result<Option<ScriptLine>, ProtocolError> {
        self.line_no += 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();

        let Some(count) = self.session_count else {
            return self.parse_header(&tokens).map(Some);
        };

        match tokens.as_slice() {
            ["x"] => return Ok(Some(ScriptLine::End)),
            ["o"] => return Ok(Some(ScriptLine::Open)),
            ["."] => return Ok(Some(ScriptLine::Barrier(BarrierScope::All))),
            [list, "."] if is_session_list(list) => {
                return self.parse_barrier_list(list, count).map(Some);
            }
            _ => {}
        }

        let (session, rest) = match parse_u32(tokens[0]) {
            Some(tid) if tid < count => (Some(SessionId(tid)), &tokens[1..]),
            Some(tid) => {
                return Err(ProtocolError::UnknownSession {
                    line: self.line_no,
                    session: tid,
                    count,
                })
            }
            None => (None, &tokens[..]),
        };

        let command = self.parse_command(rest, session)?;
        Ok(Some(ScriptLine::Command { session, command }))
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    fn parse_header(&mut self, tokens: &[&str]) -> Result<ScriptLine, ProtocolError> {
        let [count] = tokens else {
            return Err(ProtocolError::MissingHeader { line: self.line_no });
        };
        let count = parse_u32(count).ok_or(ProtocolError::MissingHeader { line: self.line_no })?;
        if count == 0 {
            return Err(self.malformed(None, "session count must be positive"));
        }
        self.session_count = Some(count);
        Ok(ScriptLine::SessionCount(count))
    }

    fn parse_barrier_list(&self, list: &str, count: u32) -> Result<ScriptLine, ProtocolError> {
        let mut sessions = Vec::new();
        for part in list.split(',') {
            let tid = parse_u32(part)
                .ok_or_else(|| self.malformed(None, format!("bad barrier participant `{part}`")))?;
            if tid >= count {
                return Err(ProtocolError::UnknownSession {
                    line: self.line_no,
                    session: tid,
                    count,
                });
            }
            sessions.push(SessionId(tid));
        }
        Ok(ScriptLine::Barrier(BarrierScope::Sessions(sessions)))
    }

    fn parse_command(&self, tokens: &[&str], session: Option<SessionId>) -> Result<Command, ProtocolError> {
        match tokens {
            [side @ ("B" | "S"), id, instrument, price, qty] => {
                let side = match *side {
                    "B" => Side::Buy,
                    _ => Side::Sell,
                };
                let id = self.number(id, "order id", session)?;
                let price = self.number(price, "price", session)?;
                let quantity = self.number(qty, "quantity", session)?;
                if price == 0 {
                    return Err(self.malformed(session, "price must be positive"));
                }
                if quantity == 0 {
                    return Err(self.malformed(session, "quantity must be positive"));
                }
                let order = NewOrder::new(id, side, *instrument, price, quantity);
                Ok(Command::Engine(InputMessage::NewOrder(order)))
            }
            ["C", id] => {
                let id = self.number(id, "order id", session)?;
                Ok(Command::Engine(InputMessage::Cancel(Cancel { id })))
            }
            ["w", id] => Ok(Command::Wait(self.number(id, "order id", session)?)),
            ["B" | "S", ..] => Err(self.malformed(session, "place needs <id> <instrument> <price> <qty>")),
            ["C" | "w", ..] => Err(self.malformed(session, "expected exactly one order id")),
            [] => Err(self.malformed(session, "missing command")),
            [other, ..] => Err(self.malformed(session, format!("unknown command `{other}`"))),
        }
    }

    fn number(&self, token: &str, what: &str, session: Option<SessionId>) -> Result<u32, ProtocolError> {
        parse_u32(token)
            .ok_or_else(|| self.malformed(session, format!("{what} `{token}` is not a non-negative integer")))
    }

    fn malformed(&self, session: Option<SessionId>, reason: impl Into<String>) -> ProtocolError {
        ProtocolError::Malformed {
            line: self.line_no,
            session,
            reason: reason.into(),
        }
    }
}

/// Digits-only `u32`. `str::parse` alone would also take a leading `+`.
fn parse_u32(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// `3` or `0,20`: the participant part of a restricted barrier.
fn is_session_list(token: &str) -> bool {
    token.split(',').all(|part| parse_u32(part).is_some())
}
