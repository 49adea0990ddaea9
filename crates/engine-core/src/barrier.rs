//! Session barriers.
//!
//! A barrier line in a command script names either every session (`.`) or
//! an explicit list (`0,20 .`). Each distinct participant set maps to one
//! reusable [`tokio::sync::Barrier`]; the barrier's internal generation
//! counter lets the same set meet any number of times. Sets are created
//! on first use.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::Barrier;

use crate::error::EngineError;

/// One client session (one logical command-issuing thread).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who has to meet at a barrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarrierScope {
    /// Every session of the run.
    All,
    /// Exactly the listed sessions.
    Sessions(Vec<SessionId>),
}

/// A resolved barrier: the sessions to notify and the barrier they share.
#[derive(Debug, Clone)]
pub struct BarrierTicket {
    pub participants: Vec<SessionId>,
    pub barrier: Arc<Barrier>,
}

/// Lazily created barriers for one run with a fixed number of sessions.
#[derive(Debug)]
pub struct BarrierSet {
    session_count: u32,
    full: Arc<Barrier>,
    restricted: HashMap<Vec<SessionId>, Arc<Barrier>>,
}

impl BarrierSet {
    pub fn new(session_count: u32) -> Self {
        BarrierSet {
            session_count,
            full: Arc::new(Barrier::new(session_count.max(1) as usize)),
            restricted: HashMap::new(),
        }
    }

    pub fn session_count(&self) -> u32 {
        self.session_count
    }

    /// Resolve a scope to its participants and shared barrier.
    ///
    /// Participant lists are sorted and deduplicated, so `20,0` and `0,20`
    /// meet at the same barrier.
    pub fn resolve(&mut self, scope: &BarrierScope) -> Result<BarrierTicket, EngineError> {
        match scope {
            BarrierScope::All => Ok(BarrierTicket {
                participants: (0..self.session_count).map(SessionId).collect(),
                barrier: self.full.clone(),
            }),
            BarrierScope::Sessions(list) => {
                let mut participants = list.clone();
                participants.sort_unstable();
                participants.dedup();

                if participants.is_empty() {
                    return Err(EngineError::InvalidBarrier("no participants".to_string()));
                }
                if let Some(bad) = participants.iter().find(|s| s.0 >= self.session_count) {
                    return Err(EngineError::InvalidBarrier(format!(
                        "session {bad} is outside 0..{}",
                        self.session_count
                    )));
                }

                let barrier = self
                    .restricted
                    .entry(participants.clone())
                    .or_insert_with(|| Arc::new(Barrier::new(participants.len())))
                    .clone();
                Ok(BarrierTicket {
                    participants,
                    barrier,
                })
            }
        }
    }
}
