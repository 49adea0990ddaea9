//! Per-order progress tracking for `wait`.
//!
//! Every order id referenced by a place or a wait gets one
//! `tokio::sync::watch` channel holding its [`TrackedState`]. Books publish
//! into it from inside their critical section; waiters subscribe and
//! suspend until the state is settled. No lock is held while a waiter is
//! suspended.
//!
//! Channels are created lazily by whichever side shows up first and are
//! never removed, so a wait issued after the order was processed sees the
//! settled state immediately.

use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::error::EngineError;
use crate::order::{OrderId, OrderStatus};

/// Progress of one order id as seen by waiters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrackedState {
    /// Only a waiter has referenced this id so far.
    Unseen,
    /// A place has claimed the id but not finished processing it.
    Submitted,
    /// The engine has reached a decision; later transitions are
    /// published here too.
    Settled(OrderStatus),
}

impl TrackedState {
    /// `true` once `place` has finished with the order.
    pub fn is_settled(&self) -> bool {
        matches!(self, TrackedState::Settled(_))
    }

    /// `true` while a place is in flight or the order rests on a book.
    pub fn is_active(&self) -> bool {
        match self {
            TrackedState::Submitted => true,
            TrackedState::Settled(status) => status.is_resting(),
            TrackedState::Unseen => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct OrderTracker {
    slots: DashMap<OrderId, watch::Sender<TrackedState>>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id` for a new place.
    ///
    /// Fails with `DuplicateId` if the id is in flight or resting. A
    /// terminal id is reclaimed as a fresh one.
    pub fn begin(&self, id: OrderId) -> Result<(), EngineError> {
        let slot = self
            .slots
            .entry(id)
            .or_insert_with(|| watch::channel(TrackedState::Unseen).0);
        if slot.borrow().is_active() {
            return Err(EngineError::DuplicateId(id));
        }
        slot.send_replace(TrackedState::Submitted);
        Ok(())
    }

    /// Undo a [`begin`](Self::begin) whose place was rejected afterwards.
    pub fn abandon(&self, id: OrderId) {
        if let Some(slot) = self.slots.get(&id) {
            slot.send_if_modified(|state| {
                if *state == TrackedState::Submitted {
                    *state = TrackedState::Unseen;
                    true
                } else {
                    false
                }
            });
        }
    }

    /// Record a status transition. Called with the owning book locked.
    pub fn publish(&self, id: OrderId, status: OrderStatus) {
        self.slots
            .entry(id)
            .or_insert_with(|| watch::channel(TrackedState::Unseen).0)
            .send_replace(TrackedState::Settled(status));
    }

    /// Current state of `id`.
    pub fn state(&self, id: OrderId) -> TrackedState {
        match self.slots.get(&id) {
            Some(slot) => {
                let state = *slot.borrow();
                state
            }
            None => TrackedState::Unseen,
        }
    }

    /// Latest status of `id`, if the engine has settled it.
    pub fn status(&self, id: OrderId) -> Option<OrderStatus> {
        match self.state(id) {
            TrackedState::Settled(status) => Some(status),
            _ => None,
        }
    }

    /// Suspend until `id` is settled and return the status observed.
    ///
    /// Blocks indefinitely for an id that is never placed.
    pub async fn wait(&self, id: OrderId) -> Result<OrderStatus, EngineError> {
        // The map guard is a temporary; it is released before suspending.
        let mut rx = self
            .slots
            .entry(id)
            .or_insert_with(|| watch::channel(TrackedState::Unseen).0)
            .subscribe();

        let state = rx
            .wait_for(TrackedState::is_settled)
            .await
            .map_err(|_| EngineError::Internal(format!("tracker channel for order {id} closed")))?;

        match *state {
            TrackedState::Settled(status) => Ok(status),
            other => Err(EngineError::Internal(format!(
                "order {id} woke in unsettled state {other:?}"
            ))),
        }
    }

    /// [`wait`](Self::wait) with a deadline.
    pub async fn wait_timeout(&self, id: OrderId, timeout: Duration) -> Result<OrderStatus, EngineError> {
        tokio::time::timeout(timeout, self.wait(id))
            .await
            .map_err(|_| EngineError::WaitTimedOut { id, timeout })?
    }

    /// Number of ids ever referenced.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn begin_rejects_active_ids() {
        let tracker = OrderTracker::new();
        tracker.begin(1).unwrap();
        assert_eq!(tracker.begin(1), Err(EngineError::DuplicateId(1)));

        tracker.publish(1, OrderStatus::Resting);
        assert_eq!(tracker.begin(1), Err(EngineError::DuplicateId(1)));

        tracker.publish(1, OrderStatus::Filled);
        assert!(tracker.begin(1).is_ok());
        assert_eq!(tracker.state(1), TrackedState::Submitted);
    }

    #[test]
    fn abandon_only_reverts_submitted() {
        let tracker = OrderTracker::new();
        tracker.begin(4).unwrap();
        tracker.abandon(4);
        assert_eq!(tracker.state(4), TrackedState::Unseen);

        tracker.publish(5, OrderStatus::Resting);
        tracker.abandon(5);
        assert_eq!(tracker.status(5), Some(OrderStatus::Resting));
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_settled() {
        let tracker = OrderTracker::new();
        tracker.publish(9, OrderStatus::Filled);
        assert_eq!(tracker.wait(9).await, Ok(OrderStatus::Filled));
    }

    #[tokio::test]
    async fn wait_wakes_on_publish() {
        let tracker = Arc::new(OrderTracker::new());
        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait(3).await })
        };

        tokio::task::yield_now().await;
        tracker.begin(3).unwrap();
        tracker.publish(3, OrderStatus::PartiallyFilled);

        assert_eq!(waiter.await.unwrap(), Ok(OrderStatus::PartiallyFilled));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_timeout_expires_for_unknown_id() {
        let tracker = OrderTracker::new();
        let err = tracker
            .wait_timeout(42, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::WaitTimedOut { id: 42, .. }));
    }
}
