//! Lock-free engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct EngineStats {
    orders_accepted: AtomicU64,
    orders_rejected: AtomicU64,
    trades: AtomicU64,
    traded_volume: AtomicU64,
    cancels_accepted: AtomicU64,
    cancels_rejected: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStatsSnapshot {
    pub orders_accepted: u64,
    pub orders_rejected: u64,
    pub trades: u64,
    pub traded_volume: u64,
    pub cancels_accepted: u64,
    pub cancels_rejected: u64,
}

impl EngineStats {
    pub(crate) fn record_place(&self, trades: u64, volume: u64) {
        self.orders_accepted.fetch_add(1, Ordering::Relaxed);
        self.trades.fetch_add(trades, Ordering::Relaxed);
        self.traded_volume.fetch_add(volume, Ordering::Relaxed);
    }

    pub(crate) fn record_reject(&self) {
        self.orders_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancel(&self, accepted: bool) {
        let counter = if accepted {
            &self.cancels_accepted
        } else {
            &self.cancels_rejected
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            orders_accepted: self.orders_accepted.load(Ordering::Relaxed),
            orders_rejected: self.orders_rejected.load(Ordering::Relaxed),
            trades: self.trades.load(Ordering::Relaxed),
            traded_volume: self.traded_volume.load(Ordering::Relaxed),
            cancels_accepted: self.cancels_accepted.load(Ordering::Relaxed),
            cancels_rejected: self.cancels_rejected.load(Ordering::Relaxed),
        }
    }
}
