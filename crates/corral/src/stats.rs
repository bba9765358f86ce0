//! Pool counters and statistics snapshot

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Monotone pool counters
///
/// Counters never wrap: an increment that would overflow resets the
/// counter to the increment instead.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    wait_count: AtomicU64,
    wait_micros: AtomicU64,
    idle_closed: AtomicU64,
    life_closed: AtomicU64,
}

fn add_saturating(cell: &AtomicU64, delta: u64) {
    let _ = cell.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.checked_add(delta).unwrap_or(delta))
    });
}

impl Counters {
    /// Record one borrower that actually blocked on the idle queue
    pub(crate) fn record_wait(&self, waited: Duration) {
        add_saturating(&self.wait_count, 1);
        let micros = u64::try_from(waited.as_micros()).unwrap_or(u64::MAX);
        add_saturating(&self.wait_micros, micros);
    }

    /// Record an idle-eviction
    pub(crate) fn record_idle_closed(&self) {
        add_saturating(&self.idle_closed, 1);
    }

    /// Record a lifetime-eviction
    pub(crate) fn record_life_closed(&self) {
        add_saturating(&self.life_closed, 1);
    }

    pub(crate) fn wait_count(&self) -> u64 {
        self.wait_count.load(Ordering::Relaxed)
    }

    pub(crate) fn wait_duration(&self) -> Duration {
        Duration::from_micros(self.wait_micros.load(Ordering::Relaxed))
    }

    pub(crate) fn idle_closed(&self) -> u64 {
        self.idle_closed.load(Ordering::Relaxed)
    }

    pub(crate) fn life_closed(&self) -> u64 {
        self.life_closed.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of a pool
///
/// `in_use` is `total - idle` and may transiently exceed `max_active`
/// while a shrunken pool converges (live borrows are never revoked).
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Configured connection cap
    pub max_active: usize,
    /// Connections currently owned by the pool (idle + borrowed)
    pub total: usize,
    /// Connections waiting in the idle queue
    pub idle: usize,
    /// Connections currently borrowed
    pub in_use: usize,
    /// Borrows that blocked on the idle queue
    pub wait_count: u64,
    /// Cumulative time borrowers spent blocked
    pub wait_duration: Duration,
    /// Connections evicted for sitting idle too long
    pub idle_closed: u64,
    /// Connections evicted for exceeding their lifetime
    pub life_closed: u64,
}
