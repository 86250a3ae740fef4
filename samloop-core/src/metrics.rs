//! Cycle metrics
//!
//! Counters for how many cycles a manager ran, how many were rolled back,
//! how much predicate chaining happened and how long cycles took.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters for one manager
#[derive(Debug, Default)]
pub struct CycleMetrics {
    /// Cycles that recorded a version
    pub completed: AtomicU64,

    /// Cycles rolled back by an error
    pub aborted: AtomicU64,

    /// Dispatches rejected before a cycle started
    pub rejected: AtomicU64,

    /// Predicate-triggered actions across all completed cycles
    pub chained_actions: AtomicU64,

    /// Dispatches that had to wait behind a running cycle
    pub queued: AtomicU64,

    /// Successful undo/redo moves
    pub navigations: AtomicU64,

    /// Total time spent in cycles (nanoseconds)
    pub total_cycle_time_ns: AtomicU64,
}

impl CycleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed cycle
    pub fn record_completed(&self, chained: usize, duration: Duration) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.chained_actions
            .fetch_add(chained as u64, Ordering::Relaxed);
        self.add_time(duration);
    }

    /// Record a cycle that was rolled back
    pub fn record_aborted(&self, duration: Duration) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
        self.add_time(duration);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_navigation(&self) {
        self.navigations.fetch_add(1, Ordering::Relaxed);
    }

    fn add_time(&self, duration: Duration) {
        self.total_cycle_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.completed.store(0, Ordering::Relaxed);
        self.aborted.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        self.chained_actions.store(0, Ordering::Relaxed);
        self.queued.store(0, Ordering::Relaxed);
        self.navigations.store(0, Ordering::Relaxed);
        self.total_cycle_time_ns.store(0, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            chained_actions: self.chained_actions.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            navigations: self.navigations.load(Ordering::Relaxed),
            total_time_ns: self.total_cycle_time_ns.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub completed: u64,
    pub aborted: u64,
    pub rejected: u64,
    pub chained_actions: u64,
    pub queued: u64,
    pub navigations: u64,
    pub total_time_ns: u64,
}

impl MetricsSnapshot {
    /// Cycles run, successful or not
    pub fn cycles(&self) -> u64 {
        self.completed + self.aborted
    }

    /// Fraction of cycles rolled back (0.0 to 1.0)
    pub fn abort_rate(&self) -> f64 {
        let total = self.cycles();
        if total == 0 {
            0.0
        } else {
            self.aborted as f64 / total as f64
        }
    }

    /// Average predicate-triggered actions per completed cycle
    pub fn avg_chain_length(&self) -> f64 {
        if self.completed == 0 {
            0.0
        } else {
            self.chained_actions as f64 / self.completed as f64
        }
    }

    /// Average cycle duration
    pub fn avg_cycle_time(&self) -> Duration {
        let total = self.cycles();
        if total == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_time_ns / total)
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Cycles: {} completed | {} aborted | Abort Rate: {:.1}%",
            self.completed,
            self.aborted,
            self.abort_rate() * 100.0
        )?;
        writeln!(
            f,
            "  Chained: {} (avg {:.2}/cycle) | Queued: {} | Rejected: {} | Undo/Redo: {}",
            self.chained_actions,
            self.avg_chain_length(),
            self.queued,
            self.rejected,
            self.navigations
        )?;
        writeln!(
            f,
            "  Avg Time: {:.3}ms | Total Time: {:.3}ms",
            self.avg_cycle_time().as_secs_f64() * 1000.0,
            Duration::from_nanos(self.total_time_ns).as_secs_f64() * 1000.0
        )?;
        Ok(())
    }
}
