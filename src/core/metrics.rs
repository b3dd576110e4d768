//! Logger metrics for observability
//!
//! Provides counters for monitoring pipeline health: throughput, events lost
//! to overflow, rejected after shutdown, dropped by failed appenders, and
//! discarded when the shutdown grace period ran out.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for logger observability
///
/// All counters are monotonic (until [`reset`](LoggerMetrics::reset)) and
/// updated with relaxed atomics; readers get a consistent value per counter
/// but not across counters.
///
/// # Example
///
/// ```
/// use richlog::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
///
/// metrics.record_enqueued();
/// metrics.record_overflow_drop();
///
/// assert_eq!(metrics.enqueued(), 1);
/// assert_eq!(metrics.dropped_overflow(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Events accepted into the queue
    enqueued: AtomicU64,

    /// Events handed to appenders by the drain worker
    delivered: AtomicU64,

    /// Events dropped by the overflow policy (newest or evicted oldest)
    dropped_overflow: AtomicU64,

    /// Events rejected because the pipeline was shut down
    rejected: AtomicU64,

    /// Events not written because their appender was in the failed state
    sink_dropped: AtomicU64,

    /// Events still queued when the shutdown grace period expired
    dropped_at_shutdown: AtomicU64,

    /// Number of times a producer found the queue full
    queue_full_events: AtomicU64,

    /// Number of times a producer blocked waiting for queue space
    block_events: AtomicU64,

    /// Batches dispatched to appenders
    batches: AtomicU64,
}

impl LoggerMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped_overflow: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            sink_dropped: AtomicU64::new(0),
            dropped_at_shutdown: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
            batches: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_overflow(&self) -> u64 {
        self.dropped_overflow.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_dropped(&self) -> u64 {
        self.sink_dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_at_shutdown(&self) -> u64 {
        self.dropped_at_shutdown.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Total events lost for any reason.
    pub fn total_dropped(&self) -> u64 {
        self.dropped_overflow() + self.rejected() + self.sink_dropped() + self.dropped_at_shutdown()
    }

    /// Record an accepted event; returns the previous count
    #[inline]
    pub fn record_enqueued(&self) -> u64 {
        self.enqueued.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self, count: u64) -> u64 {
        self.delivered.fetch_add(count, Ordering::Relaxed)
    }

    /// Record an overflow drop; returns the previous count
    #[inline]
    pub fn record_overflow_drop(&self) -> u64 {
        self.dropped_overflow.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rejected(&self) -> u64 {
        self.rejected.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_dropped(&self, count: u64) -> u64 {
        self.sink_dropped.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped_at_shutdown(&self, count: u64) -> u64 {
        self.dropped_at_shutdown.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_batch(&self) -> u64 {
        self.batches.fetch_add(1, Ordering::Relaxed)
    }

    /// Get drop rate as a percentage (0.0 - 100.0)
    ///
    /// Overflow drops and rejections relative to everything producers
    /// submitted. Returns 0.0 if nothing has been submitted.
    pub fn drop_rate(&self) -> f64 {
        let dropped = (self.dropped_overflow() + self.rejected()) as f64;
        let total = self.enqueued() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        for counter in [
            &self.enqueued,
            &self.delivered,
            &self.dropped_overflow,
            &self.rejected,
            &self.sink_dropped,
            &self.dropped_at_shutdown,
            &self.queue_full_events,
            &self.block_events,
            &self.batches,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            enqueued: AtomicU64::new(self.enqueued()),
            delivered: AtomicU64::new(self.delivered()),
            dropped_overflow: AtomicU64::new(self.dropped_overflow()),
            rejected: AtomicU64::new(self.rejected()),
            sink_dropped: AtomicU64::new(self.sink_dropped()),
            dropped_at_shutdown: AtomicU64::new(self.dropped_at_shutdown()),
            queue_full_events: AtomicU64::new(self.queue_full_events()),
            block_events: AtomicU64::new(self.block_events()),
            batches: AtomicU64::new(self.batches()),
        }
    }
}
