//! Producer side of the event queue
//!
//! Producers hand finished [`LogEvent`]s to [`EventPipeline::submit`], which
//! places them on a bounded channel drained by the
//! [`DrainWorker`](super::worker::DrainWorker). When the channel is full the
//! configured [`OverflowPolicy`] decides what happens to the event.

use super::{
    appender::Appender,
    diagnostics::{DiagnosticKind, Diagnostics},
    error::{LoggerError, Result},
    log_event::LogEvent,
    metrics::LoggerMetrics,
    overflow_policy::{OverflowCallback, OverflowPolicy},
    worker::ShutdownReport,
};
use crossbeam_channel::{bounded, unbounded, Receiver, SendTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How often a producer blocked under [`OverflowPolicy::Block`] rechecks
/// whether shutdown has started.
const BLOCK_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Attempts to make room under [`OverflowPolicy::DropOldest`] before the new
/// event is dropped instead. Only reached when other producers keep refilling
/// the freed slot.
const EVICTION_ATTEMPTS: usize = 8;

/// Requests from the manager to the drain worker.
pub(crate) enum Control {
    AddAppender(Box<dyn Appender>),
    /// Deliver everything queued so far, then acknowledge.
    Flush(Sender<()>),
    /// Try to recover every failed appender now; replies with the number
    /// recovered.
    RetryFailed(Sender<usize>),
    /// Drain until `deadline`, close appenders and exit.
    Shutdown {
        deadline: Instant,
        done: Sender<ShutdownReport>,
    },
}

/// Receiving ends handed to the drain worker.
pub(crate) struct WorkerChannels {
    pub(crate) events: Receiver<LogEvent>,
    pub(crate) control: Receiver<Control>,
}

pub struct EventPipeline {
    sender: Sender<LogEvent>,
    /// Producer-side receiver used to evict the oldest event.
    evictor: Receiver<LogEvent>,
    control: Sender<Control>,
    policy: OverflowPolicy,
    capacity: usize,
    stopped: AtomicBool,
    /// Producers currently inside `submit`.
    in_flight: AtomicUsize,
    metrics: Arc<LoggerMetrics>,
    diagnostics: Arc<Diagnostics>,
    on_overflow: Option<OverflowCallback>,
}

impl EventPipeline {
    pub(crate) fn new(
        capacity: usize,
        policy: OverflowPolicy,
        metrics: Arc<LoggerMetrics>,
        diagnostics: Arc<Diagnostics>,
        on_overflow: Option<OverflowCallback>,
    ) -> (Self, WorkerChannels) {
        // A zero-capacity channel is a rendezvous and cannot hold an event to
        // evict.
        let capacity = capacity.max(1);
        let (sender, events) = bounded(capacity);
        let (control, control_rx) = unbounded();

        let pipeline = Self {
            sender,
            evictor: events.clone(),
            control,
            policy,
            capacity,
            stopped: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            metrics,
            diagnostics,
            on_overflow,
        };
        let channels = WorkerChannels {
            events,
            control: control_rx,
        };
        (pipeline, channels)
    }

    /// Queue an event for the drain worker.
    ///
    /// Returns [`LoggerError::Rejected`] once shutdown has started and
    /// [`LoggerError::QueueOverflow`] when the overflow policy dropped an
    /// event. Callers on the logging path ignore the result; every outcome
    /// is already counted in the metrics.
    pub fn submit(&self, event: LogEvent) -> Result<()> {
        let _in_flight = InFlight::enter(&self.in_flight);
        if self.is_stopped() {
            return self.reject();
        }

        match self.sender.try_send(event) {
            Ok(()) => {
                self.metrics.record_enqueued();
                Ok(())
            }
            Err(TrySendError::Full(event)) => {
                self.metrics.record_queue_full();
                self.handle_overflow(event)
            }
            Err(TrySendError::Disconnected(_)) => self.reject(),
        }
    }

    fn handle_overflow(&self, event: LogEvent) -> Result<()> {
        match self.policy {
            OverflowPolicy::Block => self.block(event, None),

            OverflowPolicy::BlockWithTimeout(timeout) => {
                self.block(event, Some(Instant::now() + timeout))
            }

            OverflowPolicy::DropNewest => self.record_drop(),

            OverflowPolicy::DropOldest => self.evict_oldest(event),
        }
    }

    /// Wait for space, giving up when shutdown starts. Past `deadline` the
    /// event is dropped.
    fn block(&self, mut event: LogEvent, deadline: Option<Instant>) -> Result<()> {
        self.metrics.record_block();
        loop {
            if self.is_stopped() {
                return self.reject();
            }
            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return self.record_drop();
                    }
                    remaining.min(BLOCK_POLL_INTERVAL)
                }
                None => BLOCK_POLL_INTERVAL,
            };
            match self.sender.send_timeout(event, wait) {
                Ok(()) => {
                    self.metrics.record_enqueued();
                    return Ok(());
                }
                Err(SendTimeoutError::Timeout(returned)) => event = returned,
                Err(SendTimeoutError::Disconnected(_)) => return self.reject(),
            }
        }
    }

    fn evict_oldest(&self, mut event: LogEvent) -> Result<()> {
        for _ in 0..EVICTION_ATTEMPTS {
            if self.evictor.try_recv().is_ok() {
                let _ = self.record_drop();
            }
            match self.sender.try_send(event) {
                Ok(()) => {
                    self.metrics.record_enqueued();
                    return Ok(());
                }
                Err(TrySendError::Full(returned)) => event = returned,
                Err(TrySendError::Disconnected(_)) => return self.reject(),
            }
        }
        self.record_drop()
    }

    /// Count one overflow drop, alerting on the first and every 1000th.
    fn record_drop(&self) -> Result<()> {
        let total = self.metrics.record_overflow_drop() + 1;

        if total == 1 || total % 1000 == 0 {
            self.diagnostics.report(
                DiagnosticKind::Overflow,
                format!(
                    "queue full (capacity {}), {} events dropped under {} policy",
                    self.capacity, total, self.policy
                ),
            );
            if let Some(ref callback) = self.on_overflow {
                callback(total);
            }
        }

        Err(LoggerError::queue_overflow(total))
    }

    fn reject(&self) -> Result<()> {
        self.metrics.record_rejected();
        Err(LoggerError::Rejected)
    }

    pub(crate) fn send_control(&self, message: Control) -> Result<()> {
        self.control
            .send(message)
            .map_err(|_| LoggerError::other("drain worker is not running"))
    }

    /// Stop accepting events. Producers blocked on a full queue are released
    /// with [`LoggerError::Rejected`].
    pub(crate) fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Wait up to `timeout` for producers still inside `submit` to leave,
    /// then remove everything left in the queue. Returns the number removed.
    ///
    /// Called after [`stop`](Self::stop), once the drain worker is done. A
    /// producer that passed the stopped check before `stop` may still land
    /// its event after the worker's last look at the queue.
    pub(crate) fn drain_abandoned(&self, timeout: Duration) -> u64 {
        let deadline = Instant::now() + timeout;
        while self.in_flight.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        self.evictor.try_iter().count() as u64
    }

    /// Events currently queued.
    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}

/// Marks a producer as inside `submit` for as long as it lives.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
