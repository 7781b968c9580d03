//! The probe scheduler.
//!
//! A dedicated thread measures main-context responsiveness once per
//! threshold interval. Each round it posts a probe onto the main queue,
//! sleeps for exactly the threshold, and calls the stall handler if the
//! probe has not run by then. It then waits for that probe to run before
//! posting the next one, so at most one probe is ever queued on the main
//! context no matter how long it stays blocked.
//!
//! # Cancellation
//!
//! [`ProbeScheduler::cancel`] only clears the run flag. The loop observes it
//! after the current round's sleep and acknowledgment wait, so stopping takes
//! up to one threshold plus however long the main context needs to reach the
//! probe. If the main context never drains its queue, [`ProbeScheduler::join`]
//! never returns. A queue that drops the probe instead ends the loop.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::ack::{Ack, AckSignal};
use crate::error::{WatchdogError, WatchdogResult};
use crate::queue::TaskQueue;
use crate::stats::{ProbeCounters, ProbeStats};

/// Name given to the background probe thread.
pub const PROBE_THREAD_NAME: &str = "stallwatch-probe";

/// Callback invoked on the probe thread for every stalled round.
///
/// It must return quickly and must not panic: a panic ends the probe thread.
pub type StallHandler = Box<dyn FnMut() + Send + 'static>;

/// Background scheduler probing a [`TaskQueue`] for responsiveness.
///
/// Single use: [`start`](Self::start) spawns the thread once and fails on any
/// later call. Dropping the scheduler cancels and joins it.
pub struct ProbeScheduler<Q: TaskQueue + Send + 'static> {
    threshold: Duration,
    // Taken by `start`. Behind a lock only so the scheduler stays `Sync`.
    parts: Mutex<Option<(Q, StallHandler)>>,
    running: Arc<AtomicBool>,
    counters: Arc<ProbeCounters>,
    thread: Option<JoinHandle<()>>,
}

impl<Q: TaskQueue + Send + 'static> ProbeScheduler<Q> {
    /// Create a scheduler. No thread is spawned until [`start`](Self::start).
    pub fn new<H>(threshold: Duration, queue: Q, handler: H) -> Self
    where
        H: FnMut() + Send + 'static,
    {
        Self {
            threshold,
            parts: Mutex::new(Some((queue, Box::new(handler)))),
            running: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(ProbeCounters::default()),
            thread: None,
        }
    }

    /// Spawn the probe thread.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::AlreadyStarted`] on a second call and
    /// [`WatchdogError::SpawnFailed`] if the thread cannot be created.
    pub fn start(&mut self) -> WatchdogResult<()> {
        let (queue, handler) = self
            .parts
            .get_mut()
            .take()
            .ok_or(WatchdogError::AlreadyStarted)?;

        let probe = ProbeLoop {
            threshold: self.threshold,
            queue,
            handler,
            running: Arc::clone(&self.running),
            counters: Arc::clone(&self.counters),
        };

        self.running.store(true, Ordering::Release);
        match thread::Builder::new()
            .name(PROBE_THREAD_NAME.to_string())
            .spawn(move || probe.run())
        {
            Ok(handle) => {
                self.thread = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::Release);
                Err(WatchdogError::spawn_failed(err))
            }
        }
    }

    /// Ask the probe loop to stop after its current round. Never blocks.
    pub fn cancel(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Wait for the probe thread to exit.
    ///
    /// Returns immediately if the thread was never started or already joined.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::ProbePanicked`] if the thread panicked.
    pub fn join(&mut self) -> WatchdogResult<()> {
        let Some(handle) = self.thread.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(()) => Ok(()),
            Err(_panic) => Err(WatchdogError::ProbePanicked),
        }
    }

    /// Check whether the run flag is still set.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Check whether the probe thread has exited (or was never started).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// The configured threshold.
    #[must_use]
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Snapshot of probe activity so far.
    #[must_use]
    pub fn stats(&self) -> ProbeStats {
        self.counters.snapshot()
    }
}

impl<Q: TaskQueue + Send + 'static> Drop for ProbeScheduler<Q> {
    fn drop(&mut self) {
        self.cancel();
        if let Err(err) = self.join() {
            tracing::error!(error = %err, "probe thread ended abnormally");
        }
    }
}

impl<Q: TaskQueue + Send + 'static> std::fmt::Debug for ProbeScheduler<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeScheduler")
            .field("threshold", &self.threshold)
            .field("started", &self.parts.lock().is_none())
            .field("running", &self.is_running())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

struct ProbeLoop<Q> {
    threshold: Duration,
    queue: Q,
    handler: StallHandler,
    running: Arc<AtomicBool>,
    counters: Arc<ProbeCounters>,
}

impl<Q: TaskQueue> ProbeLoop<Q> {
    fn run(mut self) {
        let threshold_ms = u64::try_from(self.threshold.as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(threshold_ms, "probe thread started");

        let signal = AckSignal::new();
        let pending = Arc::new(AtomicBool::new(false));

        while self.running.load(Ordering::Acquire) {
            pending.store(true, Ordering::Release);

            let token = signal.token();
            let probe_pending = Arc::clone(&pending);
            let counters = Arc::clone(&self.counters);
            let posted_at = Instant::now();
            self.queue.post(Box::new(move || {
                probe_pending.store(false, Ordering::Release);
                counters.observe_latency(posted_at.elapsed());
                token.signal();
            }));

            thread::sleep(self.threshold);

            let early = signal.try_wait();
            if early != Some(Ack::Abandoned) && pending.load(Ordering::Acquire) {
                let stall = self.counters.record_stall();
                tracing::trace!(threshold_ms, stall, "main context missed the probe window");
                (self.handler)();
            }

            match early.unwrap_or_else(|| signal.wait()) {
                Ack::Delivered => {
                    self.counters.record_round();
                    tracing::trace!("probe acknowledged");
                }
                Ack::Abandoned => {
                    tracing::debug!("main queue dropped the probe, stopping");
                    break;
                }
            }
        }

        tracing::debug!(stats = ?self.counters.snapshot(), "probe thread exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{MainQueue, Task};
    use crossbeam::channel;
    use std::sync::atomic::AtomicUsize;

    fn counting_handler() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler_count = Arc::clone(&count);
        (count, move || {
            handler_count.fetch_add(1, Ordering::AcqRel);
        })
    }

    #[test]
    fn test_start_twice_fails() {
        let queue = MainQueue::new();
        let (_count, handler) = counting_handler();
        let mut scheduler = ProbeScheduler::new(Duration::from_millis(10), queue.handle(), handler);

        scheduler.start().unwrap();
        assert!(matches!(scheduler.start(), Err(WatchdogError::AlreadyStarted)));

        scheduler.cancel();
        while !scheduler.is_finished() {
            queue.run_for(Duration::from_millis(5));
        }
        scheduler.join().unwrap();
    }

    #[test]
    fn test_unstarted_scheduler_joins_immediately() {
        let (tx, _rx) = channel::unbounded::<Task>();
        let (_count, handler) = counting_handler();
        let mut scheduler = ProbeScheduler::new(Duration::from_millis(10), tx, handler);

        assert!(!scheduler.is_running());
        assert!(scheduler.is_finished());
        scheduler.join().unwrap();
    }

    #[test]
    fn test_responsive_queue_never_stalls() {
        let queue = MainQueue::new();
        let (count, handler) = counting_handler();
        let mut scheduler = ProbeScheduler::new(Duration::from_millis(20), queue.handle(), handler);
        scheduler.start().unwrap();

        while scheduler.stats().rounds < 5 {
            queue.run_for(Duration::from_millis(2));
        }

        scheduler.cancel();
        while !scheduler.is_finished() {
            queue.run_for(Duration::from_millis(2));
        }
        scheduler.join().unwrap();

        assert_eq!(count.load(Ordering::Acquire), 0);
        assert_eq!(scheduler.stats().stalls, 0);
    }

    #[test]
    fn test_blocked_queue_stalls_and_throttles() {
        let (tx, rx) = channel::unbounded::<Task>();
        let (count, handler) = counting_handler();
        let mut scheduler = ProbeScheduler::new(Duration::from_millis(10), tx, handler);
        scheduler.start().unwrap();

        // Nobody drains: the first round stalls and the loop parks on its ack.
        thread::sleep(Duration::from_millis(80));
        assert_eq!(count.load(Ordering::Acquire), 1);
        assert_eq!(rx.len(), 1);

        scheduler.cancel();
        for task in rx.try_iter() {
            task();
        }
        scheduler.join().unwrap();
        assert_eq!(scheduler.stats().rounds, 1);
    }

    #[test]
    fn test_dropped_queue_ends_loop() {
        let queue = MainQueue::new();
        let (_count, handler) = counting_handler();
        let mut scheduler = ProbeScheduler::new(Duration::from_millis(10), queue.handle(), handler);
        scheduler.start().unwrap();

        drop(queue);
        scheduler.join().unwrap();
        assert!(scheduler.is_finished());
    }

    #[test]
    fn test_panicking_handler_is_reported() {
        let (tx, rx) = channel::unbounded::<Task>();
        let mut scheduler = ProbeScheduler::new(Duration::from_millis(5), tx, || {
            std::panic::resume_unwind(Box::new("handler failure"));
        });
        scheduler.start().unwrap();

        assert!(matches!(scheduler.join(), Err(WatchdogError::ProbePanicked)));
        drop(rx);
    }
}
