//! The main context abstraction.
//!
//! The watchdog never touches a platform event loop directly. It only needs
//! somewhere to post a task that the monitored context will run in FIFO
//! order, which is what [`TaskQueue`] describes. Hosts with their own event
//! loop implement the trait on top of it; everyone else can use
//! [`MainQueue`], a serial queue the monitored thread drains explicitly.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A unit of work posted onto the main context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A serial FIFO work queue owned by the monitored context.
///
/// `post` must not block and must not run the task inline. Tasks run in the
/// order they were posted. A queue that can no longer run a task should drop
/// it; the watchdog treats a dropped probe as the main context going away.
pub trait TaskQueue {
    /// Enqueue `task` for execution on the main context.
    fn post(&self, task: Task);
}

impl<Q: TaskQueue + ?Sized> TaskQueue for Arc<Q> {
    fn post(&self, task: Task) {
        (**self).post(task);
    }
}

impl<Q: TaskQueue + ?Sized> TaskQueue for Box<Q> {
    fn post(&self, task: Task) {
        (**self).post(task);
    }
}

impl<Q: TaskQueue + ?Sized> TaskQueue for &Q {
    fn post(&self, task: Task) {
        (**self).post(task);
    }
}

impl TaskQueue for Sender<Task> {
    fn post(&self, task: Task) {
        if let Err(err) = self.send(task) {
            tracing::trace!("main queue disconnected, dropping task");
            drop(err.into_inner());
        }
    }
}

/// Cloneable posting side of a [`MainQueue`].
#[derive(Clone)]
pub struct MainQueueHandle {
    tx: Sender<Task>,
}

impl TaskQueue for MainQueueHandle {
    fn post(&self, task: Task) {
        self.tx.post(task);
    }
}

impl std::fmt::Debug for MainQueueHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainQueueHandle")
            .field("queued", &self.tx.len())
            .finish()
    }
}

/// A serial task queue drained by the thread that owns it.
///
/// Create it on the monitored thread, hand [`MainQueue::handle`] to the
/// watchdog, and call one of the `run_*` methods from the thread's loop.
/// Dropping the queue discards every task still queued without running it.
///
/// # Example
///
/// ```rust
/// use stallwatch::queue::{MainQueue, TaskQueue};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let queue = MainQueue::new();
/// let ran = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&ran);
/// queue.handle().post(Box::new(move || flag.store(true, Ordering::Release)));
///
/// assert_eq!(queue.run_pending(), 1);
/// assert!(ran.load(Ordering::Acquire));
/// ```
pub struct MainQueue {
    tx: Sender<Task>,
    rx: Receiver<Task>,
}

impl MainQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    /// Get a posting handle for this queue.
    #[must_use]
    pub fn handle(&self) -> MainQueueHandle {
        MainQueueHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run every task queued at the moment of the call, and any posted while
    /// running them. Returns the number of tasks run.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0usize;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran = ran.saturating_add(1);
        }
        ran
    }

    /// Run tasks as they arrive until `duration` has elapsed.
    ///
    /// Returns the number of tasks run.
    pub fn run_for(&self, duration: Duration) -> usize {
        let deadline = Instant::now().checked_add(duration);
        let mut ran = 0usize;
        loop {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => duration,
            };
            if remaining.is_zero() {
                return ran;
            }
            match self.rx.recv_timeout(remaining) {
                Ok(task) => {
                    task();
                    ran = ran.saturating_add(1);
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return ran,
            }
        }
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Check whether no task is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for MainQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MainQueue {
    fn drop(&mut self) {
        let discarded = self.rx.try_iter().count();
        if discarded > 0 {
            tracing::debug!(discarded, "main queue dropped with tasks still queued");
        }
    }
}

impl std::fmt::Debug for MainQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainQueue")
            .field("queued", &self.rx.len())
            .finish()
    }
}
